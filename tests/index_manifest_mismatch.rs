mod common;

use common::write_log;
use shard_index::{Config, Error, Fnv1};
use test_log::test;

fn build(path: &std::path::Path) -> shard_index::Result<()> {
    Config::new(path).shard_bits(4).open()?.close();
    Ok(())
}

#[test]
fn index_shard_count_mismatch() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");
    write_log(&path, [("a", "1")])?;
    build(&path)?;

    assert!(matches!(
        Config::new(&path).shard_bits(2).open(),
        Err(Error::ShardCountMismatch {
            expected: 4,
            got: 16
        }),
    ));

    // Rebuilding with the new shard count is up to the caller
    let index = Config::new(&path).shard_bits(2).force_rebuild(true).open()?;
    assert_eq!(4, index.shard_count());
    assert_eq!(Some(b"1".to_vec()), index.get("a")?);

    Ok(())
}

#[test]
fn index_fingerprint_mismatch() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");
    write_log(&path, [("a", "1")])?;
    build(&path)?;

    assert!(matches!(
        Config::new(&path).shard_bits(4).fingerprinter(Fnv1).open(),
        Err(Error::FingerprintMismatch { expected: "fnv1", ref got }) if got == "xxh3",
    ));

    Ok(())
}

#[test]
fn index_unknown_version() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");
    write_log(&path, [("a", "1")])?;
    build(&path)?;

    std::fs::write(
        folder.path().join("manifest"),
        r#"{"version":7,"shard_num":16,"fingerprint":"xxh3"}"#,
    )?;

    assert!(matches!(
        Config::new(&path).shard_bits(4).open(),
        Err(Error::InvalidVersion(7)),
    ));

    Ok(())
}

#[test]
fn index_corrupt_manifest() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");
    write_log(&path, [("a", "1")])?;
    build(&path)?;

    std::fs::write(folder.path().join("manifest"), "{\"version\":")?;

    assert!(matches!(
        Config::new(&path).shard_bits(4).open(),
        Err(Error::InvalidManifest(_)),
    ));

    Ok(())
}

#[test]
fn index_corrupt_table() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");
    write_log(&path, [("a", "1")])?;
    build(&path)?;

    let table_path = folder.path().join("tables").join("3");
    let mut bytes = std::fs::read(&table_path)?;
    bytes.pop();
    std::fs::write(&table_path, bytes)?;

    assert!(matches!(
        Config::new(&path).shard_bits(4).open(),
        Err(Error::InvalidHeader(_)),
    ));

    Ok(())
}
