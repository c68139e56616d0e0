mod common;

use common::write_log;
use shard_index::{manifest::Manifest, Config, Error, StopSignal};
use test_log::test;

#[test]
fn index_truncated_log() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");

    let offsets = write_log(&path, [("a", "1"), ("b", "2"), ("c", "3")])?;

    // Cut into the value of the last record
    let size = std::fs::metadata(&path)?.len();
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)?
        .set_len(size - 1)?;

    let result = Config::new(&path).shard_bits(2).open();
    assert!(
        matches!(result, Err(Error::TruncatedRecord(offset)) if offset == offsets[2]),
        "{result:?}",
    );

    assert_eq!(None, Manifest::load(folder.path())?);
    assert!(!folder.path().join("scratch").try_exists()?);

    // Repairing the log makes the next open build the index
    write_log(&path, [("a", "1"), ("b", "2"), ("c", "3")])?;

    let index = Config::new(&path).shard_bits(2).open()?;
    assert!(index.was_rebuilt());
    assert_eq!(Some(b"3".to_vec()), index.get("c")?);

    Ok(())
}

#[test]
fn index_stale_scratch_of_killed_build() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");

    write_log(&path, [("a", "1"), ("b", "2")])?;

    let scratch = folder.path().join("scratch");
    std::fs::create_dir_all(&scratch)?;
    std::fs::write(scratch.join("200"), [0; 12])?;

    let index = Config::new(&path).shard_bits(2).open()?;
    assert!(index.was_rebuilt());
    assert_eq!(Some(b"2".to_vec()), index.get("b")?);
    assert!(!scratch.try_exists()?);

    Ok(())
}

#[test]
fn index_cancelled_build() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");

    write_log(&path, (0..100).map(|idx| (format!("key{idx}"), "value")))?;

    let signal = StopSignal::default();
    signal.send();

    let result = Config::new(&path)
        .scratch_buffer_size(4_096)
        .stop_signal(signal)
        .open();
    assert!(matches!(result, Err(Error::Cancelled)), "{result:?}");

    assert_eq!(None, Manifest::load(folder.path())?);
    assert!(!folder.path().join("scratch").try_exists()?);

    let index = Config::new(&path).scratch_buffer_size(4_096).open()?;
    assert_eq!(Some(b"value".to_vec()), index.get("key99")?);

    Ok(())
}

#[test]
fn index_offset_overflow_is_not_silent() -> shard_index::Result<()> {
    use shard_index::{shard::builder::ShardBuilder, slot::LocalKey};

    let folder = shard_index::get_tmp_folder();
    let mut builder = ShardBuilder::new(folder.path().join("scratch"), 64)?;

    assert!(matches!(
        builder.put(LocalKey::from_fingerprint(1), 1 << 40),
        Err(Error::OffsetOverflow(_)),
    ));
    builder.put(LocalKey::from_fingerprint(1), (1 << 40) - 1)?;

    assert_eq!(1, builder.finish(folder.path().join("table"))?);

    Ok(())
}
