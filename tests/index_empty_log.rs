use shard_index::{Config, Index};
use test_log::test;

#[test]
fn index_empty_log() -> shard_index::Result<()> {
    let folder = shard_index::get_tmp_folder();
    let path = folder.path().join("data.log");
    std::fs::File::create(&path)?;

    {
        let index = Config::new(&path).scratch_buffer_size(4_096).open()?;
        assert!(index.was_rebuilt());
        assert_eq!(0, index.log_size());
        assert_eq!(None, index.get("anything")?);
        assert_eq!(None, index.get("")?);
    }

    {
        let index = Index::open(&path)?;
        assert!(!index.was_rebuilt());
        assert_eq!(None, index.get("anything")?);

        // Every shard holds a single empty slot
        let table = std::fs::read(folder.path().join("tables").join("0"))?;
        assert_eq!(8 + 12, table.len());
    }

    Ok(())
}
