#![allow(dead_code)]

use shard_index::{data_log::Writer, Fingerprinter};
use std::{fs::File, io::BufWriter, path::Path};

/// Writes a data log, returning the offset of every record.
pub fn write_log<K: AsRef<[u8]>, V: AsRef<[u8]>>(
    path: &Path,
    records: impl IntoIterator<Item = (K, V)>,
) -> shard_index::Result<Vec<u64>> {
    let mut writer = Writer::new(BufWriter::new(File::create(path)?), 0);

    let offsets = records
        .into_iter()
        .map(|(key, value)| writer.append(key.as_ref(), value.as_ref()))
        .collect::<std::io::Result<Vec<_>>>()?;

    writer.finish()?;

    Ok(offsets)
}

/// Maps every key to the same fingerprint
pub struct ConstantFingerprint(pub u64);

impl Fingerprinter for ConstantFingerprint {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn fingerprint(&self, _key: &[u8]) -> u64 {
        self.0
    }
}
