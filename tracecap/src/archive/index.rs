//! Index record encoding and replay
//!
//! The index file is a bare sequence of records, native byte order, no header:
//!
//! ```text
//! u32 id_len | id_len bytes of id | u64 offset | u32 size
//! ```
//!
//! Replay stops at the first record that cannot be trusted: a short tail left
//! by a crash mid-append, a zero id length (page padding from a mapped file
//! that was never cut back), an id that is not UTF-8, or a byte range the data
//! file does not cover. Everything before that point is kept.

use log::debug;
use tracecap_common::{index_record_len, INDEX_ID_LEN_SIZE, INDEX_OFFSET_SIZE, INDEX_SIZE_SIZE};

/// Location of one blob in the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub offset: u64,
    pub size: u32,
}

impl ArchiveRecord {
    /// Offset one past the blob's last byte
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(u64::from(self.size))
    }
}

/// Outcome of replaying an index file
#[derive(Debug, Default)]
pub struct Replay {
    /// Records in file order
    pub entries: Vec<(String, ArchiveRecord)>,
    /// Bytes of the index covered by `entries`
    pub valid_len: usize,
}

/// Serialize one record
///
/// Caller guarantees `id.len()` fits in a `u32`.
#[must_use]
pub fn encode_record(id: &str, record: ArchiveRecord) -> Vec<u8> {
    let id_len = u32::try_from(id.len()).unwrap_or(u32::MAX);
    let mut out = Vec::with_capacity(index_record_len(id.len()));
    out.extend_from_slice(&id_len.to_ne_bytes());
    out.extend_from_slice(id.as_bytes());
    out.extend_from_slice(&record.offset.to_ne_bytes());
    out.extend_from_slice(&record.size.to_ne_bytes());
    out
}

/// Replay `bytes` against a data file of `data_len` bytes
#[must_use]
pub fn replay(bytes: &[u8], data_len: u64) -> Replay {
    let mut replay = Replay::default();

    while let Some((id, record, len)) = parse_record(&bytes[replay.valid_len..]) {
        if record.end() > data_len {
            debug!(
                "Index record for {id} points past the data file ({} > {data_len}), stopping replay",
                record.end()
            );
            break;
        }
        replay.entries.push((id, record));
        replay.valid_len += len;
    }

    if replay.valid_len < bytes.len() {
        debug!(
            "Ignoring {} trailing index bytes after {} records",
            bytes.len() - replay.valid_len,
            replay.entries.len()
        );
    }
    replay
}

fn parse_record(bytes: &[u8]) -> Option<(String, ArchiveRecord, usize)> {
    let (id_len, rest) = split_array::<INDEX_ID_LEN_SIZE>(bytes)?;
    let id_len = usize::try_from(u32::from_ne_bytes(id_len)).ok()?;
    if id_len == 0 || rest.len() < id_len {
        return None;
    }
    let (id, rest) = rest.split_at(id_len);
    let (offset, rest) = split_array::<INDEX_OFFSET_SIZE>(rest)?;
    let (size, _) = split_array::<INDEX_SIZE_SIZE>(rest)?;

    let id = std::str::from_utf8(id).ok()?.to_string();
    let record = ArchiveRecord {
        offset: u64::from_ne_bytes(offset),
        size: u32::from_ne_bytes(size),
    };
    Some((id, record, index_record_len(id_len)))
}

fn split_array<const N: usize>(bytes: &[u8]) -> Option<([u8; N], &[u8])> {
    if bytes.len() < N {
        return None;
    }
    let (head, rest) = bytes.split_at(N);
    Some((head.try_into().ok()?, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(records: &[(&str, u64, u32)]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|&(id, offset, size)| encode_record(id, ArchiveRecord { offset, size }))
            .collect()
    }

    #[test]
    fn test_record_layout() {
        let bytes = encode_record("ab", ArchiveRecord { offset: 5, size: 9 });
        assert_eq!(bytes.len(), 4 + 2 + 8 + 4);
        assert_eq!(&bytes[..4], &2u32.to_ne_bytes());
        assert_eq!(&bytes[4..6], b"ab");
        assert_eq!(&bytes[6..14], &5u64.to_ne_bytes());
        assert_eq!(&bytes[14..], &9u32.to_ne_bytes());
    }

    #[test]
    fn test_replay_all_records() {
        let bytes = index_of(&[("a", 0, 3), ("bb", 3, 4)]);
        let replay = replay(&bytes, 7);
        assert_eq!(replay.entries.len(), 2);
        assert_eq!(replay.valid_len, bytes.len());
        assert_eq!(replay.entries[1], ("bb".to_string(), ArchiveRecord { offset: 3, size: 4 }));
    }

    #[test]
    fn test_replay_stops_at_every_truncation_point() {
        let bytes = index_of(&[("a", 0, 3), ("bb", 3, 4)]);
        let first_len = index_record_len(1);
        for cut in first_len..bytes.len() {
            let replay = replay(&bytes[..cut], 7);
            assert_eq!(replay.entries.len(), 1, "cut at {cut}");
            assert_eq!(replay.valid_len, first_len);
        }
        for cut in 0..first_len {
            assert!(replay(&bytes[..cut], 7).entries.is_empty(), "cut at {cut}");
        }
    }

    #[test]
    fn test_replay_stops_at_zero_padding() {
        let mut bytes = index_of(&[("a", 0, 3)]);
        let valid = bytes.len();
        bytes.resize(4096, 0);
        let replay = replay(&bytes, 3);
        assert_eq!(replay.entries.len(), 1);
        assert_eq!(replay.valid_len, valid);
    }

    #[test]
    fn test_replay_stops_at_record_beyond_data() {
        let bytes = index_of(&[("a", 0, 3), ("b", 3, 10)]);
        let replay = replay(&bytes, 5);
        assert_eq!(replay.entries.len(), 1);
    }
}
