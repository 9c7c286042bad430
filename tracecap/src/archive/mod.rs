//! # Content-Addressed Archive
//!
//! Durable, write-once blob storage for payloads too large to inline in the
//! event stream (shader binaries, texture and buffer contents). The stream
//! carries only the id; the bytes live here.
//!
//! ## Files
//!
//! An archive named `<path>` is two sibling files:
//!
//! - `<path>.data`: blob payloads back to back, in write order
//! - `<path>.index`: one record per blob, see [`index`]
//!
//! ## Write Protocol
//!
//! ```text
//! 1. id already indexed?       → done, nothing written
//! 2. append blob to .data      → failure: cut .data back, return false
//! 3. append record to .index   → failure: cut .data AND .index back, return false
//! 4. insert into memory index  → return true
//! ```
//!
//! The in-memory index therefore never gets ahead of what is on disk, and the
//! data file never keeps a blob that has no index record.
//!
//! ## Identity
//!
//! Ids are trusted to stand for their content (they are content hashes in
//! practice). A second write under a known id is accepted without looking at
//! the bytes.
//!
//! ## Crash Recovery
//!
//! Reopening replays the index from the start. A crash mid-write leaves at
//! most one torn record at the tail; replay drops it silently and the next
//! append overwrites it, along with any orphaned data bytes.

pub mod index;
pub mod record_file;

pub use index::ArchiveRecord;
pub use record_file::{Backing, RecordFile};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracecap_common::{DATA_FILE_SUFFIX, INDEX_FILE_SUFFIX};

use crate::domain::ArchiveError;

/// How an archive opens its files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveOptions {
    pub backing: Backing,
}

/// Persistent id → blob store
pub struct Archive {
    data: RecordFile,
    index: RecordFile,
    records: HashMap<String, ArchiveRecord>,
}

impl Archive {
    /// Open or create the archive at `path` with the default (mapped) backing
    ///
    /// # Errors
    /// Returns an error if either file cannot be opened, mapped or read
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        Self::open_with(path, &ArchiveOptions::default())
    }

    /// Open or create the archive at `path`
    ///
    /// # Errors
    /// Returns an error if either file cannot be opened, mapped or read
    pub fn open_with(path: impl AsRef<Path>, options: &ArchiveOptions) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let mut data = RecordFile::open(with_suffix(path, DATA_FILE_SUFFIX), options.backing)?;
        let mut index = RecordFile::open(with_suffix(path, INDEX_FILE_SUFFIX), options.backing)?;

        let bytes = index
            .contents()
            .map_err(|source| ArchiveError::IndexReadFailed {
                path: index.path().to_path_buf(),
                source,
            })?;
        let replay = index::replay(&bytes, data.end());
        index.set_end(replay.valid_len as u64);

        let mut records = HashMap::with_capacity(replay.entries.len());
        let mut data_end = 0;
        for (id, record) in replay.entries {
            data_end = data_end.max(record.end());
            records.entry(id).or_insert(record);
        }
        if data_end < data.end() {
            debug!(
                "Reclaiming {} orphaned bytes at the end of {}",
                data.end() - data_end,
                data.path().display()
            );
        }
        data.set_end(data_end);

        info!(
            "Opened archive {} ({} records, {} data bytes)",
            path.display(),
            records.len(),
            data_end
        );
        Ok(Self {
            data,
            index,
            records,
        })
    }

    #[must_use]
    pub fn index_file_path(&self) -> &Path {
        self.index.path()
    }

    #[must_use]
    pub fn data_file_path(&self) -> &Path {
        self.data.path()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Where `id`'s blob lives, if it is stored
    #[must_use]
    pub fn record(&self, id: &str) -> Option<ArchiveRecord> {
        self.records.get(id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every stored id with its location, in no particular order
    pub fn records(&self) -> impl Iterator<Item = (&str, ArchiveRecord)> {
        self.records.iter().map(|(id, record)| (id.as_str(), *record))
    }

    /// Copy `id`'s blob into `buf`
    ///
    /// Returns false, leaving `buf` alone, if `id` is unknown or its stored
    /// size is not exactly `buf.len()`.
    pub fn read(&self, id: &str, buf: &mut [u8]) -> bool {
        let Some(record) = self.records.get(id) else {
            debug!("Archive read of unknown id {id}");
            return false;
        };
        if record.size as usize != buf.len() {
            warn!(
                "Archive read of {id} asked for {} bytes, stored size is {}",
                buf.len(),
                record.size
            );
            return false;
        }
        match self.data.read_at(record.offset, buf) {
            Ok(()) => true,
            Err(e) => {
                warn!("Archive read of {id} failed: {e}");
                false
            }
        }
    }

    /// Read `id`'s whole blob
    #[must_use]
    pub fn read_vec(&self, id: &str) -> Option<Vec<u8>> {
        let record = self.records.get(id)?;
        let mut buf = vec![0u8; record.size as usize];
        self.read(id, &mut buf).then_some(buf)
    }

    /// Store `bytes` under `id` unless `id` is already stored
    ///
    /// Returns true if `id` is stored afterwards. On failure both files are
    /// rolled back to their lengths before the call.
    ///
    /// The empty id is never stored: replay reads a zero id length as the
    /// zero padding a mapped index keeps past its last record, so a record
    /// with an empty id would end replay. Ids and blobs longer than
    /// `u32::MAX` bytes are rejected too.
    pub fn write(&mut self, id: &str, bytes: &[u8]) -> bool {
        if self.records.contains_key(id) {
            return true;
        }
        if id.is_empty() || u32::try_from(id.len()).is_err() {
            warn!("Archive id of {} bytes is not storable", id.len());
            return false;
        }
        let Ok(size) = u32::try_from(bytes.len()) else {
            warn!("Blob {id} of {} bytes exceeds the archive's size limit", bytes.len());
            return false;
        };

        let data_mark = self.data.end();
        let index_mark = self.index.end();

        let offset = match self.data.append(bytes) {
            Ok(offset) => offset,
            Err(e) => {
                warn!("Failed to append {size} bytes for {id} to {}: {e}", self.data.path().display());
                self.rollback(data_mark, None);
                return false;
            }
        };

        let record = ArchiveRecord { offset, size };
        if let Err(e) = self.index.append(&index::encode_record(id, record)) {
            warn!("Failed to index {id} in {}: {e}", self.index.path().display());
            self.rollback(data_mark, Some(index_mark));
            return false;
        }

        self.records.insert(id.to_string(), record);
        true
    }

    /// Push both files to stable storage
    ///
    /// # Errors
    /// Fails if either flush fails
    pub fn sync(&self) -> std::io::Result<()> {
        self.data.sync()?;
        self.index.sync()
    }

    /// Flush and cut both files to their exact sizes
    ///
    /// Dropping an archive does the same but can only log failures.
    ///
    /// # Errors
    /// Fails if either file cannot be closed cleanly
    pub fn close(self) -> Result<(), ArchiveError> {
        let Self { data, index, records } = self;
        let data_path = data.path().to_path_buf();
        let index_path = index.path().to_path_buf();

        data.close().map_err(|source| ArchiveError::CloseFailed {
            path: data_path,
            source,
        })?;
        index.close().map_err(|source| ArchiveError::CloseFailed {
            path: index_path,
            source,
        })?;
        info!("Closed archive ({} records)", records.len());
        Ok(())
    }

    fn rollback(&mut self, data_mark: u64, index_mark: Option<u64>) {
        if let Err(e) = self.data.truncate(data_mark) {
            warn!("Failed to roll back {}: {e}", self.data.path().display());
        }
        if let Some(mark) = index_mark {
            if let Err(e) = self.index.truncate(mark) {
                warn!("Failed to roll back {}: {e}", self.index.path().display());
            }
        }
    }
}

/// `<path><suffix>`, keeping any extension `path` already has
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir, backing: Backing) -> Archive {
        Archive::open_with(dir.path().join("res"), &ArchiveOptions { backing }).expect("open archive")
    }

    #[test]
    fn test_with_suffix_keeps_extension() {
        assert_eq!(with_suffix(Path::new("/a/b.v2"), ".data"), PathBuf::from("/a/b.v2.data"));
    }

    #[test]
    fn test_failed_data_append_leaves_nothing() {
        for backing in [Backing::Mapped, Backing::Plain] {
            let dir = tempfile::tempdir().expect("tempdir");
            let mut archive = open(&dir, backing);
            assert!(archive.write("a", b"first"));

            archive.data.fail_next_append = true;
            assert!(!archive.write("b", b"second"));
            assert!(!archive.contains("b"));
            assert_eq!(archive.data.end(), 5);
            assert!(archive.write("b", b"second"));
        }
    }

    #[test]
    fn test_failed_index_append_rolls_back_both_files() {
        for backing in [Backing::Mapped, Backing::Plain] {
            let dir = tempfile::tempdir().expect("tempdir");
            let mut archive = open(&dir, backing);
            assert!(archive.write("a", b"first"));
            let data_end = archive.data.end();
            let index_end = archive.index.end();

            archive.index.fail_next_append = true;
            assert!(!archive.write("b", b"second"));
            assert!(!archive.contains("b"));
            assert_eq!(archive.data.end(), data_end);
            assert_eq!(archive.index.end(), index_end);
            archive.close().expect("close");

            let reopened = open(&dir, backing);
            assert_eq!(reopened.len(), 1);
            assert_eq!(reopened.read_vec("a").as_deref(), Some(&b"first"[..]));
            let data_len = std::fs::metadata(reopened.data_file_path()).expect("metadata").len();
            assert_eq!(data_len, 5);
        }
    }

    #[test]
    fn test_rejects_empty_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut archive = open(&dir, Backing::Mapped);
        assert!(!archive.write("", b"x"));
        assert!(archive.is_empty());
        assert_eq!(archive.data.end(), 0);
        assert_eq!(archive.index.end(), 0);

        // Records after a rejected empty id still replay
        assert!(archive.write("a", b"x"));
        drop(archive);
        assert!(open(&dir, Backing::Mapped).contains("a"));
    }
}
