//! Byte destinations
//!
//! Everything the encoder produces ends up in a [`ByteSink`]. `write` blocks
//! until it has taken what it can and returns how many bytes it accepted. A
//! short count means the destination is closed or broken; callers do not retry.

use log::warn;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Blocking byte destination
pub trait ByteSink {
    /// Write `bytes`, returning how many were accepted
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Push any internally buffered bytes further downstream
    ///
    /// Returns false if the destination reported an error.
    fn flush(&mut self) -> bool {
        true
    }
}

impl ByteSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        self.extend_from_slice(bytes);
        bytes.len()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write(&mut self, bytes: &[u8]) -> usize {
        (**self).write(bytes)
    }

    fn flush(&mut self) -> bool {
        (**self).flush()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        (**self).write(bytes)
    }

    fn flush(&mut self) -> bool {
        (**self).flush()
    }
}

/// Buffered file destination
///
/// The first I/O error is logged and closes the sink: that write and every
/// later one report zero accepted bytes.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    broken: bool,
}

impl FileSink {
    /// Create (or truncate) `path` and write to it
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            broken: false,
        })
    }

    /// Path this sink writes to
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an I/O error has closed the sink
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl ByteSink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> usize {
        if self.broken {
            return 0;
        }
        match self.writer.write_all(bytes) {
            Ok(()) => bytes.len(),
            Err(e) => {
                warn!("Write to {} failed, closing sink: {e}", self.path.display());
                self.broken = true;
                0
            }
        }
    }

    fn flush(&mut self) -> bool {
        if self.broken {
            return false;
        }
        if let Err(e) = self.writer.flush() {
            warn!("Flush of {} failed, closing sink: {e}", self.path.display());
            self.broken = true;
        }
        !self.broken
    }
}

/// Shared in-memory destination
///
/// Clones share one buffer, so a handle kept by the caller can observe what a
/// background thread has written. An optional limit makes the sink behave like
/// a destination that closes after a fixed number of bytes.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    bytes: Vec<u8>,
    limit: Option<usize>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that accepts at most `limit` bytes in total
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                bytes: Vec::new(),
                limit: Some(limit),
            })),
        }
    }

    /// Copy of everything written so far
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().bytes.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSink for MemorySink {
    fn write(&mut self, bytes: &[u8]) -> usize {
        let mut inner = self.inner.lock();
        let room = inner
            .limit
            .map_or(bytes.len(), |limit| limit.saturating_sub(inner.bytes.len()));
        let accepted = room.min(bytes.len());
        inner.bytes.extend_from_slice(&bytes[..accepted]);
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_accepts_everything() {
        let mut sink = Vec::new();
        assert_eq!(ByteSink::write(&mut sink, b"abc"), 3);
        assert_eq!(ByteSink::write(&mut sink, b""), 0);
        assert_eq!(sink, b"abc");
    }

    #[test]
    fn test_memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write(b"hello ");
        writer.write(b"world");
        assert_eq!(sink.contents(), b"hello world");
        assert_eq!(sink.len(), 11);
    }

    #[test]
    fn test_memory_sink_limit_short_writes() {
        let mut sink = MemorySink::with_limit(4);
        assert_eq!(sink.write(b"abc"), 3);
        assert_eq!(sink.write(b"def"), 1);
        assert_eq!(sink.write(b"ghi"), 0);
        assert_eq!(sink.contents(), b"abcd");
    }

    #[test]
    fn test_file_sink_writes_through_on_flush() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stream.bin");
        let mut sink = FileSink::create(&path).expect("create sink");
        assert_eq!(sink.path(), path);
        assert_eq!(sink.write(b"0123"), 4);
        assert!(sink.flush());
        assert_eq!(std::fs::read(&path).expect("read back"), b"0123");
    }
}
