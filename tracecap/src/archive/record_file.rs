//! Append-only backing file, optionally memory-mapped
//!
//! A `RecordFile` tracks two sizes: the logical `end` (bytes that belong to
//! records) and the reserved `capacity`. With the mapped backing, capacity
//! runs ahead of `end` in whole pages and the file is cut back to `end` when
//! it is closed. With the plain backing, capacity always equals the file
//! length and writes go through positioned I/O.

#![allow(unsafe_code)] // memory-mapping a file requires unsafe

use log::{debug, error, warn};
use memmap2::{MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracecap_common::grown_capacity;

use crate::domain::ArchiveError;

/// How a [`RecordFile`] reaches its bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backing {
    /// Shared writable mapping, grown geometrically in whole pages
    #[default]
    Mapped,
    /// Positioned reads and writes on the file descriptor
    Plain,
}

pub struct RecordFile {
    path: PathBuf,
    file: File,
    backing: Backing,
    map: Option<MmapMut>,
    end: u64,
    capacity: u64,
    /// Set when a failed growth lost the mapping; every later access fails
    detached: bool,
    closed: bool,
    #[cfg(test)]
    pub(crate) fail_next_append: bool,
}

impl RecordFile {
    /// Open or create `path`
    ///
    /// The logical end starts at the current file length; callers that know
    /// better (index replay) move it with [`RecordFile::set_end`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped
    pub fn open(path: impl Into<PathBuf>, backing: Backing) -> Result<Self, ArchiveError> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| ArchiveError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        let len = file
            .metadata()
            .map_err(|source| ArchiveError::OpenFailed {
                path: path.clone(),
                source,
            })?
            .len();

        let map = if backing == Backing::Mapped && len > 0 {
            Some(map_file(&file, len).map_err(|source| ArchiveError::MapFailed {
                path: path.clone(),
                source,
            })?)
        } else {
            None
        };

        Ok(Self {
            path,
            file,
            backing,
            map,
            end: len,
            capacity: len,
            detached: false,
            closed: false,
            #[cfg(test)]
            fail_next_append: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// Logical size in bytes
    #[must_use]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Reserved size in bytes (physical file length while open)
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Move the logical end, dropping anything after it on the next append
    pub fn set_end(&mut self, end: u64) {
        debug_assert!(end <= self.capacity);
        self.end = end.min(self.capacity);
    }

    /// Copy `buf.len()` bytes starting at `offset`
    ///
    /// # Errors
    /// Fails if the range extends past the logical end or the read fails
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let stop = offset
            .checked_add(buf.len() as u64)
            .filter(|&stop| stop <= self.end)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("read of {} bytes at {offset} is past the end", buf.len()),
                )
            })?;
        if buf.is_empty() {
            return Ok(());
        }
        self.check_attached()?;

        match &self.map {
            Some(map) => {
                buf.copy_from_slice(&map[to_usize(offset)?..to_usize(stop)?]);
                Ok(())
            }
            None => self.file.read_exact_at(buf, offset),
        }
    }

    /// Every byte up to the logical end
    ///
    /// # Errors
    /// Fails if the read fails
    pub fn contents(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; to_usize(self.end)?];
        self.read_at(0, &mut buf)?;
        Ok(buf)
    }

    /// Append `bytes` at the logical end, returning their offset
    ///
    /// On error the logical end is unchanged, but a plain backing may hold a
    /// partial write past it; callers roll back with [`RecordFile::truncate`].
    ///
    /// # Errors
    /// Fails if the file cannot grow or the write fails
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<u64> {
        self.check_attached()?;
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_append) {
            return Err(io::Error::other("injected append failure"));
        }

        let offset = self.end;
        let stop = offset
            .checked_add(bytes.len() as u64)
            .ok_or_else(|| io::Error::other("record file offset overflow"))?;

        match self.backing {
            Backing::Mapped => {
                if stop > self.capacity {
                    self.grow(stop)?;
                }
                if let Some(map) = self.map.as_mut() {
                    map[to_usize(offset)?..to_usize(stop)?].copy_from_slice(bytes);
                }
            }
            Backing::Plain => {
                self.file.write_all_at(bytes, offset)?;
                self.capacity = self.capacity.max(stop);
            }
        }

        self.end = stop;
        Ok(offset)
    }

    /// Roll the logical end back to `len`
    ///
    /// # Errors
    /// Fails if a plain backing cannot be cut back
    pub fn truncate(&mut self, len: u64) -> io::Result<()> {
        debug_assert!(len <= self.capacity);
        self.end = len;
        if self.backing == Backing::Plain {
            self.file.set_len(len)?;
            self.capacity = len;
        }
        Ok(())
    }

    /// Write mapped pages back and sync file data
    ///
    /// # Errors
    /// Fails if the flush or sync fails
    pub fn sync(&self) -> io::Result<()> {
        if let Some(map) = &self.map {
            map.flush()?;
        }
        self.file.sync_data()
    }

    /// Flush, cut the file to its logical end and release it
    ///
    /// # Errors
    /// Fails if the flush or the final truncation fails
    pub fn close(mut self) -> io::Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let flushed = self.map.take().map_or(Ok(()), |map| map.flush());
        self.file.set_len(self.end)?;
        flushed
    }

    fn check_attached(&self) -> io::Result<()> {
        if self.detached {
            return Err(io::Error::other(format!(
                "{} lost its mapping and is no longer usable",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Unmap, resize, remap
    fn grow(&mut self, required: u64) -> io::Result<()> {
        let new_capacity = grown_capacity(self.capacity, required);
        to_usize(new_capacity)?;

        if let Some(map) = &self.map {
            map.flush()?;
        }
        self.map = None;

        if let Err(e) = self.file.set_len(new_capacity) {
            warn!("Failed to grow {} to {new_capacity} bytes: {e}", self.path.display());
            self.remap(self.capacity);
            return Err(e);
        }

        debug!(
            "Grew {} from {} to {new_capacity} bytes",
            self.path.display(),
            self.capacity
        );
        self.capacity = new_capacity;
        self.remap(new_capacity);
        self.check_attached()
    }

    fn remap(&mut self, len: u64) {
        if len == 0 {
            return;
        }
        match map_file(&self.file, len) {
            Ok(map) => self.map = Some(map),
            Err(e) => {
                error!("Failed to map {}: {e}", self.path.display());
                self.detached = true;
            }
        }
    }
}

impl Drop for RecordFile {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to close {}: {e}", self.path.display());
        }
    }
}

fn map_file(file: &File, len: u64) -> io::Result<MmapMut> {
    // SAFETY: the file is opened read-write by this process and only ever
    // accessed through the owning RecordFile, which never hands out slices
    // that outlive a remap.
    unsafe { MmapOptions::new().len(to_usize(len)?).map_mut(file) }
}

fn to_usize(value: u64) -> io::Result<usize> {
    usize::try_from(value).map_err(|_| io::Error::other("record file exceeds address space"))
}
