//! Capture session wiring
//!
//! A session named `<base>` produces:
//!
//! - `<base>.trace`: the encoded event stream, written through an
//!   [`AsyncRingBuffer`] so the producer never waits on the file
//! - `<base>.resources.data` / `<base>.resources.index`: an [`Archive`] of
//!   large payloads, keyed by the SHA-256 of their content
//!
//! Resources bypass the encoder; the stream carries only their ids.

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::archive::{with_suffix, Archive};
use crate::config::CaptureConfig;
use crate::domain::{ResourceId, SessionError};
use crate::encoding::{Encoder, SchemaRegistry, VarintEncoder};
use crate::ring::AsyncRingBuffer;
use crate::sink::FileSink;

/// Suffix of the event stream file
pub const STREAM_SUFFIX: &str = ".trace";

/// Suffix of the resource archive (before the archive's own suffixes)
pub const RESOURCES_SUFFIX: &str = ".resources";

/// Encoder type used by capture sessions
pub type SessionEncoder = VarintEncoder<AsyncRingBuffer<FileSink>>;

/// What a finished session left on disk
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub stream_path: PathBuf,
    pub stream_bytes: u64,
    pub objects: u64,
    pub resources: usize,
}

/// One capture: an event stream plus its resource archive
pub struct CaptureSession {
    encoder: SessionEncoder,
    archive: Archive,
    schema: SchemaRegistry,
    stream_path: PathBuf,
}

impl CaptureSession {
    /// Create the stream file and open (or create) the resource archive
    ///
    /// # Errors
    /// Returns an error if the config is invalid or a file cannot be created
    pub fn create(base: impl AsRef<Path>, config: &CaptureConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let base = base.as_ref();
        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let stream_path = with_suffix(base, STREAM_SUFFIX);
        let sink = FileSink::create(&stream_path).map_err(|source| SessionError::StreamCreateFailed {
            path: stream_path.clone(),
            source,
        })?;
        let archive = Archive::open_with(with_suffix(base, RESOURCES_SUFFIX), &config.archive)?;

        info!(
            "Capture session started: {} ({} byte ring)",
            stream_path.display(),
            config.ring_capacity
        );
        Ok(Self {
            encoder: VarintEncoder::new(AsyncRingBuffer::new(sink, config.ring_capacity)),
            archive,
            schema: SchemaRegistry::new(),
            stream_path,
        })
    }

    /// The session's event stream encoder
    pub fn encoder(&mut self) -> &mut SessionEncoder {
        &mut self.encoder
    }

    /// Types registered for this session
    pub fn schema_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.schema
    }

    #[must_use]
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    #[must_use]
    pub fn stream_path(&self) -> &Path {
        &self.stream_path
    }

    /// Store `bytes` in the archive under their content hash
    ///
    /// Content already stored is not written again. Returns `None` if the
    /// archive write failed.
    pub fn store_resource(&mut self, bytes: &[u8]) -> Option<ResourceId> {
        let id = ResourceId::from_content(bytes);
        if self.archive.write(id.as_str(), bytes) {
            Some(id)
        } else {
            warn!("Resource {id} ({} bytes) was not stored", bytes.len());
            None
        }
    }

    /// Store `bytes` and write their id into the event stream
    ///
    /// A resource that could not be stored is written as a null id.
    pub fn emit_resource(&mut self, bytes: &[u8]) -> Option<ResourceId> {
        let id = self.store_resource(bytes);
        self.encoder.write_string(id.as_ref().map(ResourceId::as_str));
        id
    }

    /// Block until every event written so far is in the stream file
    pub fn flush(&mut self) {
        self.encoder.sink().flush();
    }

    /// Drain the stream, close the archive and report what was written
    ///
    /// # Errors
    /// Returns an error if the archive cannot be closed or the stream sink
    /// failed at any point
    pub fn finish(self) -> Result<SessionSummary, SessionError> {
        let Self {
            encoder,
            archive,
            stream_path,
            ..
        } = self;

        let objects = encoder.object_count();
        let encoder_failed = encoder.is_failed();
        let ring = encoder.into_inner();
        ring.flush();
        let ring_failed = ring.sink_failed();
        let sink = ring.close();
        let sink_failed = ring_failed || sink.is_broken();
        drop(sink);

        let resources = archive.len();
        archive.close()?;

        if encoder_failed || sink_failed {
            return Err(SessionError::StreamIncomplete { path: stream_path });
        }

        let stream_bytes = std::fs::metadata(&stream_path)?.len();
        info!(
            "Capture session finished: {stream_bytes} stream bytes, {objects} objects, {resources} resources"
        );
        Ok(SessionSummary {
            stream_path,
            stream_bytes,
            objects,
            resources,
        })
    }
}
