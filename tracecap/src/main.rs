//! # tracecap - Main Entry Point
//!
//! Supports two operational modes:
//! - **Archive** (`tracecap archive put|get|ls|verify`): inspect and populate a
//!   resource archive directly
//! - **Capture** (`tracecap capture <BASE> <FILE>...`): record files into a new
//!   capture session, one event per file plus its resource

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracecap::archive::Archive;
use tracecap::cli::{ArchiveCommand, Args, Command};
use tracecap::config::CaptureConfig;
use tracecap::domain::ResourceId;
use tracecap::encoding::{Encodable, Encoder, Entity, Field, FieldKind};
use tracecap::session::CaptureSession;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOINPUT: i32 = 66;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let missing = err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
    });
    if missing {
        EXIT_NOINPUT
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CaptureConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CaptureConfig::default(),
    };

    match args.command {
        Command::Archive(command) => run_archive(command, &config, args.quiet),
        Command::Capture { base, files } => run_capture(&base, &files, &config, args.quiet),
    }
}

fn open_archive(path: &Path, config: &CaptureConfig) -> Result<Archive> {
    Archive::open_with(path, &config.archive)
        .with_context(|| format!("Failed to open archive {}", path.display()))
}

fn run_archive(command: ArchiveCommand, config: &CaptureConfig, quiet: bool) -> Result<()> {
    match command {
        ArchiveCommand::Put { archive, files } => {
            let mut archive = open_archive(&archive, config)?;
            for file in files {
                let bytes = std::fs::read(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let id = ResourceId::from_content(&bytes);
                let existed = archive.contains(id.as_str());
                if !archive.write(id.as_str(), &bytes) {
                    bail!("Failed to store {} in the archive", file.display());
                }
                if !quiet {
                    let note = if existed { " (already stored)" } else { "" };
                    println!("{id}  {}{note}", file.display());
                }
            }
            archive.close()?;
        }

        ArchiveCommand::Get { archive, id, output } => {
            let archive = open_archive(&archive, config)?;
            let Some(bytes) = archive.read_vec(&id) else {
                bail!("No blob with id {id} in {}", archive.index_file_path().display());
            };
            match output {
                Some(path) => std::fs::write(&path, &bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => std::io::stdout()
                    .lock()
                    .write_all(&bytes)
                    .context("Failed to write blob to stdout")?,
            }
        }

        ArchiveCommand::Ls { archive } => {
            let archive = open_archive(&archive, config)?;
            let mut records: Vec<_> = archive.records().collect();
            records.sort_by_key(|(_, record)| record.offset);
            for (id, record) in &records {
                println!("{id}  offset={}  size={}", record.offset, record.size);
            }
            if !quiet {
                let total: u64 = records.iter().map(|(_, r)| u64::from(r.size)).sum();
                println!("{} blobs, {total} bytes", records.len());
            }
        }

        ArchiveCommand::Verify { archive } => {
            let archive = open_archive(&archive, config)?;
            let mut mismatched = 0usize;
            for (id, _) in archive.records() {
                let matches = archive
                    .read_vec(id)
                    .is_some_and(|bytes| ResourceId::from_content(&bytes).as_str() == id);
                if !matches {
                    mismatched += 1;
                    println!("MISMATCH  {id}");
                }
            }
            if mismatched > 0 {
                bail!("{mismatched} of {} blobs do not match their ids", archive.len());
            }
            if !quiet {
                println!("{} blobs verified", archive.len());
            }
        }
    }
    Ok(())
}

/// One recorded file: where it came from and which resource holds its bytes
struct FileEvent {
    entity: Arc<Entity>,
    path: String,
    size: u64,
    resource: Option<ResourceId>,
}

impl Encodable for FileEvent {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn encode(&self, encoder: &mut dyn Encoder) {
        encoder.write_string(Some(&self.path));
        encoder.write_u64(self.size);
        encoder.write_string(self.resource.as_ref().map(ResourceId::as_str));
    }
}

fn run_capture(base: &Path, files: &[PathBuf], config: &CaptureConfig, quiet: bool) -> Result<()> {
    let mut session = CaptureSession::create(base, config)
        .with_context(|| format!("Failed to start capture session {}", base.display()))?;
    let entity = session.schema_mut().register(
        "FileEvent",
        vec![
            Field::new("path", FieldKind::String),
            Field::new("size", FieldKind::Uint64),
            Field::new("resource", FieldKind::String),
        ],
    );

    for file in files {
        let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let event = FileEvent {
            entity: Arc::clone(&entity),
            path: file.display().to_string(),
            size: bytes.len() as u64,
            resource: session.store_resource(&bytes),
        };
        session.encoder().write_object(Some(&event));
    }

    let summary = session.finish()?;
    info!("Capture written to {}", summary.stream_path.display());
    if !quiet {
        println!(
            "{}: {} bytes, {} events, {} resources",
            summary.stream_path.display(),
            summary.stream_bytes,
            summary.objects,
            summary.resources
        );
    }
    Ok(())
}
