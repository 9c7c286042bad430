//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tracecap",
    version,
    about = "Inspect and populate tracecap capture archives",
    after_help = "\
EXAMPLES:
    tracecap archive put ./run1.resources shader.spv     Store a file by content hash
    tracecap archive ls ./run1.resources                 List stored blobs
    tracecap archive get ./run1.resources <ID> -o out    Extract one blob
    tracecap capture ./run1 shader.spv texture.bin       Record files into a new session"
)]
pub struct Args {
    /// JSON config file (ring capacity, archive backing)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Operate on a resource archive (<PATH>.data / <PATH>.index)
    #[command(subcommand)]
    Archive(ArchiveCommand),

    /// Record files as resources of a new capture session
    Capture {
        /// Session base path (creates <BASE>.trace and <BASE>.resources.*)
        #[arg(value_name = "BASE")]
        base: PathBuf,

        /// Files to record
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ArchiveCommand {
    /// Store files, keyed by the SHA-256 of their content
    Put {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Extract one blob
    Get {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        #[arg(value_name = "ID")]
        id: String,

        /// Output file (defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List stored blobs in data-file order
    Ls {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
    },

    /// Re-hash every blob and report ids that do not match their content
    Verify {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_archive_get() {
        let args = Args::parse_from(["tracecap", "archive", "get", "res", "abc", "-o", "out.bin"]);
        match args.command {
            Command::Archive(ArchiveCommand::Get { archive, id, output }) => {
                assert_eq!(archive, PathBuf::from("res"));
                assert_eq!(id, "abc");
                assert_eq!(output, Some(PathBuf::from("out.bin")));
            }
            _ => panic!("expected archive get"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["tracecap", "capture", "run1", "a.bin", "--config", "c.json", "-q"]);
        assert!(args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
    }

    #[test]
    fn test_put_requires_files() {
        assert!(Args::try_parse_from(["tracecap", "archive", "put", "res"]).is_err());
    }
}
