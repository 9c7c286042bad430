//! Domain model for tracecap
//!
//! Identity newtypes shared by the encoder and the archive, and the error
//! enums returned at the library boundary.

pub mod errors;
pub mod types;

pub use types::{ResourceId, TypeTag};

pub use errors::{ArchiveError, ConfigError, SessionError};
