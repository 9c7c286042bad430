//! # Event Stream Encoding
//!
//! Turns structured protocol events into a compact, self-delimiting byte
//! stream. There is no framing and no magic number: a reader needs the same
//! schema knowledge as the writer to find value boundaries.
//!
//! ## Value Encodings
//!
//! | Value | Encoding |
//! |---|---|
//! | `bool`, `i8`, `u8` | one raw byte |
//! | `u16`..`u64` | unsigned varint |
//! | `i16`..`i64` | zigzag, then unsigned varint |
//! | `f32`, `f64` | bit pattern byte-reversed, then unsigned varint |
//! | string | varint length (0 for null), raw bytes |
//! | data | raw bytes |
//!
//! The varint layout itself lives in `tracecap_common::encode_uvarint`.
//!
//! ## Object Graphs
//!
//! Type descriptors ([`Entity`]) are shared by reference:
//!
//! ```text
//! first time a TypeTag is seen:   (entity_id << 1) | 1, name, field count, fields...
//! every later time:               (entity_id << 1)
//! ```
//!
//! Objects are never shared; each one gets the next object id:
//!
//! ```text
//! null object:      0
//! object:           (object_id << 1) | 1, entity reference, fields...
//! null variant:     0
//! variant:          entity reference, fields...
//! ```
//!
//! Entity and object ids both start at 1.

pub mod encoder;
pub mod schema;

pub use encoder::VarintEncoder;
pub use schema::{Encodable, Encoder, Entity, Field, FieldKind, SchemaRegistry};
