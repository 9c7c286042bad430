//! # tracecap - Trace Capture Serialization and Storage
//!
//! tracecap is the substrate a runtime instrumentation layer records into: a
//! compact binary encoder for structured protocol events, a content-addressed
//! blob store for large immutable payloads, and an asynchronous ring buffer
//! that keeps slow storage off the instrumented thread.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Instrumented Producer Thread                   │
//! └───────────────┬─────────────────────────────────┬───────────────┘
//!                 │ events                          │ large resources
//!                 ▼                                 ▼
//! ┌───────────────────────────────┐   ┌─────────────────────────────┐
//! │        VarintEncoder          │   │          Archive            │
//! │  primitives, strings, shared  │   │  <name>.index + <name>.data │
//! │  entity / object graphs       │   │  content-hash keyed, dedup  │
//! └───────────────┬───────────────┘   └─────────────────────────────┘
//!                 │ bytes                     ▲
//!                 ▼                           │ id only goes into
//! ┌───────────────────────────────┐           │ the event stream
//! │       AsyncRingBuffer         │───────────┘
//! │  bounded ring, drain thread   │
//! └───────────────┬───────────────┘
//!                 │ bytes, in order
//!                 ▼
//! ┌───────────────────────────────┐
//! │     ByteSink (file, memory)   │
//! └───────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`sink`]: the `ByteSink` contract plus file and in-memory sinks
//! - [`ring`]: `AsyncRingBuffer`, a bounded single-producer ring drained by a
//!   dedicated thread
//! - [`encoding`]: schema descriptors (`Entity`, `TypeTag`), the `Encoder`
//!   trait and the `VarintEncoder`
//! - [`archive`]: `RecordFile` (growable, optionally mapped append-only file),
//!   index replay and the `Archive` itself
//! - [`session`]: `CaptureSession`, the usual wiring of all of the above
//! - [`config`]: JSON configuration
//! - [`cli`]: command-line argument definitions for the `tracecap` binary
//! - [`domain`]: newtypes and error enums
//!
//! The bit-level wire format lives in the `tracecap-common` crate so tooling can
//! share it without pulling in threads or files.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Store blobs into an archive, keyed by content hash
//! tracecap archive put ./capture/resources shader.spv texture.bin
//!
//! # List and verify what is stored
//! tracecap archive ls ./capture/resources
//! tracecap archive verify ./capture/resources
//!
//! # Record files into a fresh capture session
//! tracecap capture ./capture/run1 shader.spv texture.bin
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod domain;
pub mod encoding;
pub mod ring;
pub mod session;
pub mod sink;
