//! # lakeward-core
//!
//! Core abstractions for the Lakeward lakehouse table-maintenance service.
//!
//! This crate provides the foundational types used across all Lakeward
//! components:
//!
//! - **Storage**: abstract object/file storage backend with conditional
//!   writes, recursive listing, and directory removal semantics
//! - **Paths**: URI normalization so storage listings and metadata references
//!   compare as plain strings
//! - **Errors**: shared error definitions and result types
//! - **Observability**: logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `lakeward-core` is the only crate allowed to define shared primitives.
//! The table-format read layer lives in `lakeward-table`; the orphan-file
//! collector lives in `lakeward-maintenance`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod observability;
pub mod paths;
pub mod storage;

pub use error::{Error, Result};
pub use observability::{init_logging, table_span, LogFormat};
pub use storage::{
    DirRemoval, FileMeta, MemoryBackend, StorageBackend, WritePrecondition, WriteResult,
};
