//! # lakeward-table
//!
//! The table-format read layer for Lakeward: versioned store metadata,
//! snapshot logs, manifest enumeration, and table/store handles.
//!
//! A *table* owns one store (unkeyed) or a base + change store pair
//! (keyed). Each *store* is a physical `data/` + `metadata/` subtree with
//! its own snapshot-versioned metadata. The maintenance layer consumes
//! this crate read-only; the small append-commit support in [`commit`]
//! exists so external writers and tests can produce committed snapshots.
//!
//! Handles are deliberately cheap and uncached: the catalog resolver
//! returns a fresh [`handle::TableHandle`] per cleaning cycle, and
//! [`handle::StoreHandle::load_metadata`] re-reads the version hint on
//! every call. This is a correctness contract against concurrent commits,
//! not an accident of object lifetime.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod commit;
pub mod config;
pub mod handle;
pub mod metadata;
pub mod resolver;

pub use commit::AppendFiles;
pub use config::RetentionConfig;
pub use handle::{StoreHandle, StoreKind, TableHandle, TableIdent, TableLayout};
pub use metadata::{FileContent, Manifest, ManifestEntry, ManifestList, Snapshot, StoreMetadata};
pub use resolver::{InMemoryResolver, TableResolver};
