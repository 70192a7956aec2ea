//! # lakeward-maintenance
//!
//! Background maintenance for Lakeward tables. The core subsystem is the
//! orphan-file garbage collector: it reconciles what the storage layer
//! physically contains with what a table's versioned metadata currently
//! references, and deletes files no live snapshot can reach.
//!
//! The pipeline for one store subtree is:
//!
//! 1. [`scan`] — compute the reachable set from the snapshot log
//! 2. [`list`] — enumerate physical files with modification times
//! 3. [`classify`] — the three-part orphan gate (reachability, age,
//!    protected markers), evaluated in that order
//! 4. [`delete`] — independent per-file deletion plus best-effort
//!    empty-directory sweep
//!
//! [`orchestrator::OrphanCleaner`] sequences the pipeline per table
//! (data subtree first, then metadata), serializes cycles per table, and
//! bounds concurrency across the fleet.
//!
//! # Why orphan cleaning is load-bearing
//!
//! Every failed commit, abandoned staging write, and racing writer
//! leaves unreferenced files behind. Without collection, storage grows
//! without bound; with careless collection, a live file dies. The
//! classifier gate is the single most important correctness contract in
//! this crate.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod classify;
pub mod delete;
pub mod list;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod scan;

pub use orchestrator::{CleanerConfig, OrphanCleaner};
pub use report::{CleanOutcome, CleanPlan, CleanStats, StoreCleanReport, TableCleanReport};
