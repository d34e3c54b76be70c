//! # nomina-sync
//!
//! Synchronous engine stages, free of any runtime:
//!
//! - [`projection`] strips version keys so heterogeneous sources can be joined
//! - [`join`] waits for N sources to agree on a version frontier
//! - [`diff`] classifies keys between two snapshots and folds renames
//! - [`reconcile`] turns a diff into idempotent add/remove/update sink calls
//! - [`language_service`] wires the above for per-configuration compiler state

pub mod diff;
pub mod error;
pub mod join;
pub mod language_service;
pub mod projection;
pub mod reconcile;
pub mod tracked;

pub use error::SyncError;
pub use join::{JoinEvent, JoinedTuple, SyncJoin};
pub use projection::KeyProjection;
pub use reconcile::{ChangeOrigin, ReconcileOp, ReconcileSink, ReconcileSummary, Reconciler};
pub use tracked::TrackedPathSet;
