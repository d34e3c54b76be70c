//! # nomina-restore
//!
//! Projects per-configuration rule snapshots into one immutable
//! [`RestoreInfoTree`] and decides whether a new tree is worth nominating.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nomina_core::ProjectSnapshot;
//! use nomina_restore::{build, ChangeSuppressor};
//!
//! fn on_tuple(suppressor: &mut ChangeSuppressor, configurations: &[ProjectSnapshot]) {
//!     let tree = build(r"C:\Src\App\App.csproj", configurations);
//!     if suppressor.should_nominate(&tree) {
//!         // hand the tree to the restore sink, then:
//!         suppressor.accept(tree);
//!     }
//! }
//! ```

pub mod builder;
pub mod equality;
pub mod error;
pub mod render;
pub mod tree;

pub use builder::build;
pub use equality::{fingerprint, ChangeSuppressor};
pub use error::RestoreError;
pub use render::{diff_trees, to_json, to_yaml, TreeDiff};
pub use tree::{ReferenceItem, ReferenceProperty, RestoreInfoTree, TargetFrameworkInfo};
