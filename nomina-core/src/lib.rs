//! Nomina core library: data model shared by every pipeline stage.
//!
//! - [`version`]: source keys, version maps, [`VersionedValue`]
//! - [`collection`]: the ordered, first-wins [`KeyedCollection`]
//! - [`snapshot`]: rule snapshots published per configuration
//! - [`diff`]: [`ProjectChangeDiff`]
//! - [`paths`]: lexical path combination for host-reported paths
//! - [`config`]: YAML pipeline configuration
//! - [`error`]: [`CoreError`]

pub mod collection;
pub mod config;
pub mod diff;
pub mod error;
pub mod paths;
pub mod snapshot;
pub mod version;

pub use collection::{Keyed, KeyedCollection};
pub use config::{PipelineConfig, PipelineKeys};
pub use diff::{ChangeKind, ProjectChangeDiff};
pub use error::CoreError;
pub use snapshot::{Item, ProjectSnapshot, RuleSnapshot, SnapshotDocument};
pub use version::{versions_agree, KeyScope, SourceKey, VersionMap, VersionedValue};
