//! Versioned values and the source keys that scope their versions.
//!
//! Every value flowing through a pipeline carries a [`VersionMap`]: one
//! monotonic `u64` per contributing [`SourceKey`]. Structural keys mean the
//! same thing in every configuration of a project; local keys only mean
//! something inside one configuration and must be dropped before values from
//! different configurations can be joined.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const LOCAL_PREFIX: &str = "local:";

// ---------------------------------------------------------------------------
// Source keys
// ---------------------------------------------------------------------------

/// Whether a source key is shared across configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    /// Same meaning in every configuration (e.g. the project-wide generation).
    Structural,
    /// Only meaningful within one configuration.
    Local,
}

/// Identifies one dimension that contributes a version to a value.
///
/// Text form: structural keys print as their bare name, local keys as
/// `local:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceKey {
    name: String,
    scope: KeyScope,
}

impl SourceKey {
    pub fn structural(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: KeyScope::Structural,
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: KeyScope::Local,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> KeyScope {
        self.scope
    }

    pub fn is_local(&self) -> bool {
        self.scope == KeyScope::Local
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            KeyScope::Structural => f.write_str(&self.name),
            KeyScope::Local => write!(f, "{LOCAL_PREFIX}{}", self.name),
        }
    }
}

impl FromStr for SourceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let key = match s.strip_prefix(LOCAL_PREFIX) {
            Some(name) => Self::local(name),
            None => Self::structural(s),
        };
        if key.name.is_empty() {
            return Err(CoreError::InvalidSourceKey(s.to_string()));
        }
        Ok(key)
    }
}

impl TryFrom<String> for SourceKey {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SourceKey> for String {
    fn from(key: SourceKey) -> Self {
        key.to_string()
    }
}

/// Keys published by the host for every configured project.
pub mod well_known {
    use super::SourceKey;

    /// Project-wide evaluation generation; bumps for every configuration at once.
    pub fn project_generation() -> SourceKey {
        SourceKey::structural("project-generation")
    }

    /// Project capabilities generation.
    pub fn capabilities() -> SourceKey {
        SourceKey::structural("project-capabilities")
    }

    /// Identity of the configured project that produced a value.
    pub fn configured_project_identity() -> SourceKey {
        SourceKey::local("configured-project-identity")
    }

    /// Per-configuration evaluation counter.
    pub fn configured_project_version() -> SourceKey {
        SourceKey::local("configured-project-version")
    }

    /// Per-configuration design-time build counter.
    pub fn build_generation() -> SourceKey {
        SourceKey::local("build-generation")
    }
}

// ---------------------------------------------------------------------------
// Version maps
// ---------------------------------------------------------------------------

/// Per-source version markers of a value.
pub type VersionMap = BTreeMap<SourceKey, u64>;

/// `true` when `a` and `b` hold the same version for every key they share.
///
/// Keys present in only one of the maps are ignored.
pub fn versions_agree(a: &VersionMap, b: &VersionMap) -> bool {
    a.iter()
        .all(|(key, version)| b.get(key).map_or(true, |other| other == version))
}

/// Reject `next` if any key it shares with `previous` moved backwards.
pub fn check_monotonic(previous: &VersionMap, next: &VersionMap) -> Result<(), CoreError> {
    for (key, &prev) in previous {
        if let Some(&version) = next.get(key) {
            if version < prev {
                return Err(CoreError::NonMonotonicVersion {
                    key: key.clone(),
                    previous: prev,
                    next: version,
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Versioned value
// ---------------------------------------------------------------------------

/// A value tagged with the versions of every source that contributed to it.
///
/// Equal version maps on two independently produced values suggest, but do
/// not prove, equal content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue<T> {
    pub value: T,
    #[serde(default)]
    pub versions: VersionMap,
}

impl<T> VersionedValue<T> {
    pub fn new(value: T, versions: VersionMap) -> Self {
        Self { value, versions }
    }

    /// Remove `keys` from the version map, keeping the value untouched.
    ///
    /// Keys that are not present are ignored.
    pub fn drop_keys(mut self, keys: &BTreeSet<SourceKey>) -> Self {
        self.versions.retain(|key, _| !keys.contains(key));
        self
    }

    /// Remove every [`KeyScope::Local`] key.
    pub fn drop_local_keys(mut self) -> Self {
        self.versions.retain(|key, _| !key.is_local());
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> VersionedValue<U> {
        VersionedValue {
            value: f(self.value),
            versions: self.versions,
        }
    }

    /// Local keys still present in the version map.
    pub fn local_keys(&self) -> impl Iterator<Item = &SourceKey> {
        self.versions.keys().filter(|key| key.is_local())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
