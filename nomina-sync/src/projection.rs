//! Version-key projection applied before a join.

use std::collections::BTreeSet;

use nomina_core::{PipelineKeys, SourceKey, VersionedValue};

/// Which version keys a pipeline strips from every value it joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyProjection {
    /// Strip every local key.
    AllLocal,
    /// Strip exactly these keys.
    Keys(BTreeSet<SourceKey>),
}

impl KeyProjection {
    pub fn from_keys(keys: &PipelineKeys) -> Self {
        match keys.drop_set() {
            Some(set) => Self::Keys(set),
            None => Self::AllLocal,
        }
    }

    /// Apply the projection. Purely structural; the value is untouched.
    ///
    /// A local key that survives is logged: the join will most likely never
    /// reach agreement with values from another configuration.
    pub fn apply<T>(&self, value: VersionedValue<T>) -> VersionedValue<T> {
        let projected = match self {
            Self::AllLocal => value.drop_local_keys(),
            Self::Keys(keys) => value.drop_keys(keys),
        };
        if let Some(key) = projected.local_keys().next() {
            tracing::warn!("local version key '{key}' survived projection; join may never agree");
        }
        projected
    }
}

impl Default for KeyProjection {
    fn default() -> Self {
        Self::AllLocal
    }
}
