use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::Fault;

/// Identity of a managed object: a (type, value) pair unique within a
/// registry namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagedObjectReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(
        kind: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// True until the registry (or a session) allocates a value.
    pub fn is_unallocated(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for ManagedObjectReference {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

impl FromStr for ManagedObjectReference {
    type Err = Fault;

    /// Parses the `Type:value` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, value)) if !kind.is_empty() && !value.is_empty() => Ok(Self::new(kind, value)),
            _ => Err(Fault::invalid_argument("obj")),
        }
    }
}
