//! Simulator Error Hierarchy
//!
//! Two layers:
//! - [`Fault`]: protocol faults returned in-band to clients. They mirror the
//!   fault kinds of the emulated API and are never transport failures.
//! - [`Error`]: crate-level failures (configuration, schema construction).

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::ManagedObjectReference;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Result of a protocol operation: the value or an in-band fault.
pub type FaultResult<T> = std::result::Result<T, Fault>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Protocol fault surfaced through a crate-level API
    #[error(transparent)]
    Fault(#[from] Fault),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Type table construction failures
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

/// Fault kinds of the emulated protocol.
///
/// Serialized with the protocol's own type and field names, e.g.
/// `{"InvalidArgument":{"invalidProperty":"maxCount"}}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all_fields = "camelCase")]
pub enum Fault {
    /// Malformed request argument (bad traversal spec, page size, ...)
    #[error("A specified parameter was not correct: {invalid_property}")]
    InvalidArgument { invalid_property: String },

    /// Unresolvable or malformed property path
    #[error("Invalid property: {name}")]
    InvalidProperty { name: String },

    /// Object absent from the registry
    #[error("The object '{obj}' has already been deleted or has not been completely created")]
    ManagedObjectNotFound { obj: ManagedObjectReference },

    /// Operation refused in the current state (e.g. collector limit reached)
    #[error("The operation is not allowed in the current state")]
    InvalidState,

    /// A blocking call was cancelled by the client or its request context
    #[error("The request was canceled")]
    RequestCanceled,

    /// Property read without an authenticated session
    #[error("Permission to perform this operation was denied: {privilege_id} on {object}")]
    NotAuthenticated {
        object: ManagedObjectReference,
        privilege_id: String,
    },
}

impl Fault {
    pub fn invalid_argument(property: impl Into<String>) -> Self {
        Fault::InvalidArgument {
            invalid_property: property.into(),
        }
    }

    pub fn invalid_property(name: impl Into<String>) -> Self {
        Fault::InvalidProperty { name: name.into() }
    }

    pub fn not_found(obj: &ManagedObjectReference) -> Self {
        Fault::ManagedObjectNotFound { obj: obj.clone() }
    }

    /// Protocol type name of the fault.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::InvalidArgument { .. } => "InvalidArgument",
            Fault::InvalidProperty { .. } => "InvalidProperty",
            Fault::ManagedObjectNotFound { .. } => "ManagedObjectNotFound",
            Fault::InvalidState => "InvalidState",
            Fault::RequestCanceled => "RequestCanceled",
            Fault::NotAuthenticated { .. } => "NotAuthenticated",
        }
    }
}
