//! Faults surfaced by client operations.

use thiserror::Error;

/// Type name used for faults that are not tied to a caller-supplied type.
pub const ANY_TYPE: &str = "any";

/// What went wrong while running one operation.
///
/// Every variant records the name of the type the operation was encoding or
/// decoding, so a fault can be traced back to the call that produced it.
#[derive(Error, Debug)]
pub enum Fault {
    #[error("store command {command} failed: {source}")]
    Store {
        command: &'static str,
        type_name: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("unable to encode value of type {type_name}: {source}")]
    Encode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to decode {key} as {type_name}: {source}")]
    Decode {
        key: String,
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("no value at {key}")]
    Missing {
        key: String,
        type_name: &'static str,
    },
}

impl Fault {
    pub fn type_name(&self) -> &'static str {
        match self {
            Fault::Store { type_name, .. }
            | Fault::Encode { type_name, .. }
            | Fault::Decode { type_name, .. }
            | Fault::Missing { type_name, .. } => *type_name,
        }
    }

    /// Returns `true` for faults raised by the store rather than the codec.
    pub fn is_store(&self) -> bool {
        matches!(self, Fault::Store { .. })
    }

    pub(crate) fn store(
        command: &'static str,
        type_name: &'static str,
    ) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Fault::Store {
            command,
            type_name,
            source,
        }
    }
}

/// The result of one operation.
pub type Outcome<T> = Result<T, Fault>;
