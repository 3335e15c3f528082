//! Error types for typed storage access.

use poseidon_host::{HostError, StatusCode};
use poseidon_rpc::HandlerError;

/// Errors from a collection accessor.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A stored record exists but does not decode into the descriptor's
    /// type. Never replaced by a default.
    #[error("corrupt record {collection}/{key} for owner `{owner_id}`: {message}")]
    RecordCorrupt {
        collection: String,
        key: String,
        owner_id: String,
        message: String,
    },

    /// A value could not be serialized for writing.
    #[error("cannot encode record {collection}/{key} for owner `{owner_id}`: {message}")]
    Encode {
        collection: String,
        key: String,
        owner_id: String,
        message: String,
    },

    /// The runtime's storage failed; passed through as is.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl StorageError {
    /// The owner whose record caused the error, if one did.
    pub fn owner_id(&self) -> Option<&str> {
        match self {
            StorageError::RecordCorrupt { owner_id, .. } | StorageError::Encode { owner_id, .. } => {
                Some(owner_id)
            }
            StorageError::Host(_) => None,
        }
    }
}

impl From<StorageError> for HandlerError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Host(host) => host.into(),
            other => HandlerError::from_source(StatusCode::Internal, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_names_the_owner() {
        let e = StorageError::RecordCorrupt {
            collection: "stats".into(),
            key: "summary".into(),
            owner_id: "u7".into(),
            message: "expected value".into(),
        };
        assert_eq!(e.owner_id(), Some("u7"));
        assert!(e.to_string().contains("stats/summary"));
        assert!(e.to_string().contains("u7"));
    }

    #[test]
    fn host_errors_stay_unchanged() {
        let e = StorageError::from(HostError::storage("timeout"));
        assert_eq!(e.to_string(), "storage error: timeout");
        assert_eq!(e.owner_id(), None);

        let handler = HandlerError::from(StorageError::from(HostError::Cancelled));
        assert_eq!(handler.code(), StatusCode::Cancelled);
    }

    #[test]
    fn corrupt_records_are_internal_for_callers() {
        let handler = HandlerError::from(StorageError::RecordCorrupt {
            collection: "c".into(),
            key: "k".into(),
            owner_id: "o".into(),
            message: "m".into(),
        });
        assert_eq!(handler.code(), StatusCode::Internal);
    }
}
