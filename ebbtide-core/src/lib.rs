//! Ebbtide Core - Torrent reconciliation over an opaque engine
//!
//! This crate provides the daemon's fundamental building blocks: stable
//! torrent identity, the polling reconciler actor, persisted state storage,
//! and the collaborator seams for metadata enrichment and completion
//! actions.

pub mod backend;
pub mod completion;
pub mod config;
pub mod magnet;
pub mod reconciler;
pub mod simulation;
pub mod store;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use backend::{EngineError, EngineState, TorrentBackend, TorrentRow};
pub use completion::{CompletionHandler, MetadataLookup, TitleMetadata};
pub use config::EbbtideConfig;
pub use magnet::StableId;
pub use reconciler::{ReconcileError, ReconcilerHandle, spawn_reconciler};
pub use store::{StateStore, StoredEntry};

/// Core errors that can bubble up from any Ebbtide subsystem.
#[derive(Debug, thiserror::Error)]
pub enum EbbtideError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Reconciler error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EbbtideError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            EbbtideError::Engine(EngineError::NotReady) => {
                "Torrent engine is not ready".to_string()
            }
            EbbtideError::Engine(_) => "Torrent engine error occurred".to_string(),
            EbbtideError::Store(_) => "State storage error occurred".to_string(),
            EbbtideError::Reconcile(ReconcileError::UnknownTorrent { id }) => {
                format!("Torrent {id} not found")
            }
            EbbtideError::Reconcile(_) => "Reconciler error occurred".to_string(),
            EbbtideError::Configuration { reason } => {
                format!("Configuration error: {reason}")
            }
            EbbtideError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            EbbtideError::Configuration { .. }
                | EbbtideError::Reconcile(ReconcileError::UnknownTorrent { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, EbbtideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_torrent_names_the_id_in_the_user_message() {
        let id = StableId::from_hex(&"ab".repeat(20)).unwrap();
        let err = EbbtideError::from(ReconcileError::UnknownTorrent { id: id.clone() });
        assert_eq!(err.user_message(), format!("Torrent {id} not found"));
        assert!(err.is_user_error());
    }

    #[test]
    fn configuration_errors_are_user_errors() {
        let err = EbbtideError::Configuration {
            reason: "bad flag".to_string(),
        };
        assert!(err.is_user_error());
        assert_eq!(err.user_message(), "Configuration error: bad flag");
    }

    #[test]
    fn store_errors_convert_and_stay_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = EbbtideError::from(store::StoreError::Io(io));
        assert!(matches!(err, EbbtideError::Store(_)));
        assert!(!err.is_user_error());
    }

    #[test]
    fn engine_not_ready_gets_a_dedicated_message() {
        let err = EbbtideError::from(EngineError::NotReady);
        assert_eq!(err.user_message(), "Torrent engine is not ready");
        assert!(!err.is_user_error());
    }
}
