//! Handle for communicating with the reconciler actor.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

use super::commands::{AddedTorrent, ReconcileError, ReconcilerCommand};
use crate::backend::TorrentRow;
use crate::magnet::StableId;

/// Cloneable async API over the reconciler actor.
///
/// Every call is linearized with poll ticks: the actor processes commands
/// and ticks on one task, so control issued here never races reconciliation.
#[derive(Clone)]
pub struct ReconcilerHandle {
    sender: mpsc::Sender<ReconcilerCommand>,
}

impl ReconcilerHandle {
    pub fn new(sender: mpsc::Sender<ReconcilerCommand>) -> Self {
        Self { sender }
    }

    /// Persists and submits a magnet.
    ///
    /// The entry is upserted by stable identity, so re-adding a known
    /// magnet updates it in place.
    ///
    /// # Errors
    /// - `ReconcileError::Engine` - Engine rejected or could not accept the add
    /// - `ReconcileError::Store` - Persisting the entry failed
    pub async fn add_magnet(
        &self,
        magnet: &str,
        save_path: PathBuf,
        category: Option<String>,
    ) -> Result<AddedTorrent, ReconcileError> {
        let (responder, rx) = oneshot::channel();
        let cmd = ReconcilerCommand::AddMagnet {
            magnet: magnet.to_string(),
            save_path,
            category,
            responder,
        };

        self.sender
            .send(cmd)
            .await
            .map_err(|_| ReconcileError::Shutdown)?;

        rx.await.map_err(|_| ReconcileError::Shutdown)?
    }

    /// Records pause intent for an identity and pauses it in the engine.
    pub async fn pause(&self, id: StableId) -> Result<(), ReconcileError> {
        let (responder, rx) = oneshot::channel();
        let cmd = ReconcilerCommand::Pause { id, responder };

        self.sender
            .send(cmd)
            .await
            .map_err(|_| ReconcileError::Shutdown)?;

        rx.await.map_err(|_| ReconcileError::Shutdown)?
    }

    /// Clears pause intent for an identity and resumes it in the engine.
    pub async fn resume(&self, id: StableId) -> Result<(), ReconcileError> {
        let (responder, rx) = oneshot::channel();
        let cmd = ReconcilerCommand::Resume { id, responder };

        self.sender
            .send(cmd)
            .await
            .map_err(|_| ReconcileError::Shutdown)?;

        rx.await.map_err(|_| ReconcileError::Shutdown)?
    }

    /// Removes a torrent from the engine and drops its persisted state.
    pub async fn remove(&self, id: StableId, delete_files: bool) -> Result<(), ReconcileError> {
        let (responder, rx) = oneshot::channel();
        let cmd = ReconcilerCommand::Remove {
            id,
            delete_files,
            responder,
        };

        self.sender
            .send(cmd)
            .await
            .map_err(|_| ReconcileError::Shutdown)?;

        rx.await.map_err(|_| ReconcileError::Shutdown)?
    }

    /// Edits a stored entry's category in place.
    ///
    /// # Errors
    /// - `ReconcileError::UnknownTorrent` - No stored entry with this key
    pub async fn set_category(
        &self,
        id: StableId,
        category: Option<String>,
    ) -> Result<(), ReconcileError> {
        let (responder, rx) = oneshot::channel();
        let cmd = ReconcilerCommand::SetCategory {
            id,
            category,
            responder,
        };

        self.sender
            .send(cmd)
            .await
            .map_err(|_| ReconcileError::Shutdown)?;

        rx.await.map_err(|_| ReconcileError::Shutdown)?
    }

    /// Returns the last published snapshot.
    ///
    /// The list is replaced atomically at the end of each successful tick;
    /// readers never observe a partially built snapshot.
    pub async fn snapshot(&self) -> Result<Vec<TorrentRow>, ReconcileError> {
        let (responder, rx) = oneshot::channel();
        let cmd = ReconcilerCommand::Snapshot { responder };

        self.sender
            .send(cmd)
            .await
            .map_err(|_| ReconcileError::Shutdown)?;

        rx.await.map_err(|_| ReconcileError::Shutdown)
    }

    /// Shuts down the actor gracefully.
    pub async fn shutdown(&self) -> Result<(), ReconcileError> {
        let (responder, rx) = oneshot::channel();
        let cmd = ReconcilerCommand::Shutdown { responder };

        self.sender
            .send(cmd)
            .await
            .map_err(|_| ReconcileError::Shutdown)?;

        rx.await.map_err(|_| ReconcileError::Shutdown)
    }

    /// True while the actor is accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}
