//! Command definitions for the reconciler actor.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::backend::{EngineError, TorrentRow};
use crate::magnet::StableId;
use crate::store::StoreError;

/// Errors surfaced to reconciler callers.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The actor is gone; no further commands will be accepted.
    #[error("reconciler is shut down")]
    Shutdown,

    #[error("no stored torrent with key {id}")]
    UnknownTorrent { id: StableId },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reply for a successful add: the most-recently-added row as the engine
/// reports it.
///
/// Relies on list ordering, so it is an approximation that holds for a
/// single client adding one torrent at a time; concurrent adds can observe
/// a neighbor's row.
#[derive(Debug, Clone)]
pub struct AddedTorrent {
    pub ordinal: usize,
    pub id: StableId,
    pub name: String,
}

/// Commands processed by the reconciler actor.
///
/// External commands carry a oneshot responder; internal commands (settle
/// trigger, completion bookkeeping) are fire-and-forget notifications from
/// tasks the actor itself spawned.
pub enum ReconcilerCommand {
    /// Persist and submit a magnet; replies with the added row.
    AddMagnet {
        magnet: String,
        save_path: PathBuf,
        category: Option<String>,
        responder: oneshot::Sender<Result<AddedTorrent, ReconcileError>>,
    },
    /// Record pause intent and issue it to the engine.
    Pause {
        id: StableId,
        responder: oneshot::Sender<Result<(), ReconcileError>>,
    },
    /// Clear pause intent and issue resume to the engine.
    Resume {
        id: StableId,
        responder: oneshot::Sender<Result<(), ReconcileError>>,
    },
    /// Remove from the engine and drop persisted state.
    Remove {
        id: StableId,
        delete_files: bool,
        responder: oneshot::Sender<Result<(), ReconcileError>>,
    },
    /// Edit a stored entry's category in place.
    SetCategory {
        id: StableId,
        category: Option<String>,
        responder: oneshot::Sender<Result<(), ReconcileError>>,
    },
    /// Read the last published snapshot.
    Snapshot {
        responder: oneshot::Sender<Vec<TorrentRow>>,
    },
    /// Internal: run the one-shot settling pass.
    Settle,
    /// Internal: a completion action succeeded for this identity.
    MarkCleaned { id: StableId },
    /// Shut down the actor gracefully.
    Shutdown { responder: oneshot::Sender<()> },
}
