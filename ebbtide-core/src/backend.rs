//! Trait boundary to the torrent engine collaborator.
//!
//! The engine itself (swarm, peer wire, piece selection) is an opaque
//! external component; Ebbtide only drives it through this narrow seam and
//! treats every command as fire-and-confirm with no richer feedback.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::magnet::StableId;

/// Errors surfaced by the torrent engine collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Engine process not reachable or not yet initialized.
    #[error("torrent engine not ready")]
    NotReady,

    /// A command was accepted by the seam but failed inside the engine.
    #[error("engine command failed: {reason}")]
    Command { reason: String },
}

/// Coarse engine-side lifecycle state of a torrent.
///
/// Mirrors the state set a typical engine reports. Consumers that need a
/// simpler view (the RPC facade collapses to paused-or-not) derive it from
/// the flags on [`TorrentRow`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Checking,
    FetchingMetadata,
    Downloading,
    Finished,
    Seeding,
    Unknown,
}

/// One live torrent as seen in a single poll snapshot.
///
/// `ordinal` is the row's position within the snapshot that produced it and
/// is meaningless outside that tick; `id` is the restart-stable identity.
/// The two id spaces must never be conflated.
#[derive(Debug, Clone, Serialize)]
pub struct TorrentRow {
    /// Position within this snapshot only; never cached across ticks
    pub ordinal: usize,
    /// Restart-stable identity
    pub id: StableId,
    pub name: String,
    /// Completion fraction in `[0, 1]`
    pub progress: f32,
    pub total_bytes: i64,
    pub done_bytes: i64,
    /// Bytes per second
    pub download_rate: i64,
    /// Bytes per second
    pub upload_rate: i64,
    pub peers: u32,
    pub seeds: u32,
    pub state: EngineState,
    pub paused: bool,
    pub seeding: bool,
    pub errored: bool,
    /// Category resolved from persisted state during reconciliation
    pub category: Option<String>,
}

/// Operations Ebbtide issues against the torrent engine.
///
/// `pause`, `resume` and `remove` are ok-or-noop: an unknown identity is
/// silently accepted, which makes the settling pass and repeated intent
/// enforcement safe to reissue.
#[async_trait]
pub trait TorrentBackend: Send + 'static {
    /// Submits a magnet for download into `save_path`.
    async fn add(&mut self, magnet: &str, save_path: &Path) -> Result<(), EngineError>;

    /// Fetches up to `max_items` live rows.
    ///
    /// Row `category` is left unresolved; the reconciler fills it from
    /// persisted state.
    async fn list_snapshot(&mut self, max_items: usize) -> Result<Vec<TorrentRow>, EngineError>;

    /// Resolves the stable identity at a position of the engine's current
    /// list, if any.
    async fn stable_id_at(&mut self, ordinal: usize) -> Option<StableId>;

    async fn pause(&mut self, id: &StableId) -> Result<(), EngineError>;

    async fn resume(&mut self, id: &StableId) -> Result<(), EngineError>;

    async fn remove(&mut self, id: &StableId, delete_files: bool) -> Result<(), EngineError>;
}
