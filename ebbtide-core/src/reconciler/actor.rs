//! Reconciler actor: single task owning all reconciliation state.
//!
//! Commands, poll ticks, and internal notifications are serialized on one
//! task, so every state mutation happens in a single place with no locks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};

use super::commands::ReconcilerCommand;
use super::core::Reconciler;
use super::handle::ReconcilerHandle;
use crate::backend::TorrentBackend;
use crate::completion::{CompletionHandler, MetadataLookup};
use crate::config::{ReconcilerConfig, StorageConfig};
use crate::store::StateStore;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Spawns the reconciler actor and returns a handle to it.
///
/// The actor restores persisted state, reseeds the backend, and then polls
/// on the configured tick interval until every handle is dropped or
/// shutdown is requested.
pub fn spawn_reconciler<B: TorrentBackend>(
    config: ReconcilerConfig,
    storage: &StorageConfig,
    backend: B,
    metadata: Arc<dyn MetadataLookup>,
    completion: Arc<dyn CompletionHandler>,
) -> ReconcilerHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();

    let store = StateStore::new(storage.state_dir.clone(), storage.temp_file_suffix);
    let reconciler = Reconciler::new(config, backend, store, metadata, completion, internal_tx);

    tokio::spawn(run_actor_loop(reconciler, command_rx, internal_rx));

    ReconcilerHandle::new(command_tx)
}

async fn run_actor_loop<B: TorrentBackend>(
    mut reconciler: Reconciler<B>,
    mut commands: mpsc::Receiver<ReconcilerCommand>,
    mut internal: mpsc::UnboundedReceiver<ReconcilerCommand>,
) {
    reconciler.restore().await;

    let mut ticker = interval(reconciler.config().tick_interval);
    // A slow tick must not cause a burst of catch-up polls.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("reconciler actor started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reconciler.tick().await;
            }
            command = commands.recv() => {
                match command {
                    Some(command) => {
                        if handle_command(&mut reconciler, command).await {
                            break;
                        }
                    }
                    None => break, // all handles dropped
                }
            }
            Some(command) = internal.recv() => {
                // Internal notifications never request shutdown.
                handle_command(&mut reconciler, command).await;
            }
        }
    }

    tracing::info!("reconciler actor stopped");
}

/// Processes one command. Returns true when the actor should stop.
async fn handle_command<B: TorrentBackend>(
    reconciler: &mut Reconciler<B>,
    command: ReconcilerCommand,
) -> bool {
    match command {
        ReconcilerCommand::AddMagnet {
            magnet,
            save_path,
            category,
            responder,
        } => {
            let result = reconciler.add_magnet(magnet, save_path, category).await;
            let _ = responder.send(result);
        }
        ReconcilerCommand::Pause { id, responder } => {
            let _ = responder.send(reconciler.pause_torrent(id).await);
        }
        ReconcilerCommand::Resume { id, responder } => {
            let _ = responder.send(reconciler.resume_torrent(id).await);
        }
        ReconcilerCommand::Remove {
            id,
            delete_files,
            responder,
        } => {
            let _ = responder.send(reconciler.remove_torrent(id, delete_files).await);
        }
        ReconcilerCommand::SetCategory {
            id,
            category,
            responder,
        } => {
            let _ = responder.send(reconciler.set_category(id, category).await);
        }
        ReconcilerCommand::Snapshot { responder } => {
            let _ = responder.send(reconciler.snapshot());
        }
        ReconcilerCommand::Settle => {
            reconciler.settle().await;
        }
        ReconcilerCommand::MarkCleaned { id } => {
            reconciler.mark_cleaned(id).await;
        }
        ReconcilerCommand::Shutdown { responder } => {
            let _ = responder.send(());
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::completion::LoggingCompletion;
    use crate::config::EbbtideConfig;
    use crate::magnet::StableId;
    use crate::reconciler::test_mocks::StaticMetadata;
    use crate::simulation::SimulatedBackend;

    const MAGNET: &str =
        "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=Actor+Test";

    fn spawn_test_actor(state_dir: &std::path::Path) -> ReconcilerHandle {
        let mut config = EbbtideConfig::for_testing();
        config.storage.state_dir = state_dir.to_path_buf();
        spawn_reconciler(
            config.reconciler,
            &config.storage,
            SimulatedBackend::with_progress_step(0.5),
            Arc::new(StaticMetadata::missing()),
            Arc::new(LoggingCompletion),
        )
    }

    #[tokio::test]
    async fn add_then_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_test_actor(dir.path());

        let added = handle
            .add_magnet(MAGNET, "/dl".into(), Some("tv".into()))
            .await
            .unwrap();
        assert_eq!(added.name, "Actor Test");
        assert_eq!(
            added.id.as_str(),
            "0123456789abcdef0123456789abcdef01234567"
        );

        // Wait out a few ticks so the snapshot is published with categories.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let rows = handle.snapshot().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category.as_deref(), Some("tv"));

        handle.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn pause_intent_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let id = StableId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();

        let handle = spawn_test_actor(dir.path());
        handle.add_magnet(MAGNET, "/dl".into(), None).await.unwrap();
        handle.pause(id.clone()).await.unwrap();
        handle.shutdown().await.unwrap();

        // Second run restores entries and settles the pause flag.
        let handle = spawn_test_actor(dir.path());
        tokio::time::sleep(Duration::from_millis(150)).await;
        let rows = handle.snapshot().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].paused, "settling must reapply persisted pause intent");
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn set_category_on_unknown_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_test_actor(dir.path());

        let missing = StableId::from_hex(&"f".repeat(40)).unwrap();
        let err = handle
            .set_category(missing, Some("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::reconciler::ReconcileError::UnknownTorrent { .. }
        ));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn remove_drops_persisted_entry() {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_test_actor(dir.path());

        let added = handle.add_magnet(MAGNET, "/dl".into(), None).await.unwrap();
        handle.remove(added.id, true).await.unwrap();
        handle.shutdown().await.unwrap();

        // A fresh run restores nothing.
        let handle = spawn_test_actor(dir.path());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.snapshot().await.unwrap().is_empty());
        handle.shutdown().await.unwrap();
    }
}
