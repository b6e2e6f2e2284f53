//! Reconciliation state machine: poll ticks, settling, completion actions.
//!
//! All state here is owned by the actor task; there is exactly one mutator,
//! so no locking. Side-effect tasks (enrichment + completion) are detached
//! and report back through the internal command channel.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::commands::{AddedTorrent, ReconcileError, ReconcilerCommand};
use crate::backend::{TorrentBackend, TorrentRow};
use crate::completion::{CompletionHandler, MetadataLookup, title_query};
use crate::config::ReconcilerConfig;
use crate::magnet::StableId;
use crate::store::{StateStore, StoredEntry};

/// One strategy for matching a live identity to a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryTier {
    /// Live id equals the stored key.
    ExactKey,
    /// Re-deriving a key from the stored magnet yields the live id.
    RederivedKey,
    /// The stored magnet text contains the live id as a substring.
    /// Heuristic for legacy or partial persisted identities.
    MagnetContains,
}

/// Category resolution order: tried in sequence, first matching entry wins,
/// no merging across tiers.
pub const CATEGORY_TIER_ORDER: [CategoryTier; 3] = [
    CategoryTier::ExactKey,
    CategoryTier::RederivedKey,
    CategoryTier::MagnetContains,
];

fn tier_matches(entry: &StoredEntry, id: &StableId, tier: CategoryTier) -> bool {
    match tier {
        CategoryTier::ExactKey => entry.key == *id,
        CategoryTier::RederivedKey => {
            StableId::derive(&entry.magnet).is_some_and(|key| key == *id)
        }
        CategoryTier::MagnetContains => entry.magnet.contains(id.as_str()),
    }
}

/// The reconciler's owned state and logic. Driven by the actor loop.
pub struct Reconciler<B: TorrentBackend> {
    config: ReconcilerConfig,
    backend: B,
    store: StateStore,
    metadata: Arc<dyn MetadataLookup>,
    completion: Arc<dyn CompletionHandler>,
    internal: mpsc::UnboundedSender<ReconcilerCommand>,

    entries: Vec<StoredEntry>,
    desired_paused: HashSet<StableId>,
    cleaned: HashSet<StableId>,
    /// Last-seen progress per identity; the sole source for
    /// completion-transition detection.
    progress_history: HashMap<StableId, f32>,
    /// Last fully-built snapshot, replaced wholesale per successful tick.
    published: Vec<TorrentRow>,
    ticked_once: bool,
    settle_scheduled: bool,
}

impl<B: TorrentBackend> Reconciler<B> {
    pub fn new(
        config: ReconcilerConfig,
        backend: B,
        store: StateStore,
        metadata: Arc<dyn MetadataLookup>,
        completion: Arc<dyn CompletionHandler>,
        internal: mpsc::UnboundedSender<ReconcilerCommand>,
    ) -> Self {
        Self {
            config,
            backend,
            store,
            metadata,
            completion,
            internal,
            entries: Vec::new(),
            desired_paused: HashSet::new(),
            cleaned: HashSet::new(),
            progress_history: HashMap::new(),
            published: Vec::new(),
            ticked_once: false,
            settle_scheduled: false,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Starting phase: loads persisted state and reseeds the engine.
    ///
    /// Every stored magnet is resubmitted without re-persisting, so a
    /// restart does not rewrite the store just to rebuild the engine's live
    /// set.
    pub async fn restore(&mut self) {
        self.entries = self.store.load_entries().await.unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to load stored entries, starting empty");
            Vec::new()
        });
        self.desired_paused = self.store.load_paused().await.unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to load pause set, starting empty");
            HashSet::new()
        });
        self.cleaned = self.store.load_cleaned().await.unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to load cleaned set, starting empty");
            HashSet::new()
        });

        for entry in &self.entries {
            if let Err(err) = self.backend.add(&entry.magnet, &entry.save_path).await {
                tracing::warn!(key = %entry.key, error = %err, "reseeding stored magnet failed");
            }
        }

        tracing::info!(
            entries = self.entries.len(),
            paused = self.desired_paused.len(),
            "reconciler state restored"
        );
    }

    /// One poll tick: snapshot, categorize, publish, detect completions.
    pub async fn tick(&mut self) {
        let mut rows = match self.backend.list_snapshot(self.config.snapshot_cap).await {
            Ok(rows) => rows,
            Err(err) => {
                if !self.ticked_once {
                    // Never-initialized is not the same as transiently
                    // unreachable: the very first tick clears rather than
                    // showing pre-restart state it cannot confirm.
                    self.published.clear();
                    self.ticked_once = true;
                } else {
                    tracing::debug!(error = %err, "tick skipped, keeping stale snapshot");
                }
                return;
            }
        };

        for row in &mut rows {
            row.category = self.resolve_category(&row.id);
        }

        for row in &rows {
            let previous = self
                .progress_history
                .get(&row.id)
                .copied()
                .unwrap_or(0.0);
            let threshold = self.config.completion_threshold;
            if previous < threshold && row.progress >= threshold {
                // The edge fires at most once; it is consumed here before
                // the cleaned-set check and cannot retrigger unless
                // progress first drops back below the threshold.
                if self.cleaned.contains(&row.id) {
                    tracing::debug!(id = %row.id, "completion transition already cleaned");
                } else {
                    self.spawn_completion(row.clone());
                }
            }
        }

        for row in &rows {
            self.progress_history.insert(row.id.clone(), row.progress);
        }
        // Identities gone from the engine take their history with them.
        self.progress_history
            .retain(|id, _| rows.iter().any(|row| row.id == *id));

        // Publish only the fully-built list.
        self.published = rows;
        self.ticked_once = true;

        if !self.settle_scheduled {
            self.settle_scheduled = true;
            let delay = self.config.settle_delay;
            let internal = self.internal.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = internal.send(ReconcilerCommand::Settle);
            });
        }
    }

    /// Resolves a live identity's category from persisted entries.
    pub fn resolve_category(&self, id: &StableId) -> Option<String> {
        for tier in CATEGORY_TIER_ORDER {
            if let Some(entry) = self
                .entries
                .iter()
                .find(|entry| tier_matches(entry, id, tier))
            {
                return entry.category.clone();
            }
        }
        None
    }

    /// Settling pass: enforce persisted pause intent against the engine.
    ///
    /// Runs once shortly after the first successful tick. Issuing flag
    /// changes immediately after an add is a silent no-op in the engine,
    /// so the pass waits out the startup window. Safe to repeat; every
    /// command is ok-or-noop.
    pub async fn settle(&mut self) {
        tracing::info!(entries = self.entries.len(), "running settling pass");
        for entry in &self.entries {
            let result = if self.desired_paused.contains(&entry.key) {
                self.backend.pause(&entry.key).await
            } else {
                self.backend.resume(&entry.key).await
            };
            if let Err(err) = result {
                tracing::warn!(key = %entry.key, error = %err, "settling command failed");
            }
        }
    }

    /// Detaches the enrichment + completion action for a finished torrent.
    ///
    /// The task retries metadata lookup under the configured policy, then
    /// runs the completion handler regardless. Success is reported back via
    /// an internal MarkCleaned; failure leaves the cleaned set untouched
    /// and, the transition edge being consumed, is not retried.
    fn spawn_completion(&self, row: TorrentRow) {
        let policy = self.config.enrichment_retry;
        let metadata = Arc::clone(&self.metadata);
        let completion = Arc::clone(&self.completion);
        let internal = self.internal.clone();

        tokio::spawn(async move {
            let (query, year) = title_query(&row.name);
            let mut enriched = None;
            for attempt in 0..policy.max_attempts {
                enriched = metadata.search(&query, year).await;
                if enriched.is_some() {
                    break;
                }
                if attempt + 1 < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }

            match completion.handle_completed(&row, enriched.as_ref()).await {
                Ok(()) => {
                    let _ = internal.send(ReconcilerCommand::MarkCleaned { id: row.id });
                }
                Err(err) => {
                    tracing::warn!(
                        id = %row.id,
                        error = %err,
                        "completion action failed; will not be retried automatically"
                    );
                }
            }
        });
    }

    /// Upserts and persists an entry, submits the magnet, and reports the
    /// most-recently-added row.
    pub async fn add_magnet(
        &mut self,
        magnet: String,
        save_path: PathBuf,
        category: Option<String>,
    ) -> Result<AddedTorrent, ReconcileError> {
        let key = StableId::derive_or_fallback(&magnet);

        if let Some(existing) = self.entries.iter_mut().find(|entry| entry.key == key) {
            existing.magnet = magnet.clone();
            existing.save_path = save_path.clone();
            existing.category = category;
        } else {
            self.entries.push(StoredEntry {
                key: key.clone(),
                magnet: magnet.clone(),
                save_path: save_path.clone(),
                category,
                added_at: chrono::Utc::now(),
            });
        }
        self.store.save_entries(&self.entries).await?;

        self.backend.add(&magnet, &save_path).await?;

        // Approximate the new torrent as the last row of a fresh list.
        if let Ok(rows) = self.backend.list_snapshot(self.config.snapshot_cap).await {
            if let Some(last) = rows.last() {
                let ordinal = rows.len() - 1;
                let id = self
                    .backend
                    .stable_id_at(ordinal)
                    .await
                    .unwrap_or_else(|| last.id.clone());
                return Ok(AddedTorrent {
                    ordinal,
                    id,
                    name: last.name.clone(),
                });
            }
        }

        let name = crate::magnet::display_name(&magnet, &key);
        Ok(AddedTorrent {
            ordinal: 0,
            id: key,
            name,
        })
    }

    pub async fn pause_torrent(&mut self, id: StableId) -> Result<(), ReconcileError> {
        self.desired_paused.insert(id.clone());
        self.store.save_paused(&self.desired_paused).await?;
        self.backend.pause(&id).await?;
        Ok(())
    }

    pub async fn resume_torrent(&mut self, id: StableId) -> Result<(), ReconcileError> {
        self.desired_paused.remove(&id);
        self.store.save_paused(&self.desired_paused).await?;
        self.backend.resume(&id).await?;
        Ok(())
    }

    pub async fn remove_torrent(
        &mut self,
        id: StableId,
        delete_files: bool,
    ) -> Result<(), ReconcileError> {
        self.backend.remove(&id, delete_files).await?;
        self.entries.retain(|entry| entry.key != id);
        self.desired_paused.remove(&id);
        self.progress_history.remove(&id);
        self.store.save_entries(&self.entries).await?;
        self.store.save_paused(&self.desired_paused).await?;
        Ok(())
    }

    pub async fn set_category(
        &mut self,
        id: StableId,
        category: Option<String>,
    ) -> Result<(), ReconcileError> {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.key == id) else {
            return Err(ReconcileError::UnknownTorrent { id });
        };
        entry.category = category;
        self.store.save_entries(&self.entries).await?;
        Ok(())
    }

    /// Marks a completion action as done and persists the cleaned set.
    pub async fn mark_cleaned(&mut self, id: StableId) {
        self.cleaned.insert(id);
        if let Err(err) = self.store.save_cleaned(&self.cleaned).await {
            tracing::error!(error = %err, "failed to persist cleaned set");
        }
    }

    pub fn snapshot(&self) -> Vec<TorrentRow> {
        self.published.clone()
    }
}
