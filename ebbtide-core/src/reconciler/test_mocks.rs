//! Shared mocks for reconciler tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::backend::{EngineError, EngineState, TorrentBackend, TorrentRow};
use crate::completion::{CompletionError, CompletionHandler, MetadataLookup, TitleIds, TitleMetadata};
use crate::magnet::StableId;

/// Builds a live row with the given hex identity and progress.
pub fn live_row(hex: &str, progress: f32) -> TorrentRow {
    let id = StableId::from_hex(hex).expect("test ids are valid hex");
    TorrentRow {
        ordinal: 0,
        name: format!("Row.{}", &hex[..8]),
        progress,
        total_bytes: 1_000,
        done_bytes: (1_000.0 * progress) as i64,
        download_rate: 0,
        upload_rate: 0,
        peers: 0,
        seeds: 0,
        state: if progress >= 1.0 {
            EngineState::Seeding
        } else {
            EngineState::Downloading
        },
        paused: false,
        seeding: progress >= 1.0,
        errored: false,
        category: None,
        id,
    }
}

/// Backend that replays a scripted sequence of snapshots and records every
/// mutating call.
pub struct ScriptedBackend {
    snapshots: VecDeque<Result<Vec<TorrentRow>, EngineError>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn with_snapshots(snapshots: Vec<Result<Vec<TorrentRow>, EngineError>>) -> Self {
        Self {
            snapshots: snapshots.into(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of the recorded call log.
    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    fn record(&self, line: String) {
        self.log.lock().expect("log mutex poisoned").push(line);
    }
}

#[async_trait]
impl TorrentBackend for ScriptedBackend {
    async fn add(&mut self, magnet: &str, _save_path: &Path) -> Result<(), EngineError> {
        let id = StableId::derive_or_fallback(magnet);
        self.record(format!("add:{id}"));
        Ok(())
    }

    async fn list_snapshot(&mut self, max_items: usize) -> Result<Vec<TorrentRow>, EngineError> {
        match self.snapshots.pop_front() {
            Some(Ok(mut rows)) => {
                rows.truncate(max_items);
                for (ordinal, row) in rows.iter_mut().enumerate() {
                    row.ordinal = ordinal;
                }
                Ok(rows)
            }
            Some(Err(err)) => Err(err),
            None => Ok(Vec::new()),
        }
    }

    async fn stable_id_at(&mut self, _ordinal: usize) -> Option<StableId> {
        None
    }

    async fn pause(&mut self, id: &StableId) -> Result<(), EngineError> {
        self.record(format!("pause:{id}"));
        Ok(())
    }

    async fn resume(&mut self, id: &StableId) -> Result<(), EngineError> {
        self.record(format!("resume:{id}"));
        Ok(())
    }

    async fn remove(&mut self, id: &StableId, delete_files: bool) -> Result<(), EngineError> {
        self.record(format!("remove:{id}:{delete_files}"));
        Ok(())
    }
}

/// Completion handler that counts invocations and optionally fails.
pub struct CountingCompletion {
    pub calls: AtomicUsize,
    fail: bool,
}

impl CountingCompletion {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl CompletionHandler for CountingCompletion {
    async fn handle_completed(
        &self,
        _row: &TorrentRow,
        _metadata: Option<&TitleMetadata>,
    ) -> Result<(), CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(CompletionError::Failed {
                reason: "scripted failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Metadata source returning a fixed result, counting lookup attempts.
pub struct StaticMetadata {
    result: Option<TitleMetadata>,
    pub lookups: AtomicUsize,
}

impl StaticMetadata {
    pub fn found(title: &str) -> Self {
        Self {
            result: Some(TitleMetadata {
                title: title.to_string(),
                year: Some(2020),
                ids: TitleIds { imdb: None },
                overview: None,
            }),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn missing() -> Self {
        Self {
            result: None,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MetadataLookup for StaticMetadata {
    async fn search(&self, _query: &str, _year: Option<u16>) -> Option<TitleMetadata> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    async fn poster_url(&self, _ids: &TitleIds) -> Option<String> {
        None
    }
}
