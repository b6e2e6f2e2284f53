//! In-memory torrent backend for development mode and tests.
//!
//! Progress advances on every list call, so a polling reconciler observes a
//! live-looking download without any network. Deterministic by design.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::backend::{EngineError, EngineState, TorrentBackend, TorrentRow};
use crate::magnet::StableId;

const SIM_TOTAL_BYTES: i64 = 1_500_000_000;
const SIM_DOWNLOAD_RATE: i64 = 12_000_000;

#[derive(Debug, Clone)]
struct SimTorrent {
    id: StableId,
    name: String,
    #[allow(dead_code)] // Retained for parity with persisted entries
    save_path: PathBuf,
    progress: f32,
    paused: bool,
}

/// Simulated engine: ordered torrent list with advancing progress.
#[derive(Debug)]
pub struct SimulatedBackend {
    torrents: Vec<SimTorrent>,
    progress_step: f32,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::with_progress_step(0.05)
    }

    /// Progress added per list call for each unpaused torrent.
    pub fn with_progress_step(progress_step: f32) -> Self {
        Self {
            torrents: Vec::new(),
            progress_step,
        }
    }

}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TorrentBackend for SimulatedBackend {
    async fn add(&mut self, magnet: &str, save_path: &Path) -> Result<(), EngineError> {
        let id = StableId::derive_or_fallback(magnet);
        if self.torrents.iter().any(|t| t.id == id) {
            return Ok(()); // re-add is a noop, matching real engines
        }
        let name = crate::magnet::display_name(magnet, &id);
        self.torrents.push(SimTorrent {
            id,
            name,
            save_path: save_path.to_path_buf(),
            progress: 0.0,
            paused: false,
        });
        Ok(())
    }

    async fn list_snapshot(&mut self, max_items: usize) -> Result<Vec<TorrentRow>, EngineError> {
        for torrent in &mut self.torrents {
            if !torrent.paused && torrent.progress < 1.0 {
                torrent.progress = (torrent.progress + self.progress_step).min(1.0);
            }
        }

        Ok(self
            .torrents
            .iter()
            .take(max_items)
            .enumerate()
            .map(|(ordinal, torrent)| {
                let done = torrent.progress >= 1.0;
                TorrentRow {
                    ordinal,
                    id: torrent.id.clone(),
                    name: torrent.name.clone(),
                    progress: torrent.progress,
                    total_bytes: SIM_TOTAL_BYTES,
                    done_bytes: (SIM_TOTAL_BYTES as f64 * f64::from(torrent.progress)) as i64,
                    download_rate: if torrent.paused || done {
                        0
                    } else {
                        SIM_DOWNLOAD_RATE
                    },
                    upload_rate: 0,
                    peers: if torrent.paused { 0 } else { 12 },
                    seeds: if torrent.paused { 0 } else { 4 },
                    state: if done {
                        EngineState::Seeding
                    } else {
                        EngineState::Downloading
                    },
                    paused: torrent.paused,
                    seeding: done,
                    errored: false,
                    category: None,
                }
            })
            .collect())
    }

    async fn stable_id_at(&mut self, ordinal: usize) -> Option<StableId> {
        self.torrents.get(ordinal).map(|t| t.id.clone())
    }

    async fn pause(&mut self, id: &StableId) -> Result<(), EngineError> {
        if let Some(torrent) = self.torrents.iter_mut().find(|t| &t.id == id) {
            torrent.paused = true;
        }
        Ok(())
    }

    async fn resume(&mut self, id: &StableId) -> Result<(), EngineError> {
        if let Some(torrent) = self.torrents.iter_mut().find(|t| &t.id == id) {
            torrent.paused = false;
        }
        Ok(())
    }

    async fn remove(&mut self, id: &StableId, _delete_files: bool) -> Result<(), EngineError> {
        self.torrents.retain(|t| &t.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGNET: &str =
        "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=Demo+File";

    #[tokio::test]
    async fn add_list_and_pause_cycle() {
        let mut backend = SimulatedBackend::with_progress_step(0.5);
        backend.add(MAGNET, Path::new("/dl")).await.unwrap();

        let rows = backend.list_snapshot(200).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Demo File");
        assert_eq!(rows[0].ordinal, 0);
        assert!(rows[0].progress > 0.0);

        let id = rows[0].id.clone();
        backend.pause(&id).await.unwrap();
        let before = backend.list_snapshot(200).await.unwrap()[0].progress;
        let after = backend.list_snapshot(200).await.unwrap()[0].progress;
        assert_eq!(before, after);

        backend.remove(&id, false).await.unwrap();
        assert!(backend.list_snapshot(200).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_add_is_noop() {
        let mut backend = SimulatedBackend::new();
        backend.add(MAGNET, Path::new("/dl")).await.unwrap();
        backend.add(MAGNET, Path::new("/dl")).await.unwrap();
        assert_eq!(backend.list_snapshot(200).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_respects_cap() {
        let mut backend = SimulatedBackend::new();
        for i in 0..5 {
            let magnet = format!("magnet:?xt=urn:btih:{:040x}", i + 1);
            backend.add(&magnet, Path::new("/dl")).await.unwrap();
        }
        assert_eq!(backend.list_snapshot(3).await.unwrap().len(), 3);
    }
}
