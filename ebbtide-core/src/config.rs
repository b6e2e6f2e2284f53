//! Centralized configuration for Ebbtide.
//!
//! All tunable parameters live here and are passed explicitly into the
//! reconciler and RPC facade at construction; there is no ambient global
//! settings object.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Ebbtide components.
///
/// Groups related settings into logical sections and supports environment
/// variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct EbbtideConfig {
    pub reconciler: ReconcilerConfig,
    pub rpc: RpcConfig,
    pub storage: StorageConfig,
}

/// Bounded retry policy for best-effort collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay between attempts
    pub interval: Duration,
}

/// Reconciliation loop configuration.
///
/// Controls the poll cadence, completion detection, and the one-shot
/// settling pass that enforces persisted pause intent after startup.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between poll ticks
    pub tick_interval: Duration,
    /// Maximum live rows fetched per tick
    pub snapshot_cap: usize,
    /// Progress at or above which a torrent counts as complete
    pub completion_threshold: f32,
    /// Delay after the first successful tick before the settling pass runs.
    /// Too early and the engine silently ignores flag changes on freshly
    /// added torrents.
    pub settle_delay: Duration,
    /// Retry policy for metadata enrichment ahead of a completion action
    pub enrichment_retry: RetryPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            snapshot_cap: 200,
            completion_threshold: 0.999,
            settle_delay: Duration::from_millis(400),
            enrichment_retry: RetryPolicy {
                max_attempts: 6,
                interval: Duration::from_millis(300),
            },
        }
    }
}

/// RPC facade configuration.
///
/// A single local automation client is the design assumption; no rate
/// limiting is applied to inbound requests.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Socket address the facade listens on
    pub bind_addr: SocketAddr,
    /// Path of the RPC endpoint
    pub rpc_path: String,
    /// Basic-auth username; auth is enforced only when both credentials are set
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Default destination root for added torrents
    pub download_dir: PathBuf,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 9091).into(),
            rpc_path: "/transmission/rpc".to_string(),
            username: None,
            password: None,
            download_dir: PathBuf::from("./downloads"),
        }
    }
}

/// Persisted state storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the JSON state files
    pub state_dir: PathBuf,
    /// Temporary file suffix used for atomic overwrites
    pub temp_file_suffix: &'static str,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("./state"),
            temp_file_suffix: ".tmp",
        }
    }
}

/// Runtime mode selecting real or simulated collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RuntimeMode {
    /// Real engine backend and metadata providers
    Production,
    /// In-memory simulated backend and demo metadata
    Development,
}

impl RuntimeMode {
    /// Returns true when simulated collaborators should be wired.
    pub fn is_development(self) -> bool {
        matches!(self, RuntimeMode::Development)
    }
}

impl EbbtideConfig {
    /// Creates configuration with environment variable overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("EBBTIDE_RPC_BIND") {
            if let Ok(parsed) = addr.parse() {
                config.rpc.bind_addr = parsed;
            }
        }

        if let Ok(user) = std::env::var("EBBTIDE_RPC_USERNAME") {
            config.rpc.username = Some(user);
        }

        if let Ok(pass) = std::env::var("EBBTIDE_RPC_PASSWORD") {
            config.rpc.password = Some(pass);
        }

        if let Ok(dir) = std::env::var("EBBTIDE_DOWNLOAD_DIR") {
            config.rpc.download_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("EBBTIDE_STATE_DIR") {
            config.storage.state_dir = PathBuf::from(dir);
        }

        if let Ok(millis) = std::env::var("EBBTIDE_TICK_MS") {
            if let Ok(value) = millis.parse::<u64>() {
                config.reconciler.tick_interval = Duration::from_millis(value);
            }
        }

        config
    }

    /// Creates a configuration with fast timings for tests.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.reconciler.tick_interval = Duration::from_millis(20);
        config.reconciler.settle_delay = Duration::from_millis(30);
        config.reconciler.enrichment_retry = RetryPolicy {
            max_attempts: 2,
            interval: Duration::from_millis(5),
        };
        config
    }
}
