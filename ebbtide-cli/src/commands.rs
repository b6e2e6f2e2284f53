//! CLI command implementations

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;

use ebbtide_core::EbbtideError;
use ebbtide_core::completion::LoggingCompletion;
use ebbtide_core::config::{EbbtideConfig, RuntimeMode};
use ebbtide_core::magnet::{StableId, display_name};
use ebbtide_core::simulation::SimulatedBackend;
use ebbtide_core::spawn_reconciler;
use ebbtide_core::tracing_setup::{CliLogLevel, init_tracing};
use ebbtide_search::MetadataService;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the reconciliation daemon and RPC facade
    Serve {
        /// Runtime mode selecting real or simulated collaborators
        #[arg(long, value_enum, default_value = "development")]
        mode: RuntimeMode,
        /// Console log level (file log always captures trace)
        #[arg(long, default_value = "info")]
        log_level: CliLogLevel,
        /// Socket address for the RPC facade
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Default destination root for added torrents
        #[arg(long)]
        download_dir: Option<PathBuf>,
        /// Directory holding persisted JSON state
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
    /// Derive and print the stable identity for a magnet link
    Magnet {
        /// Magnet URI to inspect
        uri: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> ebbtide_core::Result<()> {
    match command {
        Commands::Serve {
            mode,
            log_level,
            bind,
            download_dir,
            state_dir,
        } => serve(mode, log_level, bind, download_dir, state_dir).await,
        Commands::Magnet { uri } => inspect_magnet(&uri),
    }
}

/// Run the daemon: reconciler actor plus RPC facade.
async fn serve(
    mode: RuntimeMode,
    log_level: CliLogLevel,
    bind: Option<SocketAddr>,
    download_dir: Option<PathBuf>,
    state_dir: Option<PathBuf>,
) -> ebbtide_core::Result<()> {
    init_tracing(log_level.as_tracing_level()).map_err(|e| EbbtideError::Configuration {
        reason: format!("tracing setup failed: {e}"),
    })?;

    let mut config = EbbtideConfig::from_env();
    if let Some(bind) = bind {
        config.rpc.bind_addr = bind;
    }
    if let Some(dir) = download_dir {
        config.rpc.download_dir = dir;
    }
    if let Some(dir) = state_dir {
        config.storage.state_dir = dir;
    }

    if !mode.is_development() {
        // No engine backend is linked into this binary; production
        // deployments embed ebbtide-core and supply their own
        // TorrentBackend implementation.
        return Err(EbbtideError::Configuration {
            reason: "production mode has no built-in torrent engine; \
                     embed ebbtide-core and implement TorrentBackend, \
                     or run with --mode development"
                .to_string(),
        });
    }

    tracing::info!(
        bind = %config.rpc.bind_addr,
        download_dir = %config.rpc.download_dir.display(),
        state_dir = %config.storage.state_dir.display(),
        "starting ebbtide (development mode, simulated engine)"
    );

    let reconciler = spawn_reconciler(
        config.reconciler.clone(),
        &config.storage,
        SimulatedBackend::new(),
        Arc::new(MetadataService::from_runtime_mode(mode)),
        Arc::new(LoggingCompletion),
    );

    ebbtide_rpc::run_server(config.rpc, reconciler)
        .await
        .map_err(|e| {
            EbbtideError::Io(std::io::Error::other(format!("RPC facade failed: {e}")))
        })?;

    Ok(())
}

/// Print the derived stable identity for a magnet URI.
fn inspect_magnet(uri: &str) -> ebbtide_core::Result<()> {
    let trimmed = uri.trim();
    if !trimmed.starts_with("magnet:") {
        return Err(EbbtideError::Configuration {
            reason: format!("not a magnet URI: {trimmed}"),
        });
    }

    match StableId::derive(trimmed) {
        Some(id) => {
            println!("stable id: {id}");
            println!("name:      {}", display_name(trimmed, &id));
        }
        None => {
            let fallback = StableId::fallback(trimmed);
            println!("no hash-based identity found; fallback key is the raw URI");
            println!("fallback:  {fallback}");
            println!("name:      {}", display_name(trimmed, &fallback));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnet_inspection_accepts_hash_magnets() {
        let uri = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567";
        assert!(inspect_magnet(uri).is_ok());
    }

    #[test]
    fn magnet_inspection_rejects_non_magnets() {
        assert!(inspect_magnet("http://example.com").is_err());
    }

    #[test]
    fn magnet_inspection_handles_hashless_magnets() {
        assert!(inspect_magnet("magnet:?dn=Just+A+Name").is_ok());
    }
}
