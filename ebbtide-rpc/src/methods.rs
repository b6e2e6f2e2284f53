//! RPC method dispatch and Transmission wire translation.

use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use ebbtide_core::backend::TorrentRow;
use ebbtide_core::magnet::StableId;
use ebbtide_core::reconciler::ReconcileError;

use crate::server::AppState;

/// Advertised protocol versions; matches the Transmission 4.x line closely
/// enough for common automation clients.
const RPC_VERSION: u64 = 17;
const RPC_VERSION_MINIMUM: u64 = 14;
const SERVER_VERSION: &str = "4.0.6 (ebbtide)";

/// Parsed request body: a JSON object with a string method.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub tag: Option<i64>,
}

/// Methods the facade implements. Everything else gets a generic success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    SessionGet,
    TorrentGet,
    TorrentAdd,
    TorrentStart,
    TorrentStop,
}

impl RpcMethod {
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "session-get" => Some(Self::SessionGet),
            "torrent-get" => Some(Self::TorrentGet),
            "torrent-add" => Some(Self::TorrentAdd),
            "torrent-start" => Some(Self::TorrentStart),
            "torrent-stop" => Some(Self::TorrentStop),
            _ => None,
        }
    }
}

/// Dispatches one parsed request against the reconciler.
pub async fn dispatch(request: RpcRequest, state: &AppState) -> Response {
    let result = match RpcMethod::parse(&request.method) {
        Some(RpcMethod::SessionGet) => session_get(state),
        Some(RpcMethod::TorrentGet) => torrent_get(state).await,
        Some(RpcMethod::TorrentAdd) => torrent_add(request.arguments, state).await,
        Some(RpcMethod::TorrentStart) => change_state(request.arguments, state, false).await,
        Some(RpcMethod::TorrentStop) => change_state(request.arguments, state, true).await,
        None => {
            // Clients probe with methods we do not implement; answering
            // success keeps them from aborting their whole workflow.
            tracing::debug!(method = %request.method, "unimplemented method acknowledged");
            Ok(json!({}))
        }
    };

    match result {
        Ok(arguments) => envelope("success", arguments, request.tag),
        Err(RpcFailure::Message(message)) => {
            (StatusCode::BAD_REQUEST, format!("400: {message}")).into_response()
        }
        Err(RpcFailure::Gone) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "503: reconciler unavailable",
        )
            .into_response(),
    }
}

/// A method-level failure: a descriptive 400, or the reconciler being gone
/// entirely.
enum RpcFailure {
    Message(String),
    Gone,
}

impl From<ReconcileError> for RpcFailure {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Shutdown => RpcFailure::Gone,
            other => RpcFailure::Message(other.to_string()),
        }
    }
}

fn envelope(result: &str, arguments: Value, tag: Option<i64>) -> Response {
    let mut body = json!({
        "result": result,
        "arguments": arguments,
    });
    if let Some(tag) = tag {
        body["tag"] = json!(tag);
    }
    axum::Json(body).into_response()
}

fn session_get(state: &AppState) -> Result<Value, RpcFailure> {
    Ok(json!({
        "rpc-version": RPC_VERSION,
        "rpc-version-minimum": RPC_VERSION_MINIMUM,
        "version": SERVER_VERSION,
        "download-dir": state.config.download_dir.display().to_string(),
        "session-id": state.tokens.current().unwrap_or_default(),
    }))
}

async fn torrent_get(state: &AppState) -> Result<Value, RpcFailure> {
    let rows = state.reconciler.snapshot().await?;
    let torrents: Vec<Value> = rows.iter().map(translate_row).collect();
    Ok(json!({ "torrents": torrents }))
}

/// Maps a published row onto the foreign schema.
///
/// The numeric `id` is the ordinal: positional, reused after removals, and
/// only stable between consecutive polls. Durable identity rides in
/// `hashString`.
fn translate_row(row: &TorrentRow) -> Value {
    // Stopped(0)/downloading(4) from the paused flag only; finer engine
    // states are deliberately not surfaced to the foreign schema.
    let status = if row.paused { 0 } else { 4 };
    json!({
        "id": row.ordinal,
        "hashString": row.id.as_str(),
        "name": row.name,
        "status": status,
        "percentDone": row.progress,
        "totalSize": row.total_bytes,
        "downloadedEver": row.done_bytes,
        "rateDownload": row.download_rate,
        "rateUpload": row.upload_rate,
        "peersConnected": row.peers,
        "peersSendingToUs": row.seeds,
        "labels": row.category.as_deref().map(|c| vec![c]).unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
struct TorrentAddArgs {
    filename: Option<String>,
    metainfo: Option<String>,
    #[serde(rename = "download-dir")]
    download_dir: Option<String>,
}

async fn torrent_add(arguments: Value, state: &AppState) -> Result<Value, RpcFailure> {
    let args: TorrentAddArgs = serde_json::from_value(arguments)
        .map_err(|e| RpcFailure::Message(format!("invalid torrent-add arguments: {e}")))?;

    if args.metainfo.is_some() {
        return Err(RpcFailure::Message(
            "adding by .torrent metainfo is not supported, use a magnet link".to_string(),
        ));
    }
    let Some(magnet) = args.filename.filter(|f| f.starts_with("magnet:")) else {
        return Err(RpcFailure::Message(
            "torrent-add requires a magnet link in 'filename'".to_string(),
        ));
    };

    let destination = args
        .download_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.download_dir.clone());
    if let Err(err) = tokio::fs::create_dir_all(&destination).await {
        tracing::warn!(path = %destination.display(), error = %err, "could not create download dir");
    }

    let category = category_from_destination(&destination, &state.config.download_dir);

    let added = state
        .reconciler
        .add_magnet(&magnet, destination, category)
        .await?;

    Ok(json!({
        "torrent-added": {
            "id": added.ordinal,
            "hashString": added.id.as_str(),
            "name": added.name,
        }
    }))
}

/// A destination that is a proper subdirectory of the configured default
/// root doubles as a category: automation clients encode the category as
/// the trailing path segment.
fn category_from_destination(destination: &Path, default_root: &Path) -> Option<String> {
    if destination == default_root {
        return None;
    }
    destination
        .strip_prefix(default_root)
        .ok()
        .and_then(|_| destination.file_name())
        .map(|segment| segment.to_string_lossy().into_owned())
}

#[derive(Debug, Deserialize)]
struct ChangeStateArgs {
    #[serde(default)]
    ids: Value,
}

async fn change_state(arguments: Value, state: &AppState, pause: bool) -> Result<Value, RpcFailure> {
    let args: ChangeStateArgs = serde_json::from_value(arguments).unwrap_or(ChangeStateArgs {
        ids: Value::Null,
    });

    let snapshot = state.reconciler.snapshot().await?;
    for id in resolve_foreign_ids(&args.ids, &snapshot) {
        let result = if pause {
            state.reconciler.pause(id).await
        } else {
            state.reconciler.resume(id).await
        };
        match result {
            Ok(()) => {}
            Err(ReconcileError::Shutdown) => return Err(RpcFailure::Gone),
            Err(err) => {
                // Unknown or stale ids are silently ignored, engine errors
                // only logged; the foreign protocol treats these as batch
                // operations that always succeed.
                tracing::debug!(error = %err, "state change skipped");
            }
        }
    }

    Ok(json!({}))
}

/// Resolves the foreign `ids` argument (scalar or array, numeric ordinal or
/// hash string) to stable identities against the current snapshot.
fn resolve_foreign_ids(ids: &Value, snapshot: &[TorrentRow]) -> Vec<StableId> {
    let items: Vec<&Value> = match ids {
        Value::Array(items) => items.iter().collect(),
        Value::Null => return snapshot.iter().map(|row| row.id.clone()).collect(),
        scalar => vec![scalar],
    };

    let mut resolved = Vec::new();
    for item in items {
        match item {
            Value::Number(n) => {
                if let Some(ordinal) = n.as_u64() {
                    if let Some(row) = snapshot.iter().find(|row| row.ordinal as u64 == ordinal) {
                        resolved.push(row.id.clone());
                    }
                }
            }
            Value::String(hash) => {
                // Hash strings resolve only against the live snapshot;
                // forwarding unknown ids would plant them in the pause set.
                if let Some(row) = StableId::from_hex(hash)
                    .and_then(|id| snapshot.iter().find(|row| row.id == id))
                {
                    resolved.push(row.id.clone());
                }
            }
            _ => {}
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebbtide_core::backend::EngineState;

    fn row(ordinal: usize, hex: &str) -> TorrentRow {
        TorrentRow {
            ordinal,
            id: StableId::from_hex(hex).unwrap(),
            name: format!("row-{ordinal}"),
            progress: 0.5,
            total_bytes: 100,
            done_bytes: 50,
            download_rate: 0,
            upload_rate: 0,
            peers: 0,
            seeds: 0,
            state: EngineState::Downloading,
            paused: false,
            seeding: false,
            errored: false,
            category: None,
        }
    }

    const HEX_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HEX_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn resolves_scalar_ordinal_and_hash_strings() {
        let snapshot = vec![row(0, HEX_A), row(1, HEX_B)];

        let by_ordinal = resolve_foreign_ids(&json!(1), &snapshot);
        assert_eq!(by_ordinal, vec![snapshot[1].id.clone()]);

        let mixed = resolve_foreign_ids(&json!([0, HEX_B, 99, "nothex"]), &snapshot);
        assert_eq!(mixed, vec![snapshot[0].id.clone(), snapshot[1].id.clone()]);
    }

    #[test]
    fn hash_ids_outside_the_snapshot_resolve_to_nothing() {
        let snapshot = vec![row(0, HEX_A)];
        let unknown = "cccccccccccccccccccccccccccccccccccccccc";

        assert!(resolve_foreign_ids(&json!(unknown), &snapshot).is_empty());
        assert_eq!(
            resolve_foreign_ids(&json!([unknown, HEX_A]), &snapshot),
            vec![snapshot[0].id.clone()]
        );
    }

    #[test]
    fn missing_ids_means_all_torrents() {
        let snapshot = vec![row(0, HEX_A), row(1, HEX_B)];
        assert_eq!(resolve_foreign_ids(&Value::Null, &snapshot).len(), 2);
    }

    #[test]
    fn status_collapses_to_paused_flag_only() {
        let mut r = row(0, HEX_A);
        r.seeding = true; // still reported as downloading
        assert_eq!(translate_row(&r)["status"], 4);
        r.paused = true;
        assert_eq!(translate_row(&r)["status"], 0);
    }

    #[test]
    fn category_needs_proper_subdirectory() {
        let root = Path::new("/dl");
        assert_eq!(category_from_destination(Path::new("/dl"), root), None);
        assert_eq!(
            category_from_destination(Path::new("/dl/tv"), root),
            Some("tv".to_string())
        );
        assert_eq!(category_from_destination(Path::new("/other/tv"), root), None);
    }

    #[test]
    fn parses_method_table() {
        assert_eq!(RpcMethod::parse("torrent-add"), Some(RpcMethod::TorrentAdd));
        assert_eq!(RpcMethod::parse("queue-move-top"), None);
    }
}
