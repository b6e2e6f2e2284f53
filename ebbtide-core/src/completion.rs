//! Collaborator seams for post-completion side effects.
//!
//! When a torrent crosses the done threshold the reconciler enriches it
//! with title metadata (best effort) and hands it to a completion handler,
//! typically a library mover. Both collaborators are opaque behind the
//! traits here.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::TorrentRow;

/// External identifiers for an enriched title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleIds {
    pub imdb: Option<String>,
}

/// Title metadata resolved for a completed torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleMetadata {
    pub title: String,
    pub year: Option<u16>,
    pub ids: TitleIds,
    pub overview: Option<String>,
}

/// Best-effort metadata collaborator. Implementations swallow their own
/// failures and answer `None`; the reconciler applies its bounded retry on
/// top.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Searches for a title, optionally narrowed by year.
    async fn search(&self, query: &str, year: Option<u16>) -> Option<TitleMetadata>;

    /// Resolves a poster image URL for known identifiers.
    async fn poster_url(&self, ids: &TitleIds) -> Option<String>;
}

/// Errors from a completion handler (collaborator failure).
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("path access denied: {path}")]
    PathDenied { path: PathBuf },

    #[error("completion action failed: {reason}")]
    Failed { reason: String },
}

/// One-shot action invoked when a torrent completes.
///
/// Invoked at most once per completion transition; a failed invocation is
/// not retried automatically (documented gap, see the reconciler).
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn handle_completed(
        &self,
        row: &TorrentRow,
        metadata: Option<&TitleMetadata>,
    ) -> Result<(), CompletionError>;
}

/// Opaque authorized access to a filesystem path, released on drop.
///
/// Movers acquire one of these around each invocation so platform-scoped
/// resource grants are held no longer than the operation itself.
pub struct AuthorizedPath {
    path: PathBuf,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl AuthorizedPath {
    pub fn new(path: PathBuf, release: Option<Box<dyn FnOnce() + Send>>) -> Self {
        Self { path, release }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AuthorizedPath {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Grants scoped path access to completion handlers.
pub trait PathAuthorizer: Send + Sync {
    fn authorize(&self, path: &Path) -> Result<AuthorizedPath, CompletionError>;
}

/// Pass-through authorizer for platforms without scoped access tokens.
#[derive(Debug, Clone, Default)]
pub struct DirectPathAuthorizer;

impl PathAuthorizer for DirectPathAuthorizer {
    fn authorize(&self, path: &Path) -> Result<AuthorizedPath, CompletionError> {
        Ok(AuthorizedPath::new(path.to_path_buf(), None))
    }
}

/// Default completion handler: records the completion for the interactive
/// caller via tracing and succeeds.
#[derive(Debug, Clone, Default)]
pub struct LoggingCompletion;

#[async_trait]
impl CompletionHandler for LoggingCompletion {
    async fn handle_completed(
        &self,
        row: &TorrentRow,
        metadata: Option<&TitleMetadata>,
    ) -> Result<(), CompletionError> {
        match metadata {
            Some(meta) => tracing::info!(
                id = %row.id,
                name = %row.name,
                title = %meta.title,
                year = ?meta.year,
                "torrent completed"
            ),
            None => tracing::info!(id = %row.id, name = %row.name, "torrent completed (unenriched)"),
        }
        Ok(())
    }
}

/// Splits a release-style torrent name into a search query and year hint.
///
/// `Some.Film.2019.1080p.WEB-DL.x264-GRP` becomes `("Some Film", Some(2019))`.
/// Names without a plausible year token pass through whole.
pub fn title_query(name: &str) -> (String, Option<u16>) {
    let tokens: Vec<&str> = name
        .split(['.', ' ', '_'])
        .filter(|t| !t.is_empty())
        .collect();

    for (index, token) in tokens.iter().enumerate() {
        if index == 0 {
            continue; // a leading year is usually part of the title
        }
        if let Ok(year) = token.parse::<u16>() {
            if (1900..2100).contains(&year) {
                return (tokens[..index].join(" "), Some(year));
            }
        }
    }

    (tokens.join(" "), None)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn splits_release_name_at_year() {
        let (query, year) = title_query("Some.Film.2019.1080p.WEB-DL.x264-GRP");
        assert_eq!(query, "Some Film");
        assert_eq!(year, Some(2019));
    }

    #[test]
    fn keeps_leading_year_in_title() {
        let (query, year) = title_query("1984.1984.720p.BluRay");
        assert_eq!(query, "1984");
        assert_eq!(year, Some(1984));
    }

    #[test]
    fn name_without_year_passes_through() {
        let (query, year) = title_query("Plain Name Here");
        assert_eq!(query, "Plain Name Here");
        assert_eq!(year, None);
    }

    #[test]
    fn authorized_path_releases_on_every_exit_path() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        {
            let handle = AuthorizedPath::new(
                PathBuf::from("/library"),
                Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
            );
            assert_eq!(handle.path(), Path::new("/library"));
            assert!(!released.load(Ordering::SeqCst));
        }
        assert!(released.load(Ordering::SeqCst));
    }
}
