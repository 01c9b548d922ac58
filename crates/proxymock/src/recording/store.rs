//! Persistence of captured exchanges.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error};

use super::types::CapturedExchange;
use crate::extractor::{self, BodyInspector};
use crate::storage::FileStore;

/// Body key whose value prefixes capture file names
const TOKEN_KEY: &str = "call";
const MAX_TOKEN_LEN: usize = 64;
/// Suffixes tried before giving up on a file name
const MAX_COLLISIONS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to serialize captured exchange: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No free file name for {0}")]
    Exhausted(PathBuf),
}

/// Keep `[A-Za-z0-9._-]`, replace everything else with `_`, cap the length.
pub fn sanitize_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TOKEN_LEN)
        .collect()
}

/// File name without extension or collision suffix.
pub fn file_stem(token: &str, at: DateTime<Utc>) -> String {
    let timestamp = at.format("%Y-%m-%d_%H-%M-%S-%3f");
    if token.is_empty() {
        timestamp.to_string()
    } else {
        format!("{token}_{timestamp}")
    }
}

/// Writes captured exchanges under `<log root>/<service>/`.
pub struct Recorder {
    service: String,
    directory: PathBuf,
    store: Arc<dyn FileStore>,
    inspector: BodyInspector,
}

impl Recorder {
    pub fn new(service: impl Into<String>, log_root: &Path, store: Arc<dyn FileStore>) -> Self {
        let service = service.into();
        Self {
            directory: log_root.join(&service),
            service,
            store,
            inspector: BodyInspector::default(),
        }
    }

    /// Size limit for reading the file name token out of request bodies.
    pub fn with_inspector(mut self, inspector: BodyInspector) -> Self {
        self.inspector = inspector;
        self
    }

    /// Persist an exchange. Failures are logged and never reach the caller.
    pub async fn record(&self, exchange: &CapturedExchange) -> Option<PathBuf> {
        match self.record_at(exchange, Utc::now()).await {
            Ok(path) => {
                debug!("Captured exchange written to {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!(
                    "Failed to capture exchange for service '{}' ({}): {}",
                    self.service, exchange.endpoint, e
                );
                None
            }
        }
    }

    /// Persist an exchange stamped with `at`, appending `_1`, `_2`, ... on collision.
    pub async fn record_at(
        &self,
        exchange: &CapturedExchange,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, RecordError> {
        let contents = serde_json::to_vec_pretty(exchange)?;

        self.store
            .create_dir_all(&self.directory)
            .await
            .map_err(|source| RecordError::Io {
                path: self.directory.clone(),
                source,
            })?;

        let token = self
            .inspector
            .inspect(Bytes::from(exchange.body.clone()), |body| {
                extractor::find_first(body, TOKEN_KEY)
            })
            .await
            .map(|raw| sanitize_token(&raw))
            .unwrap_or_default();
        let stem = file_stem(&token, at);

        for attempt in 0..=MAX_COLLISIONS {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.directory.join(name);

            match self.store.create_new(&path, &contents).await {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(RecordError::Io { path, source }),
            }
        }

        Err(RecordError::Exhausted(self.directory.join(stem)))
    }
}
