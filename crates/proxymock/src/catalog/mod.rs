//! File-backed mock catalog with hot reload.
//!
//! Each service reads `<MockDirectory>/<service>*.json`. The canonical
//! `<service>.json` comes first, the remaining variants follow in file name
//! order. Every file owns one bucket of entries; a snapshot is the union of
//! the buckets in that order.
//!
//! `load()` runs before every request. With the file cache enabled only files
//! whose modification time moved are parsed again. Snapshots are immutable
//! and swapped atomically, so a request never sees half a reload.
//!
//! # Module Structure
//!
//! - `definition` - definition file format and `MockEntry`

mod definition;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use definition::{parse_definitions, MockEntry, ResponseTemplate};

use crate::storage::FileStore;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read mock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse mock file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable view of every entry of one service, in evaluation order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub entries: Vec<MockEntry>,
}

impl CatalogSnapshot {
    pub fn new(entries: Vec<MockEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the catalog last saw of one file.
#[derive(Debug, Clone)]
pub struct FileState {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub entries: Vec<MockEntry>,
}

#[derive(Default)]
struct Ledger {
    files: Vec<FileState>,
    /// Set once "no mock files" was reported, cleared when files show up again
    reported_empty: bool,
}

impl Ledger {
    fn take(&mut self, path: &Path) -> Option<FileState> {
        let index = self.files.iter().position(|f| f.path == path)?;
        Some(self.files.remove(index))
    }
}

/// Mock catalog of one service.
pub struct MockCatalog {
    service: String,
    directory: PathBuf,
    use_file_cache: bool,
    store: Arc<dyn FileStore>,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    /// Serializes reloads; held across file I/O
    ledger: Mutex<Ledger>,
}

impl MockCatalog {
    pub fn new(
        service: impl Into<String>,
        directory: impl Into<PathBuf>,
        use_file_cache: bool,
        store: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            service: service.into(),
            directory: directory.into(),
            use_file_cache,
            store,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Current snapshot without touching the file system
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Bring the catalog up to date with the mock directory and return the result.
    ///
    /// Never fails: unreadable or malformed files are logged and contribute no
    /// entries.
    pub async fn load(&self) -> Arc<CatalogSnapshot> {
        let mut ledger = self.ledger.lock().await;

        let files = self.discover(&mut ledger).await;

        let mut changed = false;
        let mut next = Vec::with_capacity(files.len());
        for path in files {
            let previous = ledger.take(&path);
            let had_entries = previous.as_ref().is_some_and(|p| !p.entries.is_empty());

            let modified = match self.store.modified(&path).await {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(
                        "Failed to stat mock file {} for service '{}': {}",
                        path.display(),
                        self.service,
                        e
                    );
                    changed |= had_entries;
                    continue;
                }
            };

            if let Some(previous) = previous {
                if self.use_file_cache && previous.modified == modified {
                    next.push(previous);
                    continue;
                }
                match self.read_file(&path).await {
                    Ok(entries) => {
                        changed |= entries != previous.entries;
                        next.push(FileState {
                            path,
                            modified,
                            entries,
                        });
                    }
                    Err(CatalogError::Io { .. }) => {
                        // Not recorded, so the next request tries again
                        changed |= had_entries;
                    }
                    Err(CatalogError::Parse { .. }) => {
                        changed |= had_entries;
                        next.push(FileState {
                            path,
                            modified,
                            entries: Vec::new(),
                        });
                    }
                }
                continue;
            }

            match self.read_file(&path).await {
                Ok(entries) => {
                    changed |= !entries.is_empty();
                    debug!(
                        "Loaded {} mock entries from {}",
                        entries.len(),
                        path.display()
                    );
                    next.push(FileState {
                        path,
                        modified,
                        entries,
                    });
                }
                Err(CatalogError::Io { .. }) => {}
                Err(CatalogError::Parse { .. }) => next.push(FileState {
                    path,
                    modified,
                    entries: Vec::new(),
                }),
            }
        }

        // Whatever is left in the ledger vanished from disk
        changed |= ledger.files.iter().any(|f| !f.entries.is_empty());
        ledger.files = next;

        if changed {
            let entries: Vec<MockEntry> = ledger
                .files
                .iter()
                .flat_map(|f| f.entries.iter().cloned())
                .collect();
            info!(
                "Mock catalog for service '{}' reloaded: {} entries from {} files",
                self.service,
                entries.len(),
                ledger.files.len()
            );
            *self.snapshot.write() = Arc::new(CatalogSnapshot::new(entries));
        }

        self.snapshot()
    }

    /// Matching files in evaluation order. Empty when the directory is missing.
    async fn discover(&self, ledger: &mut Ledger) -> Vec<PathBuf> {
        let listed = match self.store.list(&self.directory).await {
            Ok(listed) => listed,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(
                    "Failed to list mock directory {}: {}",
                    self.directory.display(),
                    e
                );
                Vec::new()
            }
        };

        let canonical = format!("{}.json", self.service);
        let mut files: Vec<(String, PathBuf)> = listed
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let is_mock = name.starts_with(&self.service)
                    && Path::new(&name)
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                is_mock.then_some((name, path))
            })
            .collect();
        files.sort_by(|(a, _), (b, _)| (*a != canonical).cmp(&(*b != canonical)).then(a.cmp(b)));

        if files.is_empty() {
            if !ledger.reported_empty {
                info!(
                    "No mock files for service '{}' in {}",
                    self.service,
                    self.directory.display()
                );
                ledger.reported_empty = true;
            }
        } else {
            ledger.reported_empty = false;
        }

        files.into_iter().map(|(_, path)| path).collect()
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<MockEntry>, CatalogError> {
        let result = match self.store.read_to_string(path).await {
            Ok(text) => parse_definitions(&text, path),
            Err(source) => Err(CatalogError::Io {
                path: path.to_path_buf(),
                source,
            }),
        };
        if let Err(e) = &result {
            warn!("{} (service '{}')", e, self.service);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryFileStore, LocalFileStore};
    use tempfile::TempDir;

    fn definition(endpoint: &str, body: &str) -> String {
        serde_json::json!({
            "Requests": [{"endpoint": endpoint, "response": {"body": body}}]
        })
        .to_string()
    }

    fn catalog(store: &Arc<InMemoryFileStore>, use_file_cache: bool) -> MockCatalog {
        MockCatalog::new("json", "mocks", use_file_cache, store.clone())
    }

    fn endpoints(snapshot: &CatalogSnapshot) -> Vec<&str> {
        snapshot.entries.iter().map(|e| e.endpoint.as_str()).collect()
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let store = Arc::new(InMemoryFileStore::new());
        let snapshot = catalog(&store, true).load().await;
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_canonical_file_first() {
        let store = Arc::new(InMemoryFileStore::new());
        store.insert("mocks/json_b.json", definition("/b", "b"));
        store.insert("mocks/json.json", definition("/main", "main"));
        store.insert("mocks/json_a.json", definition("/a", "a"));
        store.insert("mocks/other.json", definition("/other", "x"));
        store.insert("mocks/json.txt", definition("/txt", "x"));

        let snapshot = catalog(&store, true).load().await;
        assert_eq!(endpoints(&snapshot), vec!["/main", "/a", "/b"]);
    }

    #[tokio::test]
    async fn test_unchanged_files_keep_snapshot() {
        let store = Arc::new(InMemoryFileStore::new());
        store.insert("mocks/json.json", definition("/a", "a"));
        let catalog = catalog(&store, true);

        let first = catalog.load().await;
        let second = catalog.load().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn test_reload_on_change() {
        let store = Arc::new(InMemoryFileStore::new());
        store.insert("mocks/json.json", definition("/a", "a"));
        let catalog = catalog(&store, true);
        assert_eq!(endpoints(&*catalog.load().await), vec!["/a"]);

        store.insert("mocks/json.json", definition("/b", "b"));
        assert_eq!(endpoints(&*catalog.load().await), vec!["/b"]);

        // Later changes are picked up too
        store.insert("mocks/json.json", definition("/c", "c"));
        assert_eq!(endpoints(&*catalog.load().await), vec!["/c"]);
    }

    #[tokio::test]
    async fn test_variant_changes_keep_other_buckets() {
        let store = Arc::new(InMemoryFileStore::new());
        store.insert("mocks/json.json", definition("/main", "main"));
        store.insert("mocks/json_extra.json", definition("/extra", "1"));
        let catalog = catalog(&store, true);
        catalog.load().await;

        store.insert("mocks/json_extra.json", definition("/extra2", "2"));
        assert_eq!(endpoints(&*catalog.load().await), vec!["/main", "/extra2"]);
    }

    #[tokio::test]
    async fn test_malformed_file_drops_bucket() {
        let store = Arc::new(InMemoryFileStore::new());
        store.insert("mocks/json.json", definition("/main", "main"));
        store.insert("mocks/json_extra.json", definition("/extra", "1"));
        let catalog = catalog(&store, true);
        catalog.load().await;

        store.insert("mocks/json_extra.json", "{ broken");
        assert_eq!(endpoints(&*catalog.load().await), vec!["/main"]);

        store.insert("mocks/json_extra.json", definition("/fixed", "1"));
        assert_eq!(endpoints(&*catalog.load().await), vec!["/main", "/fixed"]);
    }

    #[tokio::test]
    async fn test_removed_file_drops_bucket() {
        let store = Arc::new(InMemoryFileStore::new());
        store.insert("mocks/json.json", definition("/main", "main"));
        store.insert("mocks/json_extra.json", definition("/extra", "1"));
        let catalog = catalog(&store, true);
        assert_eq!(catalog.load().await.len(), 2);

        store.remove("mocks/json_extra.json");
        assert_eq!(endpoints(&*catalog.load().await), vec!["/main"]);
    }

    #[tokio::test]
    async fn test_cache_disabled_rereads() {
        let store = Arc::new(InMemoryFileStore::new());
        store.insert("mocks/json.json", definition("/a", "a"));
        let catalog = catalog(&store, false);

        let first = catalog.load().await;
        let second = catalog.load().await;
        assert_eq!(first, second);
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn test_same_mtime_change_depends_on_cache() {
        let cached_store = Arc::new(InMemoryFileStore::new());
        cached_store.insert("mocks/json.json", definition("/a", "a"));
        let cached = catalog(&cached_store, true);
        assert_eq!(endpoints(&*cached.load().await), vec!["/a"]);

        cached_store.overwrite("mocks/json.json", definition("/b", "b"));
        assert_eq!(endpoints(&*cached.load().await), vec!["/a"]);
        assert_eq!(cached_store.reads(), 1);

        let uncached_store = Arc::new(InMemoryFileStore::new());
        uncached_store.insert("mocks/json.json", definition("/a", "a"));
        let uncached = catalog(&uncached_store, false);
        assert_eq!(endpoints(&*uncached.load().await), vec!["/a"]);

        uncached_store.overwrite("mocks/json.json", definition("/b", "b"));
        assert_eq!(endpoints(&*uncached.load().await), vec!["/b"]);
        assert_eq!(uncached_store.reads(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_loads() {
        let store = Arc::new(InMemoryFileStore::new());
        store.insert("mocks/json.json", definition("/a", "a"));
        let catalog = Arc::new(catalog(&store, true));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                tokio::spawn(async move { catalog.load().await.len() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_local_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("json.json"), definition("/disk", "d")).unwrap();

        let catalog = MockCatalog::new("json", dir.path(), true, Arc::new(LocalFileStore));
        let snapshot = catalog.load().await;
        assert_eq!(endpoints(&snapshot), vec!["/disk"]);
        assert_eq!(snapshot.entries[0].source, dir.path().join("json.json"));
    }
}
