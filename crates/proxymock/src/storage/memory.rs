use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::FileStore;

#[derive(Default)]
struct State {
    files: BTreeMap<PathBuf, (SystemTime, Vec<u8>)>,
    dirs: BTreeSet<PathBuf>,
    /// Logical clock so every write gets a distinct modification time
    clock: u64,
    reads: usize,
}

/// In-memory file store.
///
/// Every write advances a logical clock, so two successive writes to the same
/// path always report different modification times.
#[derive(Default)]
pub struct InMemoryFileStore {
    state: Mutex<State>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file, creating its parent directories.
    pub fn insert(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.lock();
        if let Some(parent) = path.parent() {
            Self::add_dirs(&mut state, parent);
        }
        let stamp = Self::tick(&mut state);
        state.files.insert(path, (stamp, contents.into()));
    }

    /// Replace the contents of an existing file without touching its
    /// modification time. Returns false when the file does not exist.
    pub fn overwrite(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> bool {
        match self.state.lock().files.get_mut(path.as_ref()) {
            Some((_, bytes)) => {
                *bytes = contents.into();
                true
            }
            None => false,
        }
    }

    /// Number of `read_to_string` calls served so far
    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.state.lock().files.remove(path.as_ref()).is_some()
    }

    /// Contents of a file as text, if present
    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state
            .lock()
            .files
            .get(path.as_ref())
            .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Files directly inside `dir`, sorted
    pub fn files_in(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        self.state
            .lock()
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect()
    }

    fn tick(state: &mut State) -> SystemTime {
        state.clock += 1;
        UNIX_EPOCH + Duration::from_secs(state.clock)
    }

    fn add_dirs(state: &mut State, dir: &Path) {
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state.dirs.insert(ancestor.to_path_buf());
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.state.lock().dirs.contains(dir) {
            return Err(Self::not_found(dir));
        }
        Ok(self.files_in(dir))
    }

    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.state
            .lock()
            .files
            .get(path)
            .map(|(stamp, _)| *stamp)
            .ok_or_else(|| Self::not_found(path))
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let mut state = self.state.lock();
        state.reads += 1;
        let (_, bytes) = state.files.get(path).ok_or_else(|| Self::not_found(path))?;
        String::from_utf8(bytes.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    async fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        Self::add_dirs(&mut self.state.lock(), dir);
        Ok(())
    }

    async fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        let parent_exists = path
            .parent()
            .map_or(true, |p| p.as_os_str().is_empty() || state.dirs.contains(p));
        if !parent_exists {
            return Err(Self::not_found(path));
        }
        if state.files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        let stamp = Self::tick(&mut state);
        state
            .files
            .insert(path.to_path_buf(), (stamp, contents.to_vec()));
        Ok(())
    }
}
