//! File access used by the mock catalog and the capture recorder.
//!
//! # Module Structure
//!
//! - `local` - `tokio::fs` backed store used by the binary
//! - `memory` - in-memory store for deterministic tests

mod local;
mod memory;

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

pub use local::LocalFileStore;
pub use memory::InMemoryFileStore;

/// Backend-agnostic file access.
///
/// Errors are plain `io::Error`s so callers can branch on `NotFound` and
/// `AlreadyExists` the same way for every backend.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Regular files directly inside `dir`. `NotFound` when the directory does not exist.
    async fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Last modification time of a file
    async fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    async fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Write a file that must not exist yet. `AlreadyExists` otherwise.
    async fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}
