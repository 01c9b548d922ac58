use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::FileStore;

/// File store backed by the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileStore;

#[async_trait]
impl FileStore for LocalFileStore {
    async fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }

    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        tokio::fs::metadata(path).await?.modified()
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(dir).await
    }

    async fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(contents).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_only_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = LocalFileStore.list(dir.path()).await.unwrap();
        assert_eq!(files, vec![dir.path().join("a.json")]);
    }

    #[tokio::test]
    async fn test_list_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = LocalFileStore
            .list(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_new_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.json");

        LocalFileStore.create_new(&path, b"first").await.unwrap();
        let err = LocalFileStore.create_new(&path, b"second").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");
    }
}
