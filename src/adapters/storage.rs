use crate::domain::ports::Storage;
use crate::utils::error::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Files under a base directory, one file per key.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// An exclusive advisory lock on a file under the storage directory.
/// Closing the file releases it.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
}

impl Storage for LocalStorage {
    type Lock = FileLock;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        let data = data.to_vec();

        // 寫入臨時檔後改名，讀者只會看到完整的檔案
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let parent = full_path.parent().unwrap_or(Path::new("."));
            std::fs::create_dir_all(parent)?;
            let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&full_path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(self.base_path.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn lock(&self, path: &str) -> Result<FileLock> {
        let full_path = self.base_path.join(path);
        let lock = tokio::task::spawn_blocking(move || -> std::io::Result<FileLock> {
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&full_path)?;
            file.lock_exclusive()?;
            tracing::debug!("🔒 Locked {}", full_path.display());
            Ok(FileLock { _file: file })
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write_file("nested/key.json", b"[]").await.unwrap();
        assert_eq!(storage.read_file("nested/key.json").await.unwrap(), b"[]");

        storage.remove_file("nested/key.json").await.unwrap();
        assert!(storage.read_file("nested/key.json").await.is_err());
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write_file("store.json", b"{\"v\":1}").await.unwrap();
        storage.write_file("store.json", b"{\"v\":2}").await.unwrap();

        assert_eq!(storage.read_file("store.json").await.unwrap(), b"{\"v\":2}");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("store.json")]);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let first = storage.lock("store.json.lock").await.unwrap();
        let second = tokio::spawn({
            let storage = storage.clone();
            async move { storage.lock("store.json.lock").await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!second.is_finished());

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(5), second)
            .await
            .unwrap()
            .unwrap();
        tokio_test::assert_ok!(second);
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.remove_file("nothing-here").await.is_ok());
    }
}
