//! Local directory backend laid out like a bucket.
//!
//! Keys are paths relative to the root joined with `/`. Used for offline runs
//! against a synced copy of the bucket and for tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::error::{Result, StoreError};
use super::{ListPage, ObjectStore, ObjectSummary};
use crate::validator::check_object_path;

#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file under the root as `(key, size)`, sorted by key.
    fn scan(&self) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| StoreError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()),
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            objects.push(ObjectSummary { key, size });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    fn describe(&self) -> String {
        format!("filesystem {}", self.root.display())
    }

    async fn check_connectivity(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StoreError::BucketNotFound {
                bucket: self.root.display().to_string(),
            })
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage> {
        let mut remaining = self
            .scan()?
            .into_iter()
            .filter(|o| o.key.starts_with(prefix))
            .filter(|o| continuation.as_deref().map_or(true, |after| o.key.as_str() > after))
            .peekable();

        let objects: Vec<ObjectSummary> = remaining.by_ref().take(max_keys.max(1)).collect();
        let next_continuation = match remaining.peek() {
            Some(_) => objects.last().map(|o| o.key.clone()),
            None => None,
        };
        Ok(ListPage {
            objects,
            next_continuation,
        })
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        check_object_path(key).map_err(|_| StoreError::ObjectNotFound {
            key: key.to_string(),
        })?;
        let path = self.root.join(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::ObjectNotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, FilesystemStore) {
        let dir = TempDir::new().unwrap();
        for (key, body) in [
            ("prefix/app/deployments/web.yaml", "a"),
            ("prefix/app/services/web-svc.yaml", "bb"),
            ("prefix/db/pvc.yaml", "ccc"),
            ("other/x.yaml", "d"),
        ] {
            let path = dir.path().join(key);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        let store = FilesystemStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_pages_follow_continuation() {
        let (_dir, store) = seeded();
        let first = store.list_page("prefix/", None, 2).await.unwrap();
        let keys: Vec<&str> = first.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["prefix/app/deployments/web.yaml", "prefix/app/services/web-svc.yaml"]
        );
        assert_eq!(first.objects[1].size, 2);

        let second = store
            .list_page("prefix/", first.next_continuation, 2)
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "prefix/db/pvc.yaml");
        assert_eq!(second.next_continuation, None);
    }

    #[tokio::test]
    async fn test_get_object() {
        let (_dir, store) = seeded();
        assert_eq!(store.get_object("prefix/db/pvc.yaml").await.unwrap(), b"ccc");
        assert!(matches!(
            store.get_object("prefix/missing.yaml").await,
            Err(StoreError::ObjectNotFound { .. })
        ));
        assert!(matches!(
            store.get_object("../etc/passwd").await,
            Err(StoreError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_root_is_bucket_not_found() {
        let store = FilesystemStore::new("/nonexistent/bucket2gitops/root");
        let err = store.check_connectivity().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
