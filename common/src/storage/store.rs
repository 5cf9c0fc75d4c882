use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Blob archive for original uploads, backed by `object_store`.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl StorageManager {
    /// Creates the backend selected by `cfg.storage`, creating the local data
    /// directory when it is missing.
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let backend_kind = cfg.storage.clone();
        let (store, local_base) = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
            local_base,
        })
    }

    /// Wraps an existing store, e.g. a shared `InMemory` a caller keeps a handle to.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    pub async fn put(&self, location: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Deletes a single object. A missing object is not an error.
    pub async fn delete(&self, location: &str) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
            Err(err) => return Err(err),
        }

        if matches!(self.backend_kind, StorageKind::Local) {
            if let Some((parent, _)) = location.rsplit_once('/') {
                self.cleanup_filesystem_directories(parent).await;
            }
        }

        Ok(())
    }

    /// Metadata of every object below `prefix`, or of all objects.
    pub async fn list(
        &self,
        prefix: Option<&str>,
    ) -> object_store::Result<Vec<object_store::ObjectMeta>> {
        let prefix_path = prefix.map(ObjPath::from);
        self.store.list(prefix_path.as_ref()).try_collect().await
    }

    /// Removes empty directories left behind under the local base. Best effort.
    async fn cleanup_filesystem_directories(&self, prefix: &str) {
        let Some(base) = &self.local_base else {
            return;
        };

        let relative = Path::new(prefix.trim_end_matches('/'));
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            tracing::warn!(
                prefix = %prefix,
                "Skipping directory cleanup for unsupported prefix components"
            );
            return;
        }

        let mut current = base.join(relative);

        while current.starts_with(base) && current.as_path() != base.as_path() {
            match tokio::fs::remove_dir(&current).await {
                Ok(()) => {}
                Err(err) => match err.kind() {
                    ErrorKind::NotFound => {}
                    ErrorKind::DirectoryNotEmpty => break,
                    _ => tracing::debug!(
                        error = %err,
                        path = %current.display(),
                        "Failed to remove directory during cleanup"
                    ),
                },
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }
    }
}

async fn create_storage_backend(
    cfg: &AppConfig,
) -> object_store::Result<(DynStore, Option<PathBuf>)> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base.clone())?;
            Ok((Arc::new(store), Some(base)))
        }
        StorageKind::Memory => Ok((Arc::new(InMemory::new()), None)),
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn memory_config() -> AppConfig {
        AppConfig {
            storage: StorageKind::Memory,
            data_dir: "/tmp/unused".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_memory_put_list_delete() {
        let storage = StorageManager::new(&memory_config())
            .await
            .expect("create storage manager");
        assert!(storage.local_base.is_none());

        let location = "fylex/documents/owner/abc/report.pdf";
        storage
            .put(location, Bytes::from_static(b"%PDF-1.4"))
            .await
            .expect("put");

        let listed = storage.list(Some("fylex/documents")).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.first().map(|meta| meta.size), Some(8));

        storage.delete(location).await.expect("delete");
        assert!(storage.list(None).await.expect("list after delete").is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_object_is_ok() {
        let storage = StorageManager::new(&memory_config())
            .await
            .expect("create storage manager");

        storage
            .delete("never/written.txt")
            .await
            .expect("deleting a missing object succeeds");
    }

    #[tokio::test]
    async fn test_shared_backend_sees_writes() {
        let shared = Arc::new(InMemory::new());
        let storage = StorageManager::with_backend(Arc::<InMemory>::clone(&shared), StorageKind::Memory);

        for location in ["a/one.txt", "a/two.txt", "b/three.txt"] {
            storage
                .put(location, Bytes::from_static(b"x"))
                .await
                .expect("put");
        }

        assert_eq!(storage.list(Some("a/")).await.expect("list a").len(), 2);
        let direct = shared
            .head(&ObjPath::from("b/three.txt"))
            .await
            .expect("object visible through the shared handle");
        assert_eq!(direct.size, 1);
    }

    #[tokio::test]
    async fn test_local_delete_cleans_empty_directories() {
        let base = format!("/tmp/fylex_storage_test_{}", Uuid::new_v4());
        let cfg = AppConfig {
            storage: StorageKind::Local,
            data_dir: base.clone(),
            ..Default::default()
        };
        let storage = StorageManager::new(&cfg)
            .await
            .expect("create storage manager");
        let resolved_base = storage.local_base.clone().expect("resolved base dir");
        assert_eq!(resolved_base, PathBuf::from(&base));

        let location = "docs/owner/file.txt";
        storage
            .put(location, Bytes::from_static(b"local"))
            .await
            .expect("put");
        let object_dir = resolved_base.join("docs/owner");
        tokio::fs::metadata(&object_dir)
            .await
            .expect("object directory exists after write");

        storage.delete(location).await.expect("delete");
        assert!(tokio::fs::metadata(&object_dir).await.is_err());
        tokio::fs::metadata(&resolved_base)
            .await
            .expect("base directory remains intact");

        let _ = tokio::fs::remove_dir_all(&base).await;
    }
}
