//! File metadata plus bytes, kept in step.
//!
//! Every operation on a file's bytes holds that file's entry in the
//! content store's lock table: writers and deleters exclusively, readers
//! shared. A reader therefore never observes bytes and metadata from two
//! different writes.

use bytes::Bytes;
use common::prelude::{sniff, FileId, PermissionValue, TargetType};
use content_store::ContentStore;
use mime::Mime;

use crate::database::models::{File, Permission};
use crate::database::Database;

use super::{AccessError, NamespaceTree};

const MAX_FILE_NAME_LEN: usize = 255;

pub fn validate_file_name(name: &str) -> Result<(), AccessError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_FILE_NAME_LEN
        && name != "."
        && name != ".."
        && !name.chars().any(|c| c == '/' || c == '\\' || c.is_control());
    if !valid {
        return Err(AccessError::Malformed(format!("invalid file name {name:?}")));
    }
    Ok(())
}

fn content_size(bytes: &[u8]) -> Result<i64, AccessError> {
    i64::try_from(bytes.len()).map_err(|_| AccessError::Malformed("content too large".to_string()))
}

/// A file about to be created, with the grant its creator receives.
struct NewFile {
    id: FileId,
    namespace: String,
    name: String,
    mime: Mime,
    size: i64,
    default_permission: PermissionValue,
    creator: Option<String>,
}

/// A file's bytes together with the metadata read under the same lock.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub file: File,
    pub bytes: Bytes,
}

#[derive(Clone, Debug)]
pub struct FileStore {
    db: Database,
    content: ContentStore,
    tree: NamespaceTree,
}

impl FileStore {
    pub fn new(db: Database, content: ContentStore, tree: NamespaceTree) -> Self {
        Self { db, content, tree }
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub async fn get(&self, id: &FileId) -> Result<Option<File>, AccessError> {
        Ok(File::get(id, &self.db).await?)
    }

    pub async fn get_by_path(&self, namespace: &str, name: &str) -> Result<Option<File>, AccessError> {
        Ok(File::get_by_path(namespace, name, &self.db).await?)
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<File>, AccessError> {
        Ok(File::in_namespace(namespace, &self.db).await?)
    }

    /// Sniff `bytes` and check the result against the namespace allow-list.
    async fn admit(&self, namespace: &str, bytes: &[u8]) -> Result<Mime, AccessError> {
        let mime = sniff(bytes);
        if !self.tree.is_mime_allowed(namespace, &mime).await? {
            tracing::debug!(namespace, mime = %mime, "upload type not allowed");
            return Err(AccessError::Unsupported(mime.essence_str().to_string()));
        }
        Ok(mime)
    }

    /// Create a new file with initial content.
    ///
    /// The bytes are stored first. The metadata row and the creator's grant
    /// then commit in one transaction, so the file becomes visible whole or
    /// not at all. A failed commit removes the bytes again.
    pub async fn create(
        &self,
        namespace: &str,
        name: &str,
        default_permission: PermissionValue,
        bytes: Bytes,
        creator: Option<&str>,
    ) -> Result<File, AccessError> {
        validate_file_name(name)?;
        let mime = self.admit(namespace, &bytes).await?;
        let new = NewFile {
            id: FileId::generate(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            size: content_size(&bytes)?,
            mime,
            default_permission,
            creator: creator.map(str::to_string),
        };

        let guard = self.content.locks().write(new.id.as_str()).await;
        let store = self.clone();
        let file = tokio::spawn(async move {
            let _guard = guard;
            store.commit_new(new, bytes).await
        })
        .await??;

        tracing::info!(id = %file.id, namespace, name, size = file.size, "file created");
        Ok(file)
    }

    async fn commit_new(&self, new: NewFile, bytes: Bytes) -> Result<File, AccessError> {
        if let Err(e) = self.content.put(new.id.as_str(), bytes).await {
            self.discard(&new.id).await;
            return Err(e.into());
        }

        if let Err(e) = self.insert(&new).await {
            self.discard(&new.id).await;
            return Err(match e {
                sqlx::Error::Database(e) if e.is_unique_violation() => {
                    AccessError::Conflict(format!("{}/{} exists", new.namespace, new.name))
                }
                sqlx::Error::Database(e) if e.is_foreign_key_violation() => {
                    AccessError::not_found(format!("namespace {}", new.namespace))
                }
                e => e.into(),
            });
        }

        File::get(&new.id, &self.db)
            .await?
            .ok_or_else(|| AccessError::not_found(format!("file {}", new.id)))
    }

    async fn insert(&self, new: &NewFile) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        File::insert(
            &new.id,
            &new.namespace,
            &new.name,
            &new.mime,
            new.size,
            new.default_permission,
            &mut *tx,
        )
        .await?;
        if let Some(user) = &new.creator {
            Permission::upsert_with(
                user,
                new.id.as_str(),
                TargetType::File,
                PermissionValue::CREATOR,
                &mut *tx,
            )
            .await?;
        }
        tx.commit().await
    }

    async fn discard(&self, id: &FileId) {
        if let Err(e) = self.content.delete(id.as_str()).await {
            tracing::warn!(id = %id, error = %e, "failed to discard content of uncreated file");
        }
    }

    /// Replace the content of an existing file.
    ///
    /// Once the lock is held the replacement runs on its own task, so a
    /// caller that gives up cannot leave new bytes behind old metadata.
    pub async fn write(&self, file: &File, bytes: Bytes) -> Result<File, AccessError> {
        let mime = self.admit(&file.namespace, &bytes).await?;
        let size = content_size(&bytes)?;
        let id = FileId::clone(&file.id);

        let guard = self.content.locks().write(id.as_str()).await;
        let store = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            store.replace(&id, bytes, &mime, size).await
        })
        .await?
    }

    async fn replace(
        &self,
        id: &FileId,
        bytes: Bytes,
        mime: &Mime,
        size: i64,
    ) -> Result<File, AccessError> {
        self.content.put(id.as_str(), bytes).await?;
        if !File::set_content_meta(id, size, mime, &self.db).await? {
            // deleted while we waited for the lock
            self.content.delete(id.as_str()).await?;
            return Err(AccessError::not_found(format!("file {id}")));
        }

        File::get(id, &self.db)
            .await?
            .ok_or_else(|| AccessError::not_found(format!("file {id}")))
    }

    /// Read a file's bytes with metadata from the same instant.
    ///
    /// A recorded size that disagrees with the stored bytes is corrected
    /// in place. Missing bytes are only acceptable for an empty file.
    pub async fn read(&self, file: &File) -> Result<FileContent, AccessError> {
        let id: &FileId = &file.id;
        let _guard = self.content.locks().read(id.as_str()).await;

        let mut file = File::get(id, &self.db)
            .await?
            .ok_or_else(|| AccessError::not_found(format!("file {id}")))?;

        let bytes = match self.content.get(id.as_str()).await? {
            Some(bytes) => bytes,
            None if file.size == 0 => Bytes::new(),
            None => return Err(AccessError::MissingContent(id.clone())),
        };

        let actual = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
        if actual != file.size {
            tracing::warn!(
                id = %id,
                recorded = file.size,
                actual,
                "file size out of step with content, repairing"
            );
            File::set_size(id, actual, &self.db).await?;
            file.size = actual;
        }

        Ok(FileContent { file, bytes })
    }

    /// Remove bytes, then metadata. Deleting twice is harmless.
    pub async fn delete(&self, file: &File) -> Result<(), AccessError> {
        let id = FileId::clone(&file.id);
        let guard = self.content.locks().write(id.as_str()).await;
        let store = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            store.content.delete(id.as_str()).await?;
            File::delete(&id, &store.db).await?;
            Ok::<_, AccessError>(())
        })
        .await??;

        tracing::info!(id = %file.id, namespace = %file.namespace, name = %file.name, "file deleted");
        Ok(())
    }

    /// Drop the bytes of files whose metadata is already gone. Failures are
    /// logged and skipped; returns how many were removed.
    pub async fn purge_content(&self, ids: &[FileId]) -> usize {
        let mut purged = 0;
        for id in ids {
            let _guard = self.content.locks().write(id.as_str()).await;
            match self.content.delete(id.as_str()).await {
                Ok(()) => purged += 1,
                Err(e) => tracing::warn!(id = %id, error = %e, "failed to purge content"),
            }
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use content_store::ContentStoreConfig;

    use super::*;
    use crate::database::models::User;

    const ALICE: &str = "alice@example.com";

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    async fn store_with(mime_types: &[&str]) -> FileStore {
        let db = Database::in_memory().await.unwrap();
        let tree = NamespaceTree::new(db.clone());
        tree.create(
            "ns",
            None,
            PermissionValue::NOTHING,
            mime_types.iter().copied().collect(),
        )
        .await
        .unwrap();
        FileStore::new(db, ContentStore::memory(), tree)
    }

    #[test]
    fn test_file_names() {
        assert!(validate_file_name("report.pdf").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "tab\there"] {
            assert!(validate_file_name(bad).is_err(), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_create_read_write_delete() {
        let store = store_with(&["text/plain", "image/png"]).await;

        let file = store
            .create("ns", "hello.txt", PermissionValue::READ, Bytes::from("hello"), None)
            .await
            .unwrap();
        assert_eq!(file.size, 5);
        assert_eq!(file.content_type().essence_str(), "text/plain");

        let content = store.read(&file).await.unwrap();
        assert_eq!(content.bytes, Bytes::from("hello"));

        let file = store.write(&file, Bytes::from_static(PNG)).await.unwrap();
        assert_eq!(file.mime, "image/png");
        assert_eq!(file.size, PNG.len() as i64);

        store.delete(&file).await.unwrap();
        assert!(store.get(&file.id).await.unwrap().is_none());
        assert!(!store.content.exists(file.id.as_str()).await.unwrap());
        store.delete(&file).await.unwrap();
    }

    #[tokio::test]
    async fn test_disallowed_type_stores_nothing() {
        let store = store_with(&["image/png"]).await;

        assert!(matches!(
            store
                .create("ns", "a.txt", PermissionValue::NOTHING, Bytes::from("plain text"), None)
                .await,
            Err(AccessError::Unsupported(m)) if m == "text/plain"
        ));
        assert!(store.list("ns").await.unwrap().is_empty());
        assert!(store.content.list_keys().await.unwrap().is_empty());

        let file = store
            .create("ns", "a.png", PermissionValue::NOTHING, Bytes::from_static(PNG), None)
            .await
            .unwrap();
        assert!(matches!(
            store.write(&file, Bytes::from("plain text")).await,
            Err(AccessError::Unsupported(_))
        ));
        assert_eq!(store.read(&file).await.unwrap().bytes, Bytes::from_static(PNG));
    }

    #[tokio::test]
    async fn test_duplicate_path_conflicts() {
        let store = store_with(&["text/plain"]).await;
        store
            .create("ns", "a.txt", PermissionValue::NOTHING, Bytes::from("one"), None)
            .await
            .unwrap();
        assert!(matches!(
            store
                .create("ns", "a.txt", PermissionValue::NOTHING, Bytes::from("two"), None)
                .await,
            Err(AccessError::Conflict(_))
        ));
        assert_eq!(store.content.list_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_repairs_size() {
        let store = store_with(&["text/plain"]).await;
        let file = store
            .create("ns", "a.txt", PermissionValue::NOTHING, Bytes::from("twelve bytes"), None)
            .await
            .unwrap();
        sqlx::query("UPDATE files SET size = 999 WHERE id = ?1")
            .bind(file.id.as_str())
            .execute(&*store.db)
            .await
            .unwrap();

        let content = store.read(&file).await.unwrap();
        assert_eq!(content.file.size, 12);
        assert_eq!(store.get(&file.id).await.unwrap().unwrap().size, 12);
    }

    #[tokio::test]
    async fn test_missing_content_is_storage_failure() {
        let store = store_with(&["text/plain"]).await;
        let file = store
            .create("ns", "a.txt", PermissionValue::NOTHING, Bytes::from("data"), None)
            .await
            .unwrap();
        store.content.delete(file.id.as_str()).await.unwrap();

        let err = store.read(&file).await.unwrap_err();
        assert!(err.is_storage());
    }

    #[tokio::test]
    async fn test_readers_see_whole_versions() {
        let store = Arc::new(store_with(&["text/plain"]).await);
        let old = Bytes::from(vec![b'a'; 1000]);
        let new = Bytes::from(vec![b'b'; 2000]);
        let file = store
            .create("ns", "race.txt", PermissionValue::NOTHING, old.clone(), None)
            .await
            .unwrap();

        let writer = {
            let store = store.clone();
            let file = file.clone();
            let (old, new) = (old.clone(), new.clone());
            tokio::spawn(async move {
                for i in 0..20 {
                    let next = if i % 2 == 0 { new.clone() } else { old.clone() };
                    store.write(&file, next).await.unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let file = file.clone();
                let (old, new) = (old.clone(), new.clone());
                tokio::spawn(async move {
                    for _ in 0..20 {
                        let content = store.read(&file).await.unwrap();
                        assert!(content.bytes == old || content.bytes == new);
                        assert_eq!(content.file.size, content.bytes.len() as i64);
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_purge_content() {
        let store = store_with(&["text/plain"]).await;
        let file = store
            .create("ns", "a.txt", PermissionValue::NOTHING, Bytes::from("data"), None)
            .await
            .unwrap();
        let ids = store.tree.delete("ns").await.unwrap();
        assert_eq!(store.purge_content(&ids).await, 1);
        assert!(!store.content.exists(file.id.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_grants_creator_with_the_row() {
        let store = store_with(&["text/plain"]).await;
        User::create(ALICE, "x", false, &store.db).await.unwrap();

        let file = store
            .create("ns", "a.txt", PermissionValue::NOTHING, Bytes::from("data"), Some(ALICE))
            .await
            .unwrap();

        let grants = Permission::for_user(ALICE, &store.db).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].target, file.id.as_str());
        assert_eq!(*grants[0].value, PermissionValue::CREATOR);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("content");
        let content = ContentStore::new(ContentStoreConfig::Local { path: root.clone() })
            .await
            .unwrap();
        // a regular file where the store expects its directory fails every put
        std::fs::remove_dir(&root).unwrap();
        std::fs::write(&root, b"").unwrap();

        let db = Database::in_memory().await.unwrap();
        let tree = NamespaceTree::new(db.clone());
        tree.create(
            "ns",
            None,
            PermissionValue::NOTHING,
            ["text/plain"].into_iter().collect(),
        )
        .await
        .unwrap();
        User::create(ALICE, "x", false, &db).await.unwrap();
        let store = FileStore::new(db.clone(), content, tree);

        let err = store
            .create("ns", "a.txt", PermissionValue::READ, Bytes::from("hello"), Some(ALICE))
            .await
            .unwrap_err();
        assert!(err.is_storage(), "{err:?}");

        std::fs::remove_file(&root).unwrap();
        std::fs::create_dir(&root).unwrap();

        assert!(store.get_by_path("ns", "a.txt").await.unwrap().is_none());
        assert!(store.list("ns").await.unwrap().is_empty());
        assert!(Permission::for_user(ALICE, &db).await.unwrap().is_empty());
        assert!(store.content.list_keys().await.unwrap().is_empty());

        let file = store
            .create("ns", "a.txt", PermissionValue::READ, Bytes::from("hello"), Some(ALICE))
            .await
            .unwrap();
        assert_eq!(store.read(&file).await.unwrap().bytes, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_abandoned_writes_leave_metadata_in_step() {
        let store = store_with(&["text/plain", "image/png"]).await;
        let text = Bytes::from("some plain text");
        let png = Bytes::from_static(PNG);
        let file = store
            .create("ns", "a", PermissionValue::NOTHING, text.clone(), None)
            .await
            .unwrap();

        for micros in 0..40 {
            let next = if micros % 2 == 0 { png.clone() } else { text.clone() };
            let _ = tokio::time::timeout(Duration::from_micros(micros), store.write(&file, next)).await;

            // a commit that outlived its caller still holds the lock
            drop(store.content.locks().write(file.id.as_str()).await);

            let row = store.get(&file.id).await.unwrap().unwrap();
            let bytes = store.content.get(file.id.as_str()).await.unwrap().unwrap();
            assert_eq!(row.size, bytes.len() as i64);
            assert_eq!(row.content_type().essence_str(), sniff(&bytes).essence_str());
        }
    }

    #[tokio::test]
    async fn test_write_waiting_on_lock_changes_nothing_when_abandoned() {
        let store = store_with(&["text/plain", "image/png"]).await;
        let file = store
            .create("ns", "a", PermissionValue::NOTHING, Bytes::from("before"), None)
            .await
            .unwrap();

        let held = store.content.locks().write(file.id.as_str()).await;
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            store.write(&file, Bytes::from_static(PNG)),
        )
        .await;
        assert!(result.is_err());
        drop(held);

        let content = store.read(&file).await.unwrap();
        assert_eq!(content.bytes, Bytes::from("before"));
        assert_eq!(content.file.mime, "text/plain; charset=utf-8");
    }
}
