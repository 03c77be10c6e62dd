use crate::domain::ports::{
    Direction, Document, DocumentStore, Precondition, Query, Storage, WriteOp,
};
use crate::utils::error::{MangaError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    data: Value,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    docs: BTreeMap<String, StoredDocument>,
    next_version: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn check(&self, path: &str, precondition: Precondition) -> Result<()> {
        let current = self.docs.get(path).map(|d| d.version);
        let holds = match (precondition, current) {
            (Precondition::None, _) => true,
            (Precondition::Missing, None) => true,
            (Precondition::Version(expected), Some(actual)) => expected == actual,
            _ => false,
        };
        if holds {
            Ok(())
        } else {
            Err(MangaError::Conflict {
                path: path.to_string(),
            })
        }
    }

    fn to_document(path: &str, stored: &StoredDocument) -> Document {
        let id = path.rsplit('/').next().unwrap_or(path).to_string();
        Document {
            id,
            path: path.to_string(),
            data: stored.data.clone(),
            version: stored.version,
        }
    }

    fn children(&self, collection: &str) -> Vec<Document> {
        let prefix = format!("{}/", collection);
        self.docs
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/'))
            .map(|(path, stored)| Self::to_document(path, stored))
            .collect()
    }
}

/// In-process document store. Every commit runs under one write lock, so a
/// batch is applied atomically and preconditions are checked against a
/// consistent view.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from bytes produced by [`MemoryDocumentStore::snapshot`].
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        let docs: BTreeMap<String, StoredDocument> = serde_json::from_slice(bytes)?;
        let next_version = docs.values().map(|d| d.version).max().unwrap_or(0);
        Ok(Self {
            inner: RwLock::new(Inner { docs, next_version }),
        })
    }

    pub async fn snapshot(&self) -> Result<Vec<u8>> {
        let inner = self.inner.read().await;
        Ok(serde_json::to_vec_pretty(&inner.docs)?)
    }

    /// Loads the snapshot stored under `key`, or an empty store when there
    /// is none yet.
    pub async fn load_from<S: Storage>(storage: &S, key: &str) -> Result<Self> {
        match storage.read_file(key).await {
            Ok(bytes) => {
                let store = Self::restore(&bytes)?;
                tracing::debug!("📂 Restored {} documents from {}", store.len().await, key);
                Ok(store)
            }
            Err(MangaError::IoError(e)) if e.kind() == ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn save_to<S: Storage>(&self, storage: &S, key: &str) -> Result<()> {
        storage.write_file(key, &self.snapshot().await?).await
    }

    /// Locks the snapshot under `key`, then loads it. Other processes that
    /// open the same key wait until the returned handle is saved or dropped,
    /// so overlapping runs cannot overwrite each other's changes.
    pub async fn open_exclusive<S: Storage>(storage: &S, key: &str) -> Result<PersistedStore<S::Lock>> {
        let lock = storage.lock(&lock_key(key)).await?;
        let store = Self::load_from(storage, key).await?;
        Ok(PersistedStore {
            store: Arc::new(store),
            key: key.to_string(),
            _lock: lock,
        })
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn lock_key(key: &str) -> String {
    format!("{}.lock", key)
}

/// A store loaded while holding the lock on its snapshot.
pub struct PersistedStore<L> {
    store: Arc<MemoryDocumentStore>,
    key: String,
    _lock: L,
}

impl<L> PersistedStore<L> {
    pub fn store(&self) -> Arc<MemoryDocumentStore> {
        self.store.clone()
    }

    /// Writes the snapshot back and releases the lock.
    pub async fn save<S: Storage<Lock = L>>(self, storage: &S) -> Result<()> {
        self.store.save_to(storage, &self.key).await?;
        tracing::debug!("💾 Saved {} documents to {}", self.store.len().await, self.key);
        Ok(())
    }
}

/// Document paths alternate collection and id segments, so they always have
/// an even number of non-empty segments.
fn check_document_path(path: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
        return Err(MangaError::store(format!("invalid document path '{}'", path)));
    }
    Ok(())
}

fn check_collection_path(path: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() % 2 != 1 || segments.iter().any(|s| s.is_empty()) {
        return Err(MangaError::store(format!("invalid collection path '{}'", path)));
    }
    Ok(())
}

fn matches_filter(data: &Value, field: &str, expected: &Value) -> bool {
    match (data.get(field), expected) {
        (None, Value::Null) => true,
        (Some(actual), expected) => actual == expected,
        (None, _) => false,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn merge_fields(target: &mut Value, patch: Value) {
    match (target.as_object_mut(), patch) {
        (Some(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        (_, patch) => *target = patch,
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Document>> {
        check_document_path(path)?;
        let inner = self.inner.read().await;
        Ok(inner.docs.get(path).map(|d| Inner::to_document(path, d)))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        check_collection_path(collection)?;
        Ok(self.inner.read().await.children(collection))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        check_collection_path(&query.collection)?;
        let mut docs: Vec<Document> = self
            .inner
            .read()
            .await
            .children(&query.collection)
            .into_iter()
            .filter(|doc| {
                query
                    .filters
                    .iter()
                    .all(|(field, expected)| matches_filter(&doc.data, field, expected))
            })
            .collect();

        if let Some((field, direction)) = &query.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.data.get(field), b.data.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String> {
        check_collection_path(collection)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = format!("{}/{}", collection, id);
        self.commit(vec![WriteOp::set(path, data).with_precondition(Precondition::Missing)])
            .await?;
        Ok(id)
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<()> {
        for write in &writes {
            check_document_path(write.path())?;
        }

        let mut inner = self.inner.write().await;

        // 先檢查所有前置條件，全部通過才寫入
        for write in &writes {
            match write {
                WriteOp::Set {
                    path, precondition, ..
                }
                | WriteOp::Delete { path, precondition } => inner.check(path, *precondition)?,
                WriteOp::Merge { .. } => {}
            }
        }

        for write in writes {
            match write {
                WriteOp::Set { path, data, .. } => {
                    let version = inner.bump();
                    inner.docs.insert(path, StoredDocument { data, version });
                }
                WriteOp::Merge { path, data } => {
                    let version = inner.bump();
                    let mut merged = inner
                        .docs
                        .get(&path)
                        .map(|d| d.data.clone())
                        .unwrap_or_else(|| Value::Object(Map::new()));
                    merge_fields(&mut merged, data);
                    inner.docs.insert(
                        path,
                        StoredDocument {
                            data: merged,
                            version,
                        },
                    );
                }
                WriteOp::Delete { path, .. } => {
                    inner.docs.remove(&path);
                }
            }
        }

        tracing::trace!("commit applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_and_version_bumps() {
        let store = MemoryDocumentStore::new();
        store.set("users/u1", json!({"role": "user"})).await.unwrap();
        let first = store.get("users/u1").await.unwrap().unwrap();
        store.set("users/u1", json!({"role": "admin"})).await.unwrap();
        let second = store.get("users/u1").await.unwrap().unwrap();

        assert_eq!(second.id, "u1");
        assert_eq!(second.data["role"], "admin");
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_failed_precondition_applies_nothing() {
        let store = MemoryDocumentStore::new();
        store.set("comic_ratings/a", json!({"totalRatings": 1})).await.unwrap();

        let result = store
            .commit(vec![
                WriteOp::set("ratings/a_u1", json!({"rating": 5})),
                WriteOp::set("comic_ratings/a", json!({"totalRatings": 2}))
                    .with_precondition(Precondition::Missing),
            ])
            .await;

        assert!(matches!(result, Err(MangaError::Conflict { .. })));
        assert!(store.get("ratings/a_u1").await.unwrap().is_none());
        let summary = store.get("comic_ratings/a").await.unwrap().unwrap();
        assert_eq!(summary.data["totalRatings"], 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = MemoryDocumentStore::new();
        store.set("comic_ratings/a", json!({})).await.unwrap();
        let read = store.get("comic_ratings/a").await.unwrap();
        store.set("comic_ratings/a", json!({"x": 1})).await.unwrap();

        let result = store
            .commit(vec![WriteOp::set("comic_ratings/a", json!({"x": 2}))
                .with_precondition(Precondition::unchanged_since(read.as_ref()))])
            .await;
        assert!(matches!(result, Err(MangaError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_list_only_direct_children() {
        let store = MemoryDocumentStore::new();
        store.set("users/u1", json!({})).await.unwrap();
        store.set("users/u1/bookmarks/a", json!({})).await.unwrap();
        store.set("users/u2", json!({})).await.unwrap();
        store.set("usersx/u3", json!({})).await.unwrap();

        let users = store.list("users").await.unwrap();
        assert_eq!(users.len(), 2);
        let bookmarks = store.list("users/u1/bookmarks").await.unwrap();
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].id, "a");
    }

    #[tokio::test]
    async fn test_query_filters_orders_and_limits() {
        let store = MemoryDocumentStore::new();
        store.set("comments/c1", json!({"comicSlug": "a", "createdAt": 1})).await.unwrap();
        store
            .set("comments/c2", json!({"comicSlug": "a", "createdAt": 3, "chapterName": "2"}))
            .await
            .unwrap();
        store.set("comments/c3", json!({"comicSlug": "a", "createdAt": 2})).await.unwrap();
        store.set("comments/c4", json!({"comicSlug": "b", "createdAt": 4})).await.unwrap();

        let q = Query::collection("comments")
            .where_eq("comicSlug", "a")
            .order_by("createdAt", Direction::Descending);
        let ids: Vec<String> = store.query(&q).await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["c2", "c3", "c1"]);

        let comic_level = q.clone().where_eq("chapterName", Value::Null).limit(1);
        let ids: Vec<String> = store
            .query(&comic_level)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["c3"]);
    }

    #[tokio::test]
    async fn test_merge_keeps_other_fields() {
        let store = MemoryDocumentStore::new();
        store.set("users/u1", json!({"role": "admin", "email": "a@x"})).await.unwrap();
        store.merge("users/u1", json!({"email": "b@x"})).await.unwrap();
        let doc = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(doc.data["role"], "admin");
        assert_eq!(doc.data["email"], "b@x");
    }

    #[tokio::test]
    async fn test_add_generates_ids() {
        let store = MemoryDocumentStore::new();
        let a = store.add("comments", json!({})).await.unwrap();
        let b = store.add("comments", json!({})).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list("comments").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_restore() {
        let store = MemoryDocumentStore::new();
        store.set("users/u1", json!({"role": "user"})).await.unwrap();
        let version = store.get("users/u1").await.unwrap().unwrap().version;

        let restored = MemoryDocumentStore::restore(&store.snapshot().await.unwrap()).unwrap();
        let doc = restored.get("users/u1").await.unwrap().unwrap();
        assert_eq!(doc.version, version);

        restored.set("users/u2", json!({})).await.unwrap();
        assert!(restored.get("users/u2").await.unwrap().unwrap().version > version);
    }

    #[tokio::test]
    async fn test_load_and_save_through_storage() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = crate::adapters::LocalStorage::new(dir.path());

        let store = MemoryDocumentStore::load_from(&storage, "store.json").await.unwrap();
        assert!(store.is_empty().await);
        store.set("comments/c1", json!({"content": "hi"})).await.unwrap();
        store.save_to(&storage, "store.json").await.unwrap();

        let reloaded = MemoryDocumentStore::load_from(&storage, "store.json").await.unwrap();
        assert_eq!(reloaded.get("comments/c1").await.unwrap().unwrap().data["content"], "hi");

        std::fs::write(dir.path().join("broken.json"), b"not json").unwrap();
        assert!(MemoryDocumentStore::load_from(&storage, "broken.json").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_malformed_paths() {
        let store = MemoryDocumentStore::new();
        assert!(store.get("users").await.is_err());
        assert!(store.list("users/u1").await.is_err());
        assert!(store.set("users//x", json!({})).await.is_err());
    }
}
