use crate::domain::model::{ApiResponse, ChapterData, ComicData, GenresData, ListData};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Local key/value file area (the reading history lives here).
pub trait Storage: Send + Sync {
    /// Held while a key is locked; dropping it releases the lock.
    type Lock: Send;

    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Waits for exclusive access to `path` across processes.
    fn lock(&self, path: &str) -> impl std::future::Future<Output = Result<Self::Lock>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn data_dir(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn max_commit_attempts(&self) -> usize;
    fn history_limit(&self) -> usize;
}

/// Read-only comics content API.
#[async_trait]
pub trait ComicSource: Send + Sync {
    async fn home(&self) -> Result<ApiResponse<ListData>>;
    async fn comic(&self, slug: &str) -> Result<ApiResponse<ComicData>>;
    async fn genres(&self) -> Result<ApiResponse<GenresData>>;
    async fn comics_by_genre(&self, slug: &str, page: u32) -> Result<ApiResponse<ListData>>;
    async fn comics_list(&self, list_type: &str, page: u32) -> Result<ApiResponse<ListData>>;
    async fn search(&self, keyword: &str, page: u32) -> Result<ApiResponse<ListData>>;
    async fn chapter(&self, api_url: &str) -> Result<ApiResponse<ChapterData>>;
}

// ---------------------------------------------------------------------------
// 文件資料庫介面
// ---------------------------------------------------------------------------

/// A stored document. `path` is `collection/id`, possibly nested
/// (`users/{uid}/bookmarks/{slug}`).
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub path: String,
    pub data: Value,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    /// The document must not exist yet.
    Missing,
    /// The document must exist at exactly this version.
    Version(u64),
}

impl Precondition {
    /// Precondition that holds only if the document is still in the state
    /// it was read in.
    pub fn unchanged_since(read: Option<&Document>) -> Self {
        match read {
            Some(doc) => Self::Version(doc.version),
            None => Self::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        path: String,
        data: Value,
        precondition: Precondition,
    },
    /// Shallow merge of top-level fields; creates the document when absent.
    Merge { path: String, data: Value },
    Delete {
        path: String,
        precondition: Precondition,
    },
}

impl WriteOp {
    pub fn set(path: impl Into<String>, data: Value) -> Self {
        Self::Set {
            path: path.into(),
            data,
            precondition: Precondition::None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete {
            path: path.into(),
            precondition: Precondition::None,
        }
    }

    pub fn with_precondition(self, precondition: Precondition) -> Self {
        match self {
            Self::Set { path, data, .. } => Self::Set {
                path,
                data,
                precondition,
            },
            Self::Delete { path, .. } => Self::Delete { path, precondition },
            merge => merge,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Set { path, .. } | Self::Merge { path, .. } | Self::Delete { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    /// Field equality filters. `Value::Null` also matches a missing field.
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Managed document store. `commit` applies every write or none of them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Document>>;
    async fn list(&self, collection: &str) -> Result<Vec<Document>>;
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;
    /// Inserts under a generated id and returns that id.
    async fn add(&self, collection: &str, data: Value) -> Result<String>;
    async fn commit(&self, writes: Vec<WriteOp>) -> Result<()>;

    async fn set(&self, path: &str, data: Value) -> Result<()> {
        self.commit(vec![WriteOp::set(path, data)]).await
    }

    async fn merge(&self, path: &str, data: Value) -> Result<()> {
        self.commit(vec![WriteOp::Merge {
            path: path.to_string(),
            data,
        }])
        .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.commit(vec![WriteOp::delete(path)]).await
    }
}
