use crate::domain::model::ReadingHistoryItem;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::Utc;

pub const HISTORY_KEY: &str = "mangahub_reading_history";
pub const DEFAULT_MAX_HISTORY_ITEMS: usize = 50;

/// A chapter the reader just opened.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub comic_slug: String,
    pub comic_name: String,
    pub thumb_url: String,
    pub chapter_name: String,
    pub chapter_title: Option<String>,
}

/// Recently read chapters, most recent first, kept in local storage.
pub struct ReadingHistory<S: Storage> {
    storage: S,
    max_items: usize,
}

impl<S: Storage> ReadingHistory<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            max_items: DEFAULT_MAX_HISTORY_ITEMS,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Missing or unreadable history is treated as empty.
    pub async fn list(&self) -> Vec<ReadingHistoryItem> {
        let bytes = match self.storage.read_file(HISTORY_KEY).await {
            Ok(bytes) => bytes,
            Err(_) => return Vec::new(),
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable reading history: {}", e);
            Vec::new()
        })
    }

    /// Moves (or inserts) the chapter to the front of the history.
    pub async fn add(&self, entry: HistoryEntry) -> Result<Vec<ReadingHistoryItem>> {
        let mut history: Vec<ReadingHistoryItem> = self
            .list()
            .await
            .into_iter()
            .filter(|h| !(h.comic_slug == entry.comic_slug && h.chapter_name == entry.chapter_name))
            .collect();

        history.insert(
            0,
            ReadingHistoryItem {
                comic_slug: entry.comic_slug,
                comic_name: entry.comic_name,
                thumb_url: entry.thumb_url,
                chapter_name: entry.chapter_name,
                chapter_title: entry.chapter_title.filter(|t| !t.is_empty()),
                read_at: Utc::now().timestamp_millis(),
            },
        );
        history.truncate(self.max_items);

        self.storage
            .write_file(HISTORY_KEY, &serde_json::to_vec(&history)?)
            .await?;
        Ok(history)
    }

    /// Latest chapter read for a comic, for a "continue reading" link.
    pub async fn last_read(&self, comic_slug: &str) -> Option<ReadingHistoryItem> {
        self.list()
            .await
            .into_iter()
            .find(|h| h.comic_slug == comic_slug)
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.remove_file(HISTORY_KEY).await
    }
}
