use crate::core::decode;
use crate::domain::model::{AuthUser, Bookmark, ComicRef};
use crate::domain::ports::DocumentStore;
use crate::utils::error::Result;
use crate::utils::validation::validate_slug;
use chrono::Utc;
use std::sync::Arc;

pub fn bookmarks_collection(uid: &str) -> String {
    format!("users/{}/bookmarks", uid)
}

fn bookmark_path(uid: &str, slug: &str) -> String {
    format!("{}/{}", bookmarks_collection(uid), slug)
}

/// Followed comics, one subcollection per user.
#[derive(Clone)]
pub struct BookmarkService {
    store: Arc<dyn DocumentStore>,
}

impl BookmarkService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, user: &AuthUser, comic: &ComicRef) -> Result<()> {
        validate_slug("slug", &comic.slug)?;
        let bookmark = Bookmark {
            slug: comic.slug.clone(),
            name: comic.name.clone(),
            thumb_url: comic.thumb_url.clone(),
            latest_chapter: comic.latest_chapter.clone().filter(|c| !c.is_empty()),
            added_at: Utc::now(),
        };
        self.store
            .set(&bookmark_path(&user.uid, &comic.slug), serde_json::to_value(&bookmark)?)
            .await?;
        tracing::debug!("🔖 {} bookmarked {}", user.uid, comic.slug);
        Ok(())
    }

    pub async fn remove(&self, user: &AuthUser, slug: &str) -> Result<()> {
        self.store.delete(&bookmark_path(&user.uid, slug)).await
    }

    pub async fn is_bookmarked(&self, user: &AuthUser, slug: &str) -> Result<bool> {
        Ok(self.store.get(&bookmark_path(&user.uid, slug)).await?.is_some())
    }

    /// Newest first.
    pub async fn list(&self, user: &AuthUser) -> Result<Vec<Bookmark>> {
        let mut bookmarks = self
            .store
            .list(&bookmarks_collection(&user.uid))
            .await?
            .into_iter()
            .map(|doc| -> Result<Bookmark> {
                let mut bookmark: Bookmark = decode(&doc)?;
                bookmark.slug = doc.id;
                Ok(bookmark)
            })
            .collect::<Result<Vec<_>>>()?;
        bookmarks.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(bookmarks)
    }

    /// Flips the bookmark and returns whether the comic is now followed.
    pub async fn toggle(&self, user: &AuthUser, comic: &ComicRef) -> Result<bool> {
        if self.is_bookmarked(user, &comic.slug).await? {
            self.remove(user, &comic.slug).await?;
            Ok(false)
        } else {
            self.add(user, comic).await?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryDocumentStore;
    use serde_json::json;

    fn comic(slug: &str) -> ComicRef {
        ComicRef {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            thumb_url: format!("https://img/{}.jpg", slug),
            latest_chapter: None,
        }
    }

    #[tokio::test]
    async fn test_toggle() {
        let bookmarks = BookmarkService::new(Arc::new(MemoryDocumentStore::new()));
        let user = AuthUser::new("u1");

        assert!(bookmarks.toggle(&user, &comic("a")).await.unwrap());
        assert!(bookmarks.is_bookmarked(&user, "a").await.unwrap());
        assert!(!bookmarks.toggle(&user, &comic("a")).await.unwrap());
        assert!(!bookmarks.is_bookmarked(&user, "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_latest_chapter_not_stored() {
        let store = Arc::new(MemoryDocumentStore::new());
        let bookmarks = BookmarkService::new(store.clone());
        bookmarks.add(&AuthUser::new("u1"), &comic("a")).await.unwrap();

        let doc = store.get("users/u1/bookmarks/a").await.unwrap().unwrap();
        assert!(doc.data.get("latestChapter").is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = Arc::new(MemoryDocumentStore::new());
        for (slug, added) in [("old", 1_000), ("new", 3_000), ("mid", 2_000)] {
            store
                .set(
                    &format!("users/u1/bookmarks/{}", slug),
                    json!({"slug": slug, "name": slug, "thumbUrl": "", "addedAt": added}),
                )
                .await
                .unwrap();
        }
        let bookmarks = BookmarkService::new(store);
        let slugs: Vec<String> = bookmarks
            .list(&AuthUser::new("u1"))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.slug)
            .collect();
        assert_eq!(slugs, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let bookmarks = BookmarkService::new(Arc::new(MemoryDocumentStore::new()));
        bookmarks.add(&AuthUser::new("u1"), &comic("a")).await.unwrap();
        assert!(bookmarks.list(&AuthUser::new("u2")).await.unwrap().is_empty());
    }
}
