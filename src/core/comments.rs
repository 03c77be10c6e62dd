use crate::core::decode;
use crate::domain::model::{AuthUser, Comment, CommentInput};
use crate::domain::ports::{Direction, Document, DocumentStore, Query};
use crate::utils::error::{MangaError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_slug};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

pub const COMMENTS_COLLECTION: &str = "comments";

impl CommentInput {
    /// Comment by `user` on a comic, or on one of its chapters.
    pub fn by(user: &AuthUser, comic_slug: &str, chapter_name: Option<&str>, content: &str) -> Self {
        Self {
            user_id: user.uid.clone(),
            user_name: user.visible_name(),
            user_avatar: user.photo_url.clone(),
            content: content.to_string(),
            comic_slug: comic_slug.to_string(),
            chapter_name: chapter_name.map(str::to_string),
            parent_id: None,
        }
    }

    pub fn reply_to(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }
}

pub(crate) fn into_comment(doc: &Document) -> Result<Comment> {
    let mut comment: Comment = decode(doc)?;
    comment.id = doc.id.clone();
    Ok(comment)
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn DocumentStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, input: CommentInput) -> Result<String> {
        validate_slug("comic_slug", &input.comic_slug)?;
        validate_non_empty_string("content", &input.content)?;

        let comment = Comment {
            id: String::new(),
            user_id: input.user_id,
            user_name: input.user_name,
            user_avatar: input.user_avatar,
            content: input.content.trim().to_string(),
            comic_slug: input.comic_slug,
            chapter_name: input.chapter_name,
            parent_id: input.parent_id,
            created_at: Utc::now(),
        };
        let id = self
            .store
            .add(COMMENTS_COLLECTION, serde_json::to_value(&comment)?)
            .await?;
        tracing::debug!("💬 Comment {} added on {}", id, comment.comic_slug);
        Ok(id)
    }

    async fn run(&self, query: Query) -> Result<Vec<Comment>> {
        self.store.query(&query).await?.iter().map(into_comment).collect()
    }

    fn newest_first() -> Query {
        Query::collection(COMMENTS_COLLECTION).order_by("createdAt", Direction::Descending)
    }

    /// Comments on the comic itself, excluding chapter comments.
    pub async fn comic_comments(&self, comic_slug: &str) -> Result<Vec<Comment>> {
        self.run(
            Self::newest_first()
                .where_eq("comicSlug", comic_slug)
                .where_eq("chapterName", Value::Null),
        )
        .await
    }

    pub async fn chapter_comments(&self, comic_slug: &str, chapter_name: &str) -> Result<Vec<Comment>> {
        self.run(
            Self::newest_first()
                .where_eq("comicSlug", comic_slug)
                .where_eq("chapterName", chapter_name),
        )
        .await
    }

    pub async fn all_comic_comments(&self, comic_slug: &str) -> Result<Vec<Comment>> {
        self.run(Self::newest_first().where_eq("comicSlug", comic_slug))
            .await
    }

    pub async fn user_comments(&self, user_id: &str) -> Result<Vec<Comment>> {
        self.run(Self::newest_first().where_eq("userId", user_id))
            .await
    }

    pub async fn get(&self, comment_id: &str) -> Result<Option<Comment>> {
        let path = format!("{}/{}", COMMENTS_COLLECTION, comment_id);
        self.store.get(&path).await?.as_ref().map(into_comment).transpose()
    }

    /// Deletes a comment written by `requester`.
    pub async fn delete(&self, comment_id: &str, requester: &AuthUser) -> Result<()> {
        let comment = self
            .get(comment_id)
            .await?
            .ok_or_else(|| MangaError::not_found(format!("Comment '{}'", comment_id)))?;

        if comment.user_id != requester.uid {
            return Err(MangaError::Forbidden {
                reason: "only the author can delete this comment".to_string(),
            });
        }

        self.store
            .delete(&format!("{}/{}", COMMENTS_COLLECTION, comment_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryDocumentStore;
    use serde_json::json;

    fn service() -> (Arc<MemoryDocumentStore>, CommentService) {
        let store = Arc::new(MemoryDocumentStore::new());
        (store.clone(), CommentService::new(store))
    }

    #[tokio::test]
    async fn test_comic_and_chapter_comments_are_separate() {
        let (_, comments) = service();
        let user = AuthUser::new("u1");
        comments.add(CommentInput::by(&user, "a", None, "great")).await.unwrap();
        comments.add(CommentInput::by(&user, "a", Some("12"), "wow")).await.unwrap();
        comments.add(CommentInput::by(&user, "b", None, "meh")).await.unwrap();

        assert_eq!(comments.comic_comments("a").await.unwrap().len(), 1);
        let chapter = comments.chapter_comments("a", "12").await.unwrap();
        assert_eq!(chapter.len(), 1);
        assert_eq!(chapter[0].content, "wow");
        assert_eq!(comments.all_comic_comments("a").await.unwrap().len(), 2);
        assert_eq!(comments.user_comments("u1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_newest_first() {
        let (store, comments) = service();
        for (id, at) in [("c1", 10), ("c2", 30), ("c3", 20)] {
            store
                .set(
                    &format!("comments/{}", id),
                    json!({"userId": "u", "userName": "U", "content": id, "comicSlug": "a", "createdAt": at}),
                )
                .await
                .unwrap();
        }
        let ids: Vec<String> = comments
            .comic_comments("a")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["c2", "c3", "c1"]);
    }

    #[tokio::test]
    async fn test_blank_comment_rejected() {
        let (store, comments) = service();
        let err = comments
            .add(CommentInput::by(&AuthUser::new("u"), "a", None, "  \n"))
            .await
            .unwrap_err();
        assert!(matches!(err, MangaError::InvalidInput { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_only_author_deletes() {
        let (_, comments) = service();
        let author = AuthUser::new("author");
        let id = comments
            .add(CommentInput::by(&author, "a", None, "mine"))
            .await
            .unwrap();

        let err = comments.delete(&id, &AuthUser::new("other")).await.unwrap_err();
        assert!(matches!(err, MangaError::Forbidden { .. }));

        comments.delete(&id, &author).await.unwrap();
        assert!(comments.get(&id).await.unwrap().is_none());

        let err = comments.delete(&id, &author).await.unwrap_err();
        assert!(matches!(err, MangaError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reply_keeps_parent() {
        let (_, comments) = service();
        let user = AuthUser::new("u");
        let parent = comments.add(CommentInput::by(&user, "a", None, "q")).await.unwrap();
        let reply = comments
            .add(CommentInput::by(&user, "a", None, "a").reply_to(&parent))
            .await
            .unwrap();
        let stored = comments.get(&reply).await.unwrap().unwrap();
        assert_eq!(stored.parent_id.as_deref(), Some(parent.as_str()));
    }
}
