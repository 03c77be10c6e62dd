use crate::core::comments::{into_comment, COMMENTS_COLLECTION};
use crate::core::decode;
use crate::core::ratings::{RatingService, DEFAULT_RATINGS_PAGE};
use crate::core::users::{Session, UserService, USERS_COLLECTION};
use crate::domain::model::{AuthUser, Comment, Role, UserProfile};
use crate::domain::ports::{ComicSource, Direction, DocumentStore, Query};
use crate::utils::error::Result;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

pub const DEFAULT_COMMENTS_PAGE: usize = 100;
pub const DEFAULT_RECENT_USERS: usize = 5;
pub const RECENT_COMMENTS: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentStats {
    pub total_comments: usize,
    pub total_bookmarks: usize,
    pub total_users: usize,
    pub total_admins: usize,
    pub recent_comments: Vec<Comment>,
    pub recent_users: Vec<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub total_comics: u64,
    pub total_ratings: usize,
    pub total_comments: usize,
    pub total_bookmarks: usize,
    pub total_users: usize,
    pub total_admins: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RatingRow<'a> {
    id: &'a str,
    comic_slug: &'a str,
    comic_name: &'a str,
    user_id: &'a str,
    user_email: &'a str,
    user_name: &'a str,
    rating: u8,
    created_at: String,
    updated_at: String,
}

/// Moderation and statistics. Only obtainable for an admin session.
pub struct AdminService {
    store: Arc<dyn DocumentStore>,
    ratings: RatingService,
    admin: AuthUser,
}

impl AdminService {
    pub async fn authorize(store: Arc<dyn DocumentStore>, session: &Session) -> Result<Self> {
        let admin = UserService::new(store.clone())
            .require_admin(session)
            .await?
            .clone();
        Ok(Self {
            ratings: RatingService::new(store.clone()),
            store,
            admin,
        })
    }

    pub fn admin(&self) -> &AuthUser {
        &self.admin
    }

    pub fn ratings(&self) -> &RatingService {
        &self.ratings
    }

    pub async fn all_comments(&self, limit: usize) -> Result<Vec<Comment>> {
        let query = Query::collection(COMMENTS_COLLECTION)
            .order_by("createdAt", Direction::Descending)
            .limit(limit);
        self.store.query(&query).await?.iter().map(into_comment).collect()
    }

    pub async fn comment_count(&self) -> Result<usize> {
        Ok(self.store.list(COMMENTS_COLLECTION).await?.len())
    }

    /// Deletes any comment, regardless of author.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        tracing::info!("🗑️ Admin {} deleted comment {}", self.admin.uid, comment_id);
        self.store
            .delete(&format!("{}/{}", COMMENTS_COLLECTION, comment_id))
            .await
    }

    /// Bookmarks summed over every user's subcollection.
    pub async fn bookmark_count(&self) -> Result<usize> {
        let mut total = 0;
        for user in self.store.list(USERS_COLLECTION).await? {
            total += self
                .store
                .list(&crate::core::bookmarks::bookmarks_collection(&user.id))
                .await?
                .len();
        }
        Ok(total)
    }

    pub async fn user_count(&self) -> Result<usize> {
        Ok(self.store.list(USERS_COLLECTION).await?.len())
    }

    pub async fn admin_count(&self) -> Result<usize> {
        let mut count = 0;
        for doc in self.store.list(USERS_COLLECTION).await? {
            let profile: UserProfile = decode(&doc)?;
            if profile.role() == Role::Admin {
                count += 1;
            }
        }
        Ok(count)
    }

    pub async fn recent_users(&self, limit: usize) -> Result<Vec<UserProfile>> {
        let query = Query::collection(USERS_COLLECTION).limit(limit);
        self.store
            .query(&query)
            .await?
            .into_iter()
            .map(|doc| -> Result<UserProfile> {
                let mut profile: UserProfile = decode(&doc)?;
                profile.uid = doc.id;
                Ok(profile)
            })
            .collect()
    }

    pub async fn recent_stats(&self) -> Result<RecentStats> {
        Ok(RecentStats {
            recent_comments: self.all_comments(RECENT_COMMENTS).await?,
            total_comments: self.comment_count().await?,
            total_bookmarks: self.bookmark_count().await?,
            total_users: self.user_count().await?,
            total_admins: self.admin_count().await?,
            recent_users: self.recent_users(DEFAULT_RECENT_USERS).await?,
        })
    }

    /// Dashboard numbers. The comic total comes from the home feed's
    /// pagination and is 0 when the comics API is unreachable.
    pub async fn site_stats(&self, api: &dyn ComicSource) -> Result<SiteStats> {
        let total_comics = match api.home().await {
            Ok(home) => home.data.pagination().map(|p| p.total_items).unwrap_or(0),
            Err(e) => {
                tracing::error!("Failed to load home feed for stats: {}", e);
                0
            }
        };

        Ok(SiteStats {
            total_comics,
            total_ratings: self.ratings.total_count().await?,
            total_comments: self.comment_count().await?,
            total_bookmarks: self.bookmark_count().await?,
            total_users: self.user_count().await?,
            total_admins: self.admin_count().await?,
        })
    }

    /// Writes the most recent ratings as CSV and returns the row count.
    pub async fn export_ratings_csv<W: Write>(&self, writer: W, limit: Option<usize>) -> Result<usize> {
        let ratings = self
            .ratings
            .all_ratings(limit.unwrap_or(DEFAULT_RATINGS_PAGE))
            .await?;

        let mut csv = csv::Writer::from_writer(writer);
        for rating in &ratings {
            csv.serialize(RatingRow {
                id: &rating.id,
                comic_slug: &rating.comic_slug,
                comic_name: &rating.comic_name,
                user_id: &rating.user_id,
                user_email: &rating.user_email,
                user_name: &rating.user_name,
                rating: rating.rating.value(),
                created_at: rating.created_at.to_rfc3339(),
                updated_at: rating.updated_at.to_rfc3339(),
            })?;
        }
        csv.flush()?;
        Ok(ratings.len())
    }
}
