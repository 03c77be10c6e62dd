//! Star ratings and the per-comic rating summary.
//!
//! Each vote lives at `ratings/{slug}_{uid}`; the denormalized summary lives
//! at `comic_ratings/{slug}`. Slugs of rated comics may not contain `_`, so
//! the first underscore of a vote id always separates slug from uid.
//!
//! A vote and its summary update are committed together, guarded by the
//! versions both documents had when they were read.
//! If another writer got in between, the commit is rejected as a conflict
//! and the whole read/compute/commit cycle runs again.

use crate::core::decode;
use crate::domain::model::{AuthUser, Rating, RatingSummary, Score};
use crate::domain::ports::{Direction, DocumentStore, Precondition, Query, WriteOp};
use crate::utils::error::{MangaError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_slug};
use chrono::Utc;
use std::sync::Arc;

pub const RATINGS_COLLECTION: &str = "ratings";
pub const SUMMARIES_COLLECTION: &str = "comic_ratings";
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: usize = 5;
pub const DEFAULT_RATINGS_PAGE: usize = 50;

/// Vote document id for (comic, voter).
pub fn rating_id(comic_slug: &str, user_id: &str) -> Result<String> {
    validate_slug("comic_slug", comic_slug)?;
    if comic_slug.contains('_') {
        return Err(MangaError::InvalidInput {
            field: "comic_slug".to_string(),
            reason: format!("'{}' contains '_', which separates vote ids", comic_slug),
        });
    }
    validate_non_empty_string("user_id", user_id)?;
    if user_id.contains('/') {
        return Err(MangaError::InvalidInput {
            field: "user_id".to_string(),
            reason: format!("'{}' contains '/'", user_id),
        });
    }
    Ok(format!("{}_{}", comic_slug, user_id))
}

pub fn rating_path(comic_slug: &str, user_id: &str) -> Result<String> {
    Ok(format!("{}/{}", RATINGS_COLLECTION, rating_id(comic_slug, user_id)?))
}

pub fn summary_path(comic_slug: &str) -> String {
    format!("{}/{}", SUMMARIES_COLLECTION, comic_slug)
}

#[derive(Clone)]
pub struct RatingService {
    store: Arc<dyn DocumentStore>,
    max_attempts: usize,
}

impl RatingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Inserts or changes `voter`'s vote and returns the updated summary.
    pub async fn try_submit(
        &self,
        comic_slug: &str,
        comic_name: &str,
        voter: &AuthUser,
        score: i64,
    ) -> Result<RatingSummary> {
        let score = Score::try_from(score)?;
        let vote_id = rating_id(comic_slug, &voter.uid)?;
        let vote_path = format!("{}/{}", RATINGS_COLLECTION, vote_id);
        let summary_path = summary_path(comic_slug);

        for attempt in 1..=self.max_attempts {
            let now = Utc::now();

            let vote_doc = self.store.get(&vote_path).await?;
            let previous = vote_doc
                .as_ref()
                .map(|doc| owned_vote(doc, comic_slug, &voter.uid))
                .transpose()?;
            let summary_doc = self.store.get(&summary_path).await?;
            let mut summary = match summary_doc.as_ref() {
                Some(doc) => decode::<RatingSummary>(doc)?,
                None => RatingSummary::empty(comic_slug, now),
            };

            let vote = Rating {
                id: vote_id.clone(),
                comic_slug: comic_slug.to_string(),
                comic_name: comic_name.to_string(),
                user_id: voter.uid.clone(),
                user_email: voter.email.clone().unwrap_or_default(),
                user_name: voter.visible_name(),
                rating: score,
                created_at: previous.as_ref().map(|r| r.created_at).unwrap_or(now),
                updated_at: now,
            };
            summary.apply_vote(previous.as_ref().map(|r| r.rating), score, now);

            let writes = vec![
                WriteOp::set(&vote_path, serde_json::to_value(&vote)?)
                    .with_precondition(Precondition::unchanged_since(vote_doc.as_ref())),
                WriteOp::set(&summary_path, serde_json::to_value(&summary)?)
                    .with_precondition(Precondition::unchanged_since(summary_doc.as_ref())),
            ];

            match self.store.commit(writes).await {
                Ok(()) => {
                    tracing::debug!(
                        "⭐ {} rated {} {} (total {}, avg {})",
                        voter.uid,
                        comic_slug,
                        score,
                        summary.total_ratings,
                        summary.average_rating
                    );
                    return Ok(summary);
                }
                Err(MangaError::Conflict { path }) => {
                    tracing::debug!("Conflict on {} (attempt {}), retrying", path, attempt);
                }
                Err(e) => return Err(e),
            }
        }

        Err(MangaError::Conflict { path: summary_path })
    }

    /// Removes `user_id`'s vote. Returns the updated summary, or `None` when
    /// the comic had no summary document to update.
    pub async fn try_remove(&self, comic_slug: &str, user_id: &str) -> Result<Option<RatingSummary>> {
        let vote_path = rating_path(comic_slug, user_id)?;
        let summary_path = summary_path(comic_slug);

        for attempt in 1..=self.max_attempts {
            let now = Utc::now();

            let vote_doc = self
                .store
                .get(&vote_path)
                .await?
                .ok_or_else(|| MangaError::not_found(format!("Rating for '{}' by '{}'", comic_slug, user_id)))?;
            let vote = owned_vote(&vote_doc, comic_slug, user_id)?;

            let mut writes = vec![WriteOp::delete(&vote_path)
                .with_precondition(Precondition::Version(vote_doc.version))];

            let summary = match self.store.get(&summary_path).await? {
                Some(doc) => {
                    let mut summary: RatingSummary = decode(&doc)?;
                    summary.retract_vote(vote.rating, now);
                    writes.push(
                        WriteOp::set(&summary_path, serde_json::to_value(&summary)?)
                            .with_precondition(Precondition::Version(doc.version)),
                    );
                    Some(summary)
                }
                None => {
                    tracing::warn!("Rating {} has no summary document", vote_path);
                    writes.push(
                        WriteOp::delete(&summary_path).with_precondition(Precondition::Missing),
                    );
                    None
                }
            };

            match self.store.commit(writes).await {
                Ok(()) => return Ok(summary),
                Err(MangaError::Conflict { path }) => {
                    tracing::debug!("Conflict on {} (attempt {}), retrying", path, attempt);
                }
                Err(e) => return Err(e),
            }
        }

        Err(MangaError::Conflict { path: summary_path })
    }

    /// Submits a vote, logging any failure. Callers only need to know
    /// whether to show a retry message.
    pub async fn submit_rating(
        &self,
        comic_slug: &str,
        comic_name: &str,
        voter: &AuthUser,
        score: i64,
    ) -> bool {
        match self.try_submit(comic_slug, comic_name, voter, score).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Error submitting rating for {}: {}", comic_slug, e);
                false
            }
        }
    }

    /// Deletes a vote, logging any failure. Deleting a vote that does not
    /// exist changes nothing and reports failure.
    pub async fn delete_rating(&self, comic_slug: &str, user_id: &str) -> bool {
        match self.try_remove(comic_slug, user_id).await {
            Ok(_) => true,
            Err(MangaError::NotFound { what }) => {
                tracing::debug!("{} not found, nothing to delete", what);
                false
            }
            Err(e) => {
                tracing::error!("Error deleting rating for {}: {}", comic_slug, e);
                false
            }
        }
    }

    pub async fn user_rating(&self, comic_slug: &str, user_id: &str) -> Result<Option<Rating>> {
        let doc = self.store.get(&rating_path(comic_slug, user_id)?).await?;
        doc.map(|d| owned_vote(&d, comic_slug, user_id)).transpose()
    }

    pub async fn summary(&self, comic_slug: &str) -> Result<Option<RatingSummary>> {
        let doc = self.store.get(&summary_path(comic_slug)).await?;
        doc.as_ref().map(decode).transpose()
    }

    /// Most recently updated votes across all comics.
    pub async fn all_ratings(&self, limit: usize) -> Result<Vec<Rating>> {
        let query = Query::collection(RATINGS_COLLECTION)
            .order_by("updatedAt", Direction::Descending)
            .limit(limit);
        self.store.query(&query).await?.iter().map(into_rating).collect()
    }

    pub async fn ratings_for(&self, comic_slug: &str) -> Result<Vec<Rating>> {
        let query = Query::collection(RATINGS_COLLECTION)
            .where_eq("comicSlug", comic_slug)
            .order_by("updatedAt", Direction::Descending);
        self.store.query(&query).await?.iter().map(into_rating).collect()
    }

    pub async fn all_summaries(&self) -> Result<Vec<RatingSummary>> {
        self.store
            .list(SUMMARIES_COLLECTION)
            .await?
            .iter()
            .map(decode)
            .collect()
    }

    pub async fn total_count(&self) -> Result<usize> {
        Ok(self.store.list(RATINGS_COLLECTION).await?.len())
    }
}

fn into_rating(doc: &crate::domain::ports::Document) -> Result<Rating> {
    let mut rating: Rating = decode(doc)?;
    rating.id = doc.id.clone();
    Ok(rating)
}

/// Decodes a vote read by id and checks it really is (comic, voter)'s.
fn owned_vote(doc: &crate::domain::ports::Document, comic_slug: &str, user_id: &str) -> Result<Rating> {
    let vote = into_rating(doc)?;
    if vote.comic_slug != comic_slug || vote.user_id != user_id {
        return Err(MangaError::store(format!(
            "{} holds the vote of '{}' on '{}', not '{}' on '{}'",
            doc.path, vote.user_id, vote.comic_slug, user_id, comic_slug
        )));
    }
    Ok(vote)
}
