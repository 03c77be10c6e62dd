use crate::core::decode;
use crate::domain::model::Submission;
use crate::domain::ports::{Direction, DocumentStore, Query};
use crate::utils::error::Result;
use crate::utils::validation::validate_non_empty_string;
use chrono::Utc;
use std::sync::Arc;

pub const SUBMISSIONS_COLLECTION: &str = "submissions";

/// Anonymous text submissions. Anyone may send one; only admins read them.
#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<dyn DocumentStore>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn submit(&self, content: &str) -> Result<String> {
        validate_non_empty_string("content", content)?;
        let submission = Submission {
            id: String::new(),
            content: content.trim().to_string(),
            created_at: Utc::now(),
        };
        let id = self
            .store
            .add(SUBMISSIONS_COLLECTION, serde_json::to_value(&submission)?)
            .await?;
        tracing::info!("📨 Submission {} saved", id);
        Ok(id)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Submission>> {
        let query = Query::collection(SUBMISSIONS_COLLECTION)
            .order_by("createdAt", Direction::Descending)
            .limit(limit);
        self.store
            .query(&query)
            .await?
            .iter()
            .map(|doc| {
                let mut submission: Submission = decode(doc)?;
                submission.id = doc.id.clone();
                Ok(submission)
            })
            .collect()
    }
}
