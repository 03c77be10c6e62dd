pub mod admin;
pub mod bookmarks;
pub mod chapters;
pub mod comments;
pub mod history;
pub mod ratings;
pub mod submissions;
pub mod users;
pub mod views;

pub use crate::domain::model::*;
pub use crate::domain::ports::{ComicSource, ConfigProvider, Document, DocumentStore, Storage};
pub use crate::utils::error::Result;

use serde::de::DeserializeOwned;

/// Decodes a stored document's data into a model.
pub(crate) fn decode<T: DeserializeOwned>(doc: &Document) -> Result<T> {
    Ok(serde_json::from_value(doc.data.clone())?)
}
