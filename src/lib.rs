pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::AppConfig;

pub use adapters::{LocalStorage, MemoryDocumentStore, OTruyenClient};
pub use core::{
    admin::AdminService, bookmarks::BookmarkService, comments::CommentService,
    history::ReadingHistory, ratings::RatingService, submissions::SubmissionService,
    users::Session, users::UserService,
    views::ViewService,
};
pub use utils::error::{MangaError, Result};
