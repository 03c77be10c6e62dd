#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{AdminCommand, BookmarkCommand, CliConfig, Command, CommentCommand, HistoryCommand};
pub use toml_config::AppConfig;
