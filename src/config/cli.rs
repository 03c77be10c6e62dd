use crate::config::toml_config::{AppConfig, DEFAULT_CONFIG_FILE};
use crate::domain::model::AuthUser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "mangahub")]
#[command(about = "Browse and read comics from the OTruyen API, with ratings, bookmarks and comments")]
#[command(version)]
pub struct CliConfig {
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(long, help = "Override [api] base_url")]
    pub api_base_url: Option<String>,

    #[arg(long, help = "Override [storage] data_dir")]
    pub data_dir: Option<String>,

    #[arg(long, help = "Override [api] timeout_seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Act as this signed-in user id")]
    pub user: Option<String>,

    #[arg(long, requires = "user")]
    pub email: Option<String>,

    #[arg(long, requires = "user")]
    pub name: Option<String>,

    #[arg(long, help = "Print results as JSON")]
    pub json: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Home feed: featured, recommended and latest comics
    Home,
    /// Comic details, chapters, rating and comments
    Comic {
        slug: String,
        #[arg(long, help = "Only chapters whose name or title contains this text")]
        filter: Option<String>,
        #[arg(long, help = "List chapters oldest first")]
        oldest_first: bool,
    },
    /// All genres
    Genres,
    /// Comics in a genre
    Genre {
        slug: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// A fixed list: truyen-moi, dang-phat-hanh, hoan-thanh, sap-ra-mat
    List {
        list_type: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Search {
        keyword: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Chapter image URLs; records the chapter in the reading history
    Read { slug: String, chapter: String },
    /// Rate a comic from 1 to 5 stars
    Rate { slug: String, score: i64 },
    /// Remove your rating
    Unrate { slug: String },
    #[command(subcommand)]
    Bookmark(BookmarkCommand),
    #[command(subcommand)]
    Comment(CommentCommand),
    #[command(subcommand)]
    History(HistoryCommand),
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Send free-form feedback; no sign-in needed
    Submit { content: String },
}

impl Command {
    /// Whether the command can change the document store.
    pub fn writes_store(&self) -> bool {
        !matches!(
            self,
            Command::Home
                | Command::Comic { .. }
                | Command::Genres
                | Command::Genre { .. }
                | Command::List { .. }
                | Command::Search { .. }
                | Command::Read { .. }
                | Command::History(_)
        )
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum BookmarkCommand {
    Add { slug: String },
    Remove { slug: String },
    List,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CommentCommand {
    Add {
        slug: String,
        content: String,
        #[arg(long)]
        chapter: Option<String>,
        #[arg(long)]
        reply_to: Option<String>,
    },
    List {
        slug: String,
        #[arg(long, conflicts_with = "all")]
        chapter: Option<String>,
        #[arg(long, help = "Include chapter comments")]
        all: bool,
    },
    Delete { id: String },
    /// Your own comments, newest first
    Mine,
}

#[derive(Debug, Clone, Subcommand)]
pub enum HistoryCommand {
    List,
    Clear,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AdminCommand {
    /// Site-wide counts
    Stats,
    /// Most recent ratings
    Ratings {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Most recent comments
    Comments {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    DeleteComment { id: String },
    /// Most recent public submissions
    Submissions {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Export ratings as CSV
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl CliConfig {
    /// The file configuration with command-line overrides applied.
    pub fn apply_overrides(&self, mut config: AppConfig) -> AppConfig {
        if let Some(url) = &self.api_base_url {
            config.api.base_url = url.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if let Some(timeout) = self.timeout {
            config.api.timeout_seconds = timeout;
        }
        if self.json_logs {
            config.logging.json = true;
        }
        config
    }

    pub fn auth_user(&self) -> Option<AuthUser> {
        self.user.as_ref().map(|uid| AuthUser {
            uid: uid.clone(),
            email: self.email.clone(),
            display_name: self.name.clone(),
            photo_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_file() {
        let cli = CliConfig::parse_from([
            "mangahub",
            "--api-base-url",
            "http://localhost:9000",
            "--timeout",
            "3",
            "home",
        ]);
        let config = cli.apply_overrides(AppConfig::default());
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.timeout_seconds, 3);
        assert_eq!(config.storage.data_dir, AppConfig::default().storage.data_dir);
    }

    #[test]
    fn test_user_flags() {
        let cli = CliConfig::parse_from([
            "mangahub", "--user", "u1", "--name", "Reader", "rate", "one-piece", "4",
        ]);
        let user = cli.auth_user().unwrap();
        assert_eq!(user.uid, "u1");
        assert_eq!(user.visible_name(), "Reader");
        assert!(matches!(cli.command, Command::Rate { score: 4, .. }));
    }

    #[test]
    fn test_nested_subcommands() {
        let cli = CliConfig::parse_from(["mangahub", "comment", "list", "one-piece", "--chapter", "12"]);
        match cli.command {
            Command::Comment(CommentCommand::List { slug, chapter, all }) => {
                assert_eq!(slug, "one-piece");
                assert_eq!(chapter.as_deref(), Some("12"));
                assert!(!all);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(CliConfig::try_parse_from(["mangahub", "--email", "a@b", "home"]).is_err());
    }

    #[test]
    fn test_writing_commands() {
        let parse = |args: &[&str]| CliConfig::parse_from(args).command;
        assert!(parse(&["mangahub", "submit", "xin chào"]).writes_store());
        assert!(parse(&["mangahub", "comment", "mine"]).writes_store());
        assert!(parse(&["mangahub", "rate", "one-piece", "5"]).writes_store());
        assert!(!parse(&["mangahub", "read", "one-piece", "1"]).writes_store());
        assert!(!parse(&["mangahub", "home"]).writes_store());
    }
}
