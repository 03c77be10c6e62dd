use clap::Parser;
use mangahub::config::{
    AdminCommand, AppConfig, BookmarkCommand, CliConfig, Command, CommentCommand, HistoryCommand,
};
use mangahub::core::chapters::{self, SortOrder};
use mangahub::core::views::{ComicCard, ListView};
use mangahub::domain::model::{Comment, CommentInput};
use mangahub::domain::ports::{ComicSource, ConfigProvider};
use mangahub::utils::error::ErrorSeverity;
use mangahub::utils::{logger, validation::Validate};
use mangahub::{
    AdminService, BookmarkService, CommentService, LocalStorage, MemoryDocumentStore,
    OTruyenClient, RatingService, ReadingHistory, Session, SubmissionService, UserService,
    ViewService,
};
use serde::Serialize;
use std::sync::Arc;

const STORE_SNAPSHOT: &str = "store.json";

struct App {
    api: Arc<dyn ComicSource>,
    store: Arc<MemoryDocumentStore>,
    storage: LocalStorage,
    config: AppConfig,
    session: Session,
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let file_config = match AppConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config.display(), e);
            eprintln!("💡 Make sure the file is valid TOML");
            std::process::exit(1);
        }
    };
    let config = cli.apply_overrides(file_config);

    // 初始化日誌
    if config.logging.json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("Resolved config: {:?}", config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli, config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(cli: CliConfig, config: AppConfig) -> mangahub::Result<()> {
    let storage = LocalStorage::new(config.data_dir());
    let api: Arc<dyn ComicSource> = Arc::new(OTruyenClient::from_config(&config)?);

    // 會寫入的執行需獨佔快照直到寫回
    let persisted = if cli.user.is_some() || cli.command.writes_store() {
        Some(MemoryDocumentStore::open_exclusive(&storage, STORE_SNAPSHOT).await?)
    } else {
        None
    };
    let store = match &persisted {
        Some(persisted) => persisted.store(),
        None => Arc::new(MemoryDocumentStore::load_from(&storage, STORE_SNAPSHOT).await?),
    };

    let session = match cli.auth_user() {
        Some(user) => UserService::new(store.clone()).sign_in(user).await,
        None => Session::anonymous(),
    };

    let app = App {
        api,
        store,
        storage,
        config,
        session,
        json: cli.json,
    };
    app.execute(cli.command).await?;

    if let Some(persisted) = persisted {
        persisted.save(&app.storage).await?;
    }
    Ok(())
}

impl App {
    fn views(&self) -> ViewService {
        ViewService::new(self.api.clone(), self.store.clone())
    }

    fn ratings(&self) -> RatingService {
        RatingService::new(self.store.clone()).with_max_attempts(self.config.max_commit_attempts())
    }

    fn history(&self) -> ReadingHistory<LocalStorage> {
        ReadingHistory::new(self.storage.clone()).with_max_items(self.config.history_limit())
    }

    fn print<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> mangahub::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }

    async fn execute(&self, command: Command) -> mangahub::Result<()> {
        match command {
            Command::Home => {
                let home = self.views().home().await?;
                self.print(&home, |home| {
                    if let Some(featured) = &home.featured {
                        println!("⭐ {} ({})", featured.name, featured.slug);
                    }
                    println!("\nBảng xếp hạng:");
                    for (rank, card) in home.ranking.iter().enumerate() {
                        println!("  {}. {} ({})", rank + 1, card.name, card.slug);
                    }
                    println!("\nĐề cử:");
                    home.recommended.iter().for_each(print_card);
                    println!("\nMới cập nhật:");
                    home.latest.iter().for_each(print_card);
                    println!("\n{} truyện, {} thể loại", home.total_comics, home.genres.len());
                })
            }
            Command::Comic {
                slug,
                filter,
                oldest_first,
            } => {
                let mut detail = self.views().detail(&slug, &self.session).await?;
                let order = if oldest_first {
                    SortOrder::default().toggled()
                } else {
                    SortOrder::default()
                };
                let shown = chapters::filter(&detail.chapters, filter.as_deref().unwrap_or(""))
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>();
                detail.chapters = chapters::sorted(&shown, order);
                self.print(&detail, |d| {
                    println!("{} [{}]", d.comic.comic.name, d.status);
                    if !d.comic.author.is_empty() {
                        println!("Tác giả: {}", d.comic.author.join(", "));
                    }
                    match &d.rating {
                        Some(r) => println!("⭐ {:.1} ({} đánh giá)", r.average_rating, r.total_ratings),
                        None => println!("⭐ Chưa có đánh giá"),
                    }
                    if let Some(mine) = &d.user_rating {
                        println!("Bạn đã chấm {} sao", mine.rating);
                    }
                    if d.bookmarked {
                        println!("🔖 Đang theo dõi");
                    }
                    println!("\n{} chương:", d.chapters.len());
                    for chapter in &d.chapters {
                        println!("  Chapter {} {}", chapter.chapter_name, chapter.chapter_title);
                    }
                    println!("\n{} bình luận", d.comments.len());
                    d.comments.iter().for_each(print_comment);
                })
            }
            Command::Genres => {
                let genres = self.views().genres().await;
                self.print(&genres, |genres| {
                    for genre in genres {
                        println!("{:<24} {}", genre.slug, genre.name);
                    }
                })
            }
            Command::Genre { slug, page } => {
                let list = self.views().genre(&slug, page).await?;
                self.print(&list, print_list)
            }
            Command::List { list_type, page } => {
                let list = self.views().list(&list_type, page).await?;
                self.print(&list, print_list)
            }
            Command::Search { keyword, page } => {
                let list = self.views().search(&keyword, page).await;
                self.print(&list, print_list)
            }
            Command::Read { slug, chapter } => {
                let reader = self.views().reader(&slug, &chapter, &self.history()).await?;
                self.print(&reader, |r| {
                    println!("{} - Chapter {} {}", r.comic_name, r.chapter_name, r.chapter_title);
                    for image in &r.images {
                        println!("{}", image);
                    }
                    if let Some(prev) = &r.prev {
                        println!("◀ Chapter {}", prev.chapter_name);
                    }
                    if let Some(next) = &r.next {
                        println!("▶ Chapter {}", next.chapter_name);
                    }
                })
            }
            Command::Rate { slug, score } => {
                let user = self.session.require_user()?;
                let name = match self.api.comic(&slug).await {
                    Ok(response) => response.data.item.comic.name,
                    Err(e) => {
                        tracing::warn!("Could not fetch comic name for {}: {}", slug, e);
                        slug.clone()
                    }
                };
                let summary = self.ratings().try_submit(&slug, &name, user, score).await?;
                self.print(&summary, |s| {
                    println!("✅ Đã chấm {} sao cho {}", score, slug);
                    println!("⭐ {:.1} ({} đánh giá)", s.average_rating, s.total_ratings);
                })
            }
            Command::Unrate { slug } => {
                let user = self.session.require_user()?;
                let summary = self.ratings().try_remove(&slug, &user.uid).await?;
                self.print(&summary, |s| {
                    println!("✅ Đã xóa đánh giá cho {}", slug);
                    if let Some(s) = s {
                        println!("⭐ {:.1} ({} đánh giá)", s.average_rating, s.total_ratings);
                    }
                })
            }
            Command::Bookmark(action) => self.bookmark(action).await,
            Command::Comment(action) => self.comment(action).await,
            Command::History(action) => self.reading_history(action).await,
            Command::Admin(action) => self.admin(action).await,
            Command::Submit { content } => {
                let id = SubmissionService::new(self.store.clone()).submit(&content).await?;
                println!("✓ Đã lưu thành công! ({})", id);
                Ok(())
            }
        }
    }

    async fn bookmark(&self, action: BookmarkCommand) -> mangahub::Result<()> {
        let user = self.session.require_user()?;
        let bookmarks = BookmarkService::new(self.store.clone());
        match action {
            BookmarkCommand::Add { slug } => {
                let comic = self.views().detail(&slug, &self.session).await?.comic_ref();
                bookmarks.add(user, &comic).await?;
                println!("🔖 Đã theo dõi {}", comic.name);
            }
            BookmarkCommand::Remove { slug } => {
                bookmarks.remove(user, &slug).await?;
                println!("Đã bỏ theo dõi {}", slug);
            }
            BookmarkCommand::List => {
                let list = bookmarks.list(user).await?;
                self.print(&list, |list| {
                    for b in list {
                        let latest = b.latest_chapter.as_deref().unwrap_or("-");
                        println!("{:<40} {} (chapter {})", b.slug, b.name, latest);
                    }
                })?;
            }
        }
        Ok(())
    }

    async fn comment(&self, action: CommentCommand) -> mangahub::Result<()> {
        let comments = CommentService::new(self.store.clone());
        match action {
            CommentCommand::Add {
                slug,
                content,
                chapter,
                reply_to,
            } => {
                let user = self.session.require_user()?;
                let mut input = CommentInput::by(user, &slug, chapter.as_deref(), &content);
                if let Some(parent) = reply_to {
                    input = input.reply_to(&parent);
                }
                let id = comments.add(input).await?;
                println!("💬 {}", id);
            }
            CommentCommand::List { slug, chapter, all } => {
                let list = match (chapter, all) {
                    (Some(chapter), _) => comments.chapter_comments(&slug, &chapter).await?,
                    (None, true) => comments.all_comic_comments(&slug).await?,
                    (None, false) => comments.comic_comments(&slug).await?,
                };
                self.print(&list, |list| list.iter().for_each(print_comment))?;
            }
            CommentCommand::Delete { id } => {
                let user = self.session.require_user()?;
                comments.delete(&id, user).await?;
                println!("🗑️ Đã xóa bình luận {}", id);
            }
            CommentCommand::Mine => {
                let user = self.session.require_user()?;
                let list = comments.user_comments(&user.uid).await?;
                self.print(&list, |list| {
                    for c in list {
                        print!("  [{}]", c.comic_slug);
                        print_comment(c);
                    }
                })?;
            }
        }
        Ok(())
    }

    async fn reading_history(&self, action: HistoryCommand) -> mangahub::Result<()> {
        let history = self.history();
        match action {
            HistoryCommand::List => {
                let items = history.list().await;
                self.print(&items, |items| {
                    for item in items {
                        println!("{} - Chapter {}", item.comic_name, item.chapter_name);
                    }
                })
            }
            HistoryCommand::Clear => {
                history.clear().await?;
                println!("Đã xóa lịch sử đọc");
                Ok(())
            }
        }
    }

    async fn admin(&self, action: AdminCommand) -> mangahub::Result<()> {
        let admin = AdminService::authorize(self.store.clone(), &self.session).await?;
        match action {
            AdminCommand::Stats => {
                let stats = admin.site_stats(self.api.as_ref()).await?;
                self.print(&stats, |s| {
                    println!("Truyện:     {}", s.total_comics);
                    println!("Đánh giá:   {}", s.total_ratings);
                    println!("Bình luận:  {}", s.total_comments);
                    println!("Theo dõi:   {}", s.total_bookmarks);
                    println!("Người dùng: {} ({} admin)", s.total_users, s.total_admins);
                })
            }
            AdminCommand::Ratings { limit } => {
                let ratings = admin.ratings().all_ratings(limit).await?;
                self.print(&ratings, |ratings| {
                    for r in ratings {
                        println!("{} {} {}★ {}", r.comic_slug, r.user_name, r.rating, r.updated_at);
                    }
                })
            }
            AdminCommand::Comments { limit } => {
                let list = admin.all_comments(limit).await?;
                self.print(&list, |list| list.iter().for_each(print_comment))
            }
            AdminCommand::Submissions { limit } => {
                let list = SubmissionService::new(self.store.clone()).recent(limit).await?;
                self.print(&list, |list| {
                    for s in list {
                        println!("  {} {}: {}", s.id, s.created_at.to_rfc3339(), s.content);
                    }
                })
            }
            AdminCommand::DeleteComment { id } => {
                admin.delete_comment(&id).await?;
                println!("🗑️ Đã xóa bình luận {}", id);
                Ok(())
            }
            AdminCommand::Export { output, limit } => {
                let rows = match &output {
                    Some(path) => admin.export_ratings_csv(std::fs::File::create(path)?, limit).await?,
                    None => admin.export_ratings_csv(std::io::stdout(), limit).await?,
                };
                tracing::info!("📁 Exported {} ratings", rows);
                Ok(())
            }
        }
    }
}

fn print_card(card: &ComicCard) {
    let latest = card.latest_chapter.as_deref().unwrap_or("-");
    println!("  {:<40} {} (chapter {})", card.slug, card.name, latest);
}

fn print_list(list: &ListView) {
    println!("{} - trang {}/{} ({} truyện)", list.title, list.current_page, list.total_pages, list.total_items);
    list.items.iter().for_each(print_card);
}

fn print_comment(comment: &Comment) {
    let chapter = comment
        .chapter_name
        .as_deref()
        .map(|c| format!(" [chapter {}]", c))
        .unwrap_or_default();
    println!("  {} {}{}: {}", comment.id, comment.user_name, chapter, comment.content);
}
