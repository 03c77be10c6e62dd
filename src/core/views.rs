//! Page view models composed from the comics API and the community services.

use crate::adapters::image_url;
use crate::core::bookmarks::BookmarkService;
use crate::core::chapters::{self, Neighbours, SortOrder};
use crate::core::comments::CommentService;
use crate::core::history::{HistoryEntry, ReadingHistory};
use crate::core::ratings::RatingService;
use crate::core::users::Session;
use crate::domain::model::{
    Category, ChapterItem, Comic, ComicDetail, ComicRef, Comment, ListData, Rating, RatingSummary,
};
use crate::domain::ports::{ComicSource, DocumentStore, Storage};
use crate::utils::error::{MangaError, Result};
use serde::Serialize;
use std::sync::Arc;

const RECOMMENDED_RANGE: std::ops::Range<usize> = 1..9;
const LATEST_COUNT: usize = 16;
const RANKING_COUNT: usize = 5;

/// Display title for the fixed list types.
pub fn list_title(list_type: &str) -> Option<&'static str> {
    match list_type {
        "truyen-moi" => Some("Truyện Mới Cập Nhật"),
        "dang-phat-hanh" => Some("Truyện Đang Phát Hành"),
        "hoan-thanh" => Some("Truyện Hoàn Thành"),
        "sap-ra-mat" => Some("Sắp Ra Mắt"),
        _ => None,
    }
}

/// Display label for a comic's publication status.
pub fn status_label(status: &str) -> &str {
    match status {
        "ongoing" => "Đang cập nhật",
        "completed" => "Hoàn thành",
        "coming_soon" => "Sắp ra mắt",
        "" => "Không rõ",
        other => other,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComicCard {
    pub slug: String,
    pub name: String,
    pub thumb_url: String,
    pub status: String,
    pub latest_chapter: Option<String>,
    pub genres: Vec<String>,
}

impl ComicCard {
    fn from_comic(comic: &Comic, cdn: &str) -> Self {
        Self {
            slug: comic.slug.clone(),
            name: comic.name.clone(),
            thumb_url: image_url(cdn, &comic.thumb_url),
            status: status_label(&comic.status).to_string(),
            latest_chapter: comic.latest_chapter().map(str::to_string),
            genres: comic.category.iter().map(|c| c.name.clone()).collect(),
        }
    }

    fn many(comics: &[Comic], cdn: &str) -> Vec<Self> {
        comics.iter().map(|c| Self::from_comic(c, cdn)).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeView {
    pub featured: Option<ComicCard>,
    pub recommended: Vec<ComicCard>,
    pub latest: Vec<ComicCard>,
    /// Top of the home feed, rank 1 first.
    pub ranking: Vec<ComicCard>,
    pub genres: Vec<Category>,
    pub total_comics: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    pub list_type: String,
    pub title: String,
    pub items: Vec<ComicCard>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_items: u64,
}

impl ListView {
    fn build(list_type: &str, title: String, page: u32, data: &ListData) -> Self {
        let (total_items, total_pages) = match data.pagination() {
            Some(p) => (p.total_items, chapters::total_pages(p.total_items, p.total_items_per_page)),
            None => (data.items.len() as u64, 1),
        };
        Self {
            list_type: list_type.to_string(),
            title,
            items: ComicCard::many(&data.items, &data.cdn_image_domain),
            current_page: page.max(1),
            total_pages,
            total_items,
        }
    }

    fn empty(list_type: &str, title: String) -> Self {
        Self {
            list_type: list_type.to_string(),
            title,
            items: Vec::new(),
            current_page: 1,
            total_pages: 1,
            total_items: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailView {
    pub comic: ComicDetail,
    pub thumb_url: String,
    pub status: String,
    /// Deduplicated, newest first.
    pub chapters: Vec<ChapterItem>,
    pub first_chapter: Option<ChapterItem>,
    pub newest_chapter: Option<ChapterItem>,
    pub rating: Option<RatingSummary>,
    pub user_rating: Option<Rating>,
    pub comments: Vec<Comment>,
    pub bookmarked: bool,
}

impl DetailView {
    pub fn comic_ref(&self) -> ComicRef {
        ComicRef {
            slug: self.comic.comic.slug.clone(),
            name: self.comic.comic.name.clone(),
            thumb_url: self.thumb_url.clone(),
            latest_chapter: self.newest_chapter.as_ref().map(|c| c.chapter_name.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderView {
    pub comic_slug: String,
    pub comic_name: String,
    pub thumb_url: String,
    pub chapter_name: String,
    pub chapter_title: String,
    /// Absolute image URLs in page order.
    pub images: Vec<String>,
    pub prev: Option<ChapterItem>,
    pub next: Option<ChapterItem>,
    pub chapters: Vec<ChapterItem>,
}

pub struct ViewService {
    api: Arc<dyn ComicSource>,
    ratings: RatingService,
    comments: CommentService,
    bookmarks: BookmarkService,
}

impl ViewService {
    pub fn new(api: Arc<dyn ComicSource>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            api,
            ratings: RatingService::new(store.clone()),
            comments: CommentService::new(store.clone()),
            bookmarks: BookmarkService::new(store),
        }
    }

    pub async fn home(&self) -> Result<HomeView> {
        let (home, genres) = tokio::join!(self.api.home(), self.genres());
        let data = home?.data;
        let cdn = &data.cdn_image_domain;

        let featured = data.items.first().map(|c| ComicCard::from_comic(c, cdn));
        let recommended = data
            .items
            .get(RECOMMENDED_RANGE.start..RECOMMENDED_RANGE.end.min(data.items.len()))
            .map(|slice| ComicCard::many(slice, cdn))
            .unwrap_or_default();
        let latest = ComicCard::many(&data.items[..LATEST_COUNT.min(data.items.len())], cdn);
        let ranking = ComicCard::many(&data.items[..RANKING_COUNT.min(data.items.len())], cdn);

        Ok(HomeView {
            featured,
            recommended,
            latest,
            ranking,
            genres,
            total_comics: data.pagination().map(|p| p.total_items).unwrap_or(0),
        })
    }

    /// Genre index. An unreachable API yields no genres.
    pub async fn genres(&self) -> Vec<Category> {
        match self.api.genres().await {
            Ok(response) => response.data.items,
            Err(e) => {
                tracing::warn!("Failed to fetch genres: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn list(&self, list_type: &str, page: u32) -> Result<ListView> {
        let data = self
            .api
            .comics_list(list_type, page)
            .await
            .map_err(|e| not_found(format!("List '{}'", list_type), e))?
            .data;
        let title = list_title(list_type)
            .map(str::to_string)
            .or_else(|| Some(data.title_page.clone()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| list_type.to_string());
        Ok(ListView::build(list_type, title, page, &data))
    }

    pub async fn genre(&self, slug: &str, page: u32) -> Result<ListView> {
        let data = self
            .api
            .comics_by_genre(slug, page)
            .await
            .map_err(|e| not_found(format!("Genre '{}'", slug), e))?
            .data;
        let title = if data.title_page.is_empty() {
            slug.to_string()
        } else {
            data.title_page.clone()
        };
        Ok(ListView::build(slug, title, page, &data))
    }

    /// Search results. A blank keyword or a failed request shows no results.
    pub async fn search(&self, keyword: &str, page: u32) -> ListView {
        let keyword = keyword.trim();
        let title = format!("Kết quả tìm kiếm: {}", keyword);
        if keyword.is_empty() {
            return ListView::empty("tim-kiem", title);
        }
        match self.api.search(keyword, page).await {
            Ok(response) => ListView::build("tim-kiem", title, page, &response.data),
            Err(e) => {
                tracing::warn!("Search for '{}' failed: {}", keyword, e);
                ListView::empty("tim-kiem", title)
            }
        }
    }

    /// Comic page. Community data that fails to load is logged and left
    /// empty; only the comic itself is required.
    pub async fn detail(&self, slug: &str, session: &Session) -> Result<DetailView> {
        let data = self
            .api
            .comic(slug)
            .await
            .map_err(|e| not_found(format!("Comic '{}'", slug), e))?
            .data;
        let detail = data.item;

        let deduped = chapters::dedupe(detail.primary_chapters());
        let first_chapter = chapters::sorted(&deduped, SortOrder::Ascending).into_iter().next();
        let newest_chapter = chapters::newest(&deduped).cloned();

        let rating = self.ratings.summary(slug).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to load rating summary for {}: {}", slug, e);
            None
        });
        let comments = self.comments.comic_comments(slug).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to load comments for {}: {}", slug, e);
            Vec::new()
        });
        let (user_rating, bookmarked) = match session.user() {
            Some(user) => (
                self.ratings.user_rating(slug, &user.uid).await.unwrap_or_else(|e| {
                    tracing::warn!("Failed to load {}'s rating for {}: {}", user.uid, slug, e);
                    None
                }),
                self.bookmarks.is_bookmarked(user, slug).await.unwrap_or_else(|e| {
                    tracing::warn!("Failed to load bookmark state for {}: {}", slug, e);
                    false
                }),
            ),
            None => (None, false),
        };

        Ok(DetailView {
            thumb_url: image_url(&data.cdn_image_domain, &detail.comic.thumb_url),
            status: status_label(&detail.comic.status).to_string(),
            chapters: chapters::sorted(&deduped, SortOrder::Descending),
            first_chapter,
            newest_chapter,
            rating,
            user_rating,
            comments,
            bookmarked,
            comic: detail,
        })
    }

    /// Reader page for one chapter. Opening it records the chapter in the
    /// reading history.
    pub async fn reader<S: Storage>(
        &self,
        slug: &str,
        chapter_name: &str,
        history: &ReadingHistory<S>,
    ) -> Result<ReaderView> {
        let data = self
            .api
            .comic(slug)
            .await
            .map_err(|e| not_found(format!("Comic '{}'", slug), e))?
            .data;
        let comic = &data.item.comic;
        let all_chapters = data.item.primary_chapters();

        let current = all_chapters
            .iter()
            .find(|c| c.chapter_name == chapter_name)
            .ok_or_else(|| MangaError::not_found(format!("Chapter '{}' of '{}'", chapter_name, slug)))?;

        let images = match self.api.chapter(&current.chapter_api_data).await {
            Ok(response) => {
                let base = response.data.image_base_url();
                let mut pages = response.data.item.chapter_image;
                pages.sort_by_key(|p| p.image_page);
                pages
                    .into_iter()
                    .map(|p| format!("{}/{}", base, p.image_file))
                    .collect()
            }
            Err(e) => {
                tracing::error!("Failed to fetch chapter data for {} {}: {}", slug, chapter_name, e);
                Vec::new()
            }
        };

        let deduped = chapters::dedupe(all_chapters);
        let Neighbours { prev, next } = chapters::neighbours(&deduped, chapter_name);
        let thumb_url = image_url(&data.cdn_image_domain, &comic.thumb_url);

        let entry = HistoryEntry {
            comic_slug: comic.slug.clone(),
            comic_name: comic.name.clone(),
            thumb_url: thumb_url.clone(),
            chapter_name: current.chapter_name.clone(),
            chapter_title: Some(current.chapter_title.clone()),
        };
        if let Err(e) = history.add(entry).await {
            tracing::warn!("Failed to record reading history: {}", e);
        }

        Ok(ReaderView {
            comic_slug: comic.slug.clone(),
            comic_name: comic.name.clone(),
            thumb_url,
            chapter_name: current.chapter_name.clone(),
            chapter_title: current.chapter_title.clone(),
            images,
            prev,
            next,
            chapters: deduped,
        })
    }
}

fn not_found(what: String, cause: MangaError) -> MangaError {
    tracing::error!("Failed to fetch {}: {}", what, cause);
    MangaError::NotFound { what }
}
