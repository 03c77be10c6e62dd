use crate::utils::error::MangaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 漫畫 API 資料結構
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub status: String,
    pub data: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(alias = "_id", default)]
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChapterItem {
    #[serde(default)]
    pub filename: String,
    pub chapter_name: String,
    #[serde(default)]
    pub chapter_title: String,
    #[serde(default)]
    pub chapter_api_data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChapterServer {
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub server_data: Vec<ChapterItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comic {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub origin_name: Vec<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub thumb_url: String,
    #[serde(default)]
    pub sub_docquyen: bool,
    #[serde(default)]
    pub category: Vec<Category>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: String,
    #[serde(rename = "chaptersLatest", default)]
    pub chapters_latest: Option<Vec<ChapterItem>>,
}

impl Comic {
    /// Name of the most recent chapter advertised in list responses.
    pub fn latest_chapter(&self) -> Option<&str> {
        self.chapters_latest
            .as_ref()
            .and_then(|chapters| chapters.first())
            .map(|c| c.chapter_name.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComicDetail {
    #[serde(flatten)]
    pub comic: Comic,
    #[serde(default)]
    pub author: Vec<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterServer>,
}

impl ComicDetail {
    /// Chapters of the first server; the reader only ever uses that one.
    pub fn primary_chapters(&self) -> &[ChapterItem] {
        self.chapters
            .first()
            .map(|s| s.server_data.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub total_items: u64,
    pub total_items_per_page: u64,
    pub current_page: u64,
    pub page_ranges: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub type_slug: String,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Payload shared by the home, list, genre and search endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub items: Vec<Comic>,
    #[serde(rename = "titlePage", default)]
    pub title_page: String,
    #[serde(default)]
    pub params: Option<ListParams>,
    #[serde(rename = "APP_DOMAIN_CDN_IMAGE", default)]
    pub cdn_image_domain: String,
}

impl ListData {
    pub fn pagination(&self) -> Option<&Pagination> {
        self.params.as_ref().and_then(|p| p.pagination.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComicData {
    pub item: ComicDetail,
    #[serde(rename = "APP_DOMAIN_CDN_IMAGE", default)]
    pub cdn_image_domain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenresData {
    #[serde(default)]
    pub items: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterImage {
    pub image_page: u32,
    pub image_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChapterContent {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub comic_name: String,
    #[serde(default)]
    pub chapter_name: String,
    #[serde(default)]
    pub chapter_title: String,
    #[serde(default)]
    pub chapter_path: String,
    #[serde(default)]
    pub chapter_image: Vec<ChapterImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterData {
    #[serde(default)]
    pub domain_cdn: Option<String>,
    pub item: ChapterContent,
    #[serde(rename = "APP_DOMAIN_CDN_IMAGE", default)]
    pub cdn_image_domain: String,
}

impl ChapterData {
    /// Base URL the chapter image files are relative to, empty when the
    /// response carries neither a CDN domain nor a chapter path.
    pub fn image_base_url(&self) -> String {
        let domain = self
            .domain_cdn
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.cdn_image_domain);
        let path = &self.item.chapter_path;
        if domain.is_empty() || path.is_empty() {
            return String::new();
        }
        format!("{}/{}", domain.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// 評分
// ---------------------------------------------------------------------------

/// A single 1–5 star vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = MangaError;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(MangaError::InvalidRating { score: value })
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub comic_slug: String,
    #[serde(default)]
    pub comic_name: String,
    pub user_id: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub user_name: String,
    pub rating: Score,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Vote counts per star value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RatingDistribution {
    #[serde(rename = "1")]
    pub one: u64,
    #[serde(rename = "2")]
    pub two: u64,
    #[serde(rename = "3")]
    pub three: u64,
    #[serde(rename = "4")]
    pub four: u64,
    #[serde(rename = "5")]
    pub five: u64,
}

impl RatingDistribution {
    fn bucket_mut(&mut self, score: Score) -> &mut u64 {
        match score.value() {
            1 => &mut self.one,
            2 => &mut self.two,
            3 => &mut self.three,
            4 => &mut self.four,
            _ => &mut self.five,
        }
    }

    pub fn get(&self, score: Score) -> u64 {
        match score.value() {
            1 => self.one,
            2 => self.two,
            3 => self.three,
            4 => self.four,
            _ => self.five,
        }
    }

    pub fn increment(&mut self, score: Score) {
        *self.bucket_mut(score) += 1;
    }

    pub fn decrement(&mut self, score: Score) {
        let bucket = self.bucket_mut(score);
        *bucket = bucket.saturating_sub(1);
    }

    pub fn total(&self) -> u64 {
        self.one + self.two + self.three + self.four + self.five
    }

    /// Σ(score * count)
    pub fn weighted_sum(&self) -> u64 {
        self.one + self.two * 2 + self.three * 3 + self.four * 4 + self.five * 5
    }
}

/// Round half away from zero to one decimal place.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub comic_slug: String,
    #[serde(default)]
    pub total_ratings: u64,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub rating_distribution: RatingDistribution,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl RatingSummary {
    pub fn empty(comic_slug: &str, now: DateTime<Utc>) -> Self {
        Self {
            comic_slug: comic_slug.to_string(),
            total_ratings: 0,
            average_rating: 0.0,
            rating_distribution: RatingDistribution::default(),
            last_updated: now,
        }
    }

    /// Folds a new or changed vote into the summary. A changed vote moves one
    /// count between buckets; a new vote adds to the total.
    ///
    /// A previous vote whose bucket is already empty (a summary that was
    /// lost or never written) is counted as a new vote so the total keeps
    /// matching the histogram.
    pub fn apply_vote(&mut self, previous: Option<Score>, score: Score, now: DateTime<Utc>) {
        match previous {
            Some(old) if self.rating_distribution.get(old) > 0 => {
                self.rating_distribution.decrement(old)
            }
            _ => self.total_ratings += 1,
        }
        self.rating_distribution.increment(score);
        self.recompute(now);
    }

    pub fn retract_vote(&mut self, score: Score, now: DateTime<Utc>) {
        if self.rating_distribution.get(score) > 0 {
            self.rating_distribution.decrement(score);
            self.total_ratings = self.total_ratings.saturating_sub(1);
        }
        self.recompute(now);
    }

    fn recompute(&mut self, now: DateTime<Utc>) {
        self.average_rating = if self.total_ratings > 0 {
            round_one_decimal(
                self.rating_distribution.weighted_sum() as f64 / self.total_ratings as f64,
            )
        } else {
            0.0
        };
        self.last_updated = now;
    }
}

// ---------------------------------------------------------------------------
// 使用者資料
// ---------------------------------------------------------------------------

/// Identity handed over by the external auth provider after sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
        }
    }

    /// Name shown next to comments and ratings.
    pub fn visible_name(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "Anonymous".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Stored roles are free text in the backing store; surrounding
    /// whitespace is ignored.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing)]
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComicRef {
    pub slug: String,
    pub name: String,
    pub thumb_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_chapter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub thumb_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_chapter: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    pub content: String,
    pub comic_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    pub content: String,
    pub comic_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingHistoryItem {
    pub comic_slug: String,
    pub comic_name: String,
    pub thumb_url: String,
    pub chapter_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_title: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub read_at: i64,
}

/// Free-form text sent through the public submission form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(v: i64) -> Score {
        Score::try_from(v).unwrap()
    }

    #[test]
    fn test_score_bounds() {
        assert!(Score::try_from(0).is_err());
        assert!(Score::try_from(6).is_err());
        assert_eq!(score(5).value(), 5);
    }

    #[test]
    fn test_score_rejects_out_of_range_json() {
        let parsed: std::result::Result<Score, _> = serde_json::from_str("7");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_distribution_serializes_with_numeric_keys() {
        let mut d = RatingDistribution::default();
        d.increment(score(4));
        let json = serde_json::to_value(d).unwrap();
        assert_eq!(json["4"], 1);
        assert_eq!(json["1"], 0);
    }

    #[test]
    fn test_decrement_saturates() {
        let mut d = RatingDistribution::default();
        d.decrement(score(2));
        assert_eq!(d.two, 0);
    }

    #[test]
    fn test_round_one_decimal_half_away_from_zero() {
        assert_eq!(round_one_decimal(2.25), 2.3);
        assert_eq!(round_one_decimal(8.0 / 3.0), 2.7);
        assert_eq!(round_one_decimal(4.0), 4.0);
    }

    #[test]
    fn test_summary_changed_vote_keeps_total() {
        let now = Utc::now();
        let mut s = RatingSummary::empty("slug", now);
        s.apply_vote(None, score(5), now);
        s.apply_vote(None, score(3), now);
        s.apply_vote(None, score(4), now);
        assert_eq!(s.total_ratings, 3);
        assert_eq!(s.average_rating, 4.0);

        s.apply_vote(Some(score(5)), score(1), now);
        assert_eq!(s.total_ratings, 3);
        assert_eq!(s.rating_distribution.one, 1);
        assert_eq!(s.rating_distribution.five, 0);
        assert_eq!(s.average_rating, 2.7);
    }

    #[test]
    fn test_summary_retract_last_vote_resets_average() {
        let now = Utc::now();
        let mut s = RatingSummary::empty("slug", now);
        s.apply_vote(None, score(2), now);
        s.retract_vote(score(2), now);
        assert_eq!(s.total_ratings, 0);
        assert_eq!(s.average_rating, 0.0);
        assert_eq!(s.rating_distribution.total(), 0);
    }

    #[test]
    fn test_summary_recovers_from_missing_bucket() {
        let now = Utc::now();
        let mut s = RatingSummary::empty("slug", now);
        s.apply_vote(Some(score(3)), score(5), now);
        assert_eq!(s.total_ratings, 1);
        assert_eq!(s.rating_distribution.total(), 1);
    }

    #[test]
    fn test_role_is_trimmed() {
        assert_eq!(Role::parse(" admin "), Role::Admin);
        assert_eq!(Role::parse("Admin"), Role::User);
        assert_eq!(Role::parse(""), Role::User);
    }

    #[test]
    fn test_chapter_image_base_url_prefers_domain_cdn() {
        let data: ChapterData = serde_json::from_value(serde_json::json!({
            "domain_cdn": "https://sv1.otruyencdn.com",
            "item": {"chapter_path": "uploads/20240101/abc/chapter_1", "chapter_image": []},
            "APP_DOMAIN_CDN_IMAGE": "https://img.otruyenapi.com"
        }))
        .unwrap();
        assert_eq!(
            data.image_base_url(),
            "https://sv1.otruyencdn.com/uploads/20240101/abc/chapter_1"
        );
    }

    #[test]
    fn test_comic_detail_flattens_comic_fields() {
        let detail: ComicDetail = serde_json::from_value(serde_json::json!({
            "_id": "1",
            "name": "Đảo Hải Tặc",
            "slug": "dao-hai-tac",
            "thumb_url": "dao-hai-tac-thumb.jpg",
            "author": ["Oda"],
            "chapters": [{"server_name": "#1", "server_data": [
                {"filename": "", "chapter_name": "1", "chapter_title": "", "chapter_api_data": "https://x/1"}
            ]}]
        }))
        .unwrap();
        assert_eq!(detail.comic.slug, "dao-hai-tac");
        assert_eq!(detail.primary_chapters().len(), 1);
    }
}
