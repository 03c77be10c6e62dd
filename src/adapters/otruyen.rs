use crate::domain::model::{ApiResponse, ChapterData, ComicData, GenresData, ListData};
use crate::domain::ports::{ComicSource, ConfigProvider};
use crate::utils::error::{MangaError, Result};
use crate::utils::validation::validate_slug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://otruyenapi.com/v1/api";

/// HTTP client for the OTruyen comics API.
#[derive(Debug, Clone)]
pub struct OTruyenClient {
    client: Client,
    base_url: String,
}

impl OTruyenClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mangahub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        Self::new(config.api_base_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path);
        let url = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, params)
        };
        url.map_err(|e| MangaError::ConfigError {
            message: format!("Invalid API URL '{}': {}", raw, e),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if status == StatusCode::NOT_FOUND {
            return Err(MangaError::not_found(url.path().to_string()));
        }
        if !status.is_success() {
            return Err(MangaError::ApiStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

fn page_param(page: u32) -> (&'static str, String) {
    ("page", page.max(1).to_string())
}

#[async_trait::async_trait]
impl ComicSource for OTruyenClient {
    async fn home(&self) -> Result<ApiResponse<ListData>> {
        self.get_json(self.endpoint("home", &[])?).await
    }

    async fn comic(&self, slug: &str) -> Result<ApiResponse<ComicData>> {
        validate_slug("slug", slug)?;
        self.get_json(self.endpoint(&format!("truyen-tranh/{}", slug), &[])?)
            .await
    }

    async fn genres(&self) -> Result<ApiResponse<GenresData>> {
        self.get_json(self.endpoint("the-loai", &[])?).await
    }

    async fn comics_by_genre(&self, slug: &str, page: u32) -> Result<ApiResponse<ListData>> {
        validate_slug("genre", slug)?;
        self.get_json(self.endpoint(&format!("the-loai/{}", slug), &[page_param(page)])?)
            .await
    }

    async fn comics_list(&self, list_type: &str, page: u32) -> Result<ApiResponse<ListData>> {
        validate_slug("list_type", list_type)?;
        self.get_json(self.endpoint(&format!("danh-sach/{}", list_type), &[page_param(page)])?)
            .await
    }

    async fn search(&self, keyword: &str, page: u32) -> Result<ApiResponse<ListData>> {
        self.get_json(self.endpoint(
            "tim-kiem",
            &[("keyword", keyword.to_string()), page_param(page)],
        )?)
        .await
    }

    async fn chapter(&self, api_url: &str) -> Result<ApiResponse<ChapterData>> {
        let url = Url::parse(api_url).map_err(|e| MangaError::InvalidInput {
            field: "chapter_api_data".to_string(),
            reason: e.to_string(),
        })?;
        self.get_json(url).await
    }
}

/// Absolute thumbnail URL. Thumbnails are usually bare file names relative
/// to the CDN's comics folder.
pub fn image_url(cdn: &str, thumb: &str) -> String {
    if thumb.starts_with("http") {
        return thumb.to_string();
    }
    format!("{}/uploads/comics/{}", cdn.trim_end_matches('/'), thumb)
}
