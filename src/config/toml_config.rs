use crate::adapters::DEFAULT_API_BASE;
use crate::core::history::DEFAULT_MAX_HISTORY_ITEMS;
use crate::core::ratings::DEFAULT_MAX_COMMIT_ATTEMPTS;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "mangahub.toml";
pub const DEFAULT_DATA_DIR: &str = "./.mangahub";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Settings loaded from `mangahub.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub ratings: RatingsConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Holds the document store snapshot and the reading history.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingsConfig {
    pub max_commit_attempts: usize,
}

impl Default for RatingsConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_items: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_HISTORY_ITEMS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            tracing::debug!("Loading config from {}", path.as_ref().display());
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }
}

/// Replaces `${VAR}` with the environment value. Unset variables are left
/// as written.
fn substitute_env_vars(content: &str) -> String {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api.base_url", &self.api.base_url)?;
        validate_range("api.timeout_seconds", self.api.timeout_seconds, 1, 300)?;
        validate_path("storage.data_dir", &self.storage.data_dir)?;
        validate_positive_number("ratings.max_commit_attempts", self.ratings.max_commit_attempts, 1)?;
        validate_positive_number("history.max_items", self.history.max_items, 1)?;
        Ok(())
    }
}

impl ConfigProvider for AppConfig {
    fn api_base_url(&self) -> &str {
        &self.api.base_url
    }

    fn data_dir(&self) -> &str {
        &self.storage.data_dir
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    fn max_commit_attempts(&self) -> usize {
        self.ratings.max_commit_attempts
    }

    fn history_limit(&self) -> usize {
        self.history.max_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::MangaError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_commit_attempts(), 5);
        assert_eq!(config.history_limit(), 50);
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
[api]
timeout_seconds = 5

[history]
max_items = 10
"#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_BASE);
        assert_eq!(config.api.timeout_seconds, 5);
        assert_eq!(config.history_limit(), 10);
        assert_eq!(config.data_dir(), DEFAULT_DATA_DIR);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MANGAHUB_TEST_DATA_DIR", "/tmp/mangahub-test");

        let config = AppConfig::from_toml_str(
            r#"
[storage]
data_dir = "${MANGAHUB_TEST_DATA_DIR}"
"#,
        )
        .unwrap();
        assert_eq!(config.data_dir(), "/tmp/mangahub-test");

        std::env::remove_var("MANGAHUB_TEST_DATA_DIR");
    }

    #[test]
    fn test_unset_env_var_left_as_is() {
        assert_eq!(
            substitute_env_vars("x = \"${MANGAHUB_SURELY_UNSET_VAR}\""),
            "x = \"${MANGAHUB_SURELY_UNSET_VAR}\""
        );
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::from_toml_str(
            r#"
[api]
base_url = "ftp://otruyenapi.com"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[ratings]\nmax_commit_attempts = 0").unwrap();
        assert!(matches!(
            config.validate(),
            Err(MangaError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_malformed_toml() {
        let err = AppConfig::from_toml_str("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, MangaError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[logging]\njson = true\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.data_dir(), DEFAULT_DATA_DIR);
    }
}
