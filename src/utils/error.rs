use thiserror::Error;

#[derive(Error, Debug)]
pub enum MangaError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned status {status} for {url}")]
    ApiStatusError { status: u16, url: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid rating {score}: must be between 1 and 5")]
    InvalidRating { score: i64 },

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Sign-in required")]
    Unauthenticated,

    #[error("Permission denied: {reason}")]
    Forbidden { reason: String },

    #[error("Write conflict on {path}")]
    Conflict { path: String },

    #[error("Document store error: {message}")]
    StoreError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    NotFound,
    Storage,
    Configuration,
    Input,
    Access,
    Concurrency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MangaError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::ApiStatusError { .. } => ErrorCategory::Network,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::CsvError(_) | Self::IoError(_) | Self::SerializationError(_) | Self::StoreError { .. } => {
                ErrorCategory::Storage
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::InvalidRating { .. } | Self::InvalidInput { .. } => ErrorCategory::Input,
            Self::Unauthenticated | Self::Forbidden { .. } => ErrorCategory::Access,
            Self::Conflict { .. } => ErrorCategory::Concurrency,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::NotFound | ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Concurrency | ErrorCategory::Access => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Storage => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 出錯時可重試的錯誤
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Concurrency
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check your network connection and the comics API base URL, then try again",
            ErrorCategory::NotFound => "Check the comic slug or chapter name",
            ErrorCategory::Storage => "Check that the data directory exists and is writable",
            ErrorCategory::Configuration => "Fix the configuration file or command line flags",
            ErrorCategory::Input => "Check the values you entered",
            ErrorCategory::Access => "Sign in with an account that has the required role",
            ErrorCategory::Concurrency => "Another update happened at the same time, please retry",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(_) | Self::ApiStatusError { .. } => {
                "Could not reach the comics service".to_string()
            }
            Self::NotFound { what } => format!("{} could not be found", what),
            Self::InvalidRating { .. } => "Ratings must be between 1 and 5 stars".to_string(),
            Self::InvalidInput { field, reason } => format!("{}: {}", field, reason),
            Self::Unauthenticated => "Please sign in first".to_string(),
            Self::Forbidden { reason } => format!("You are not allowed to do that ({})", reason),
            Self::Conflict { .. } => "Something went wrong, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for MangaError {
    fn from(e: toml::de::Error) -> Self {
        Self::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, MangaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_category() {
        assert_eq!(MangaError::not_found("comic").severity(), ErrorSeverity::Low);
        assert_eq!(
            MangaError::Conflict {
                path: "comic_ratings/x".to_string()
            }
            .severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(
            MangaError::ConfigError {
                message: "bad".to_string()
            }
            .severity(),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_conflict_is_retryable() {
        assert!(MangaError::Conflict {
            path: "ratings/a_b".to_string()
        }
        .is_retryable());
        assert!(!MangaError::Unauthenticated.is_retryable());
    }

    #[test]
    fn test_user_friendly_not_found() {
        let e = MangaError::not_found("Comic 'one-piece'");
        assert_eq!(e.user_friendly_message(), "Comic 'one-piece' could not be found");
    }
}
