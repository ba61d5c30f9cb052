//! Error types for federated search operations

use thiserror::Error;

/// Result type for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while executing federated search operations
#[derive(Debug, Error)]
pub enum SearchError {
    /// The backend search service is disabled; fatal to provider initialization
    #[error("Search service not active: {0}")]
    ServiceNotActive(String),

    /// Security token or session expired; eligible for exactly one refresh-and-retry
    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    /// Every child provider of a federation failed to initialize
    #[error("No usable providers: all child providers failed to initialize")]
    NoUsableProviders,

    /// Operation is intentionally unimplemented
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Data source id is not registered in the catalog
    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),

    /// Attribute metadata lookup failed
    #[error("Unknown attribute '{attribute}' on data source '{data_source}'")]
    UnknownAttribute {
        data_source: String,
        attribute: String,
    },

    /// Network / transport errors
    #[error("Network error: {0}")]
    Network(String),

    /// Backend response could not be parsed into the common result model
    #[error("Response parsing failed: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Whether a single refresh-and-retry cycle may resolve this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::AuthExpired(_))
    }
}

/// Conversion from reqwest::Error
impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SearchError::Parse(err.to_string())
        } else {
            SearchError::Network(err.to_string())
        }
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        SearchError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SearchError::AuthExpired("token".to_string()).is_retryable());
        assert!(!SearchError::ServiceNotActive("off".to_string()).is_retryable());
        assert!(!SearchError::Network("down".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SearchError::UnknownAttribute {
            data_source: "sales".to_string(),
            attribute: "region".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown attribute 'region' on data source 'sales'"
        );
    }
}
