use crate::provider::multi::FederationMethodKind;
use serde::{Deserialize, Serialize};

/// Main library configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Federation configuration
    #[serde(default)]
    pub federation: FederationConfig,

    /// Default query parameters
    #[serde(default)]
    pub search: SearchDefaults,

    /// HTTP transport configuration
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("FEDSEARCH_CONFIG").unwrap_or_else(|_| "config/fedsearch.toml".to_string());

        config::Config::builder()
            // Config file is optional; defaults cover everything
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: FEDSEARCH)
            .add_source(
                config::Environment::with_prefix("FEDSEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            federation: FederationConfig::default(),
            search: SearchDefaults::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Federation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Result interleaving strategy for multi-provider searches
    #[serde(default)]
    pub method: FederationMethodKind,

    /// Child provider endpoints
    #[serde(default)]
    pub providers: Vec<ProviderEndpointConfig>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            method: FederationMethodKind::default(),
            providers: Vec::new(),
        }
    }
}

/// One child provider endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpointConfig {
    /// Stable provider id, used as the prefix of synthesized multi ids
    pub id: String,

    /// Base URL of the backend search service
    pub base_url: String,

    /// Whether the backend can scope one request to several data sources
    #[serde(default)]
    pub supports_sub_data_sources: bool,
}

/// Default query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefaults {
    /// Default page size
    #[serde(default = "default_top")]
    pub top: usize,

    /// Default number of facet values per chart query
    #[serde(default = "default_facet_top")]
    pub facet_top: usize,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            top: default_top(),
            facet_top: default_facet_top(),
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with every backend request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_top() -> usize {
    10
}

fn default_facet_top() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("fedsearch/{}", env!("CARGO_PKG_VERSION"))
}
