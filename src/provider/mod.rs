//! Provider abstraction and the concrete provider implementations
//!
//! A provider translates the common query model into one backend's wire
//! format and parses the response back into the common result model. The
//! [`multi::MultiProvider`] federates several providers behind the same
//! interface.

pub mod multi;
pub mod odata;

pub use multi::{ChildSpec, FederationMethodKind, MultiProvider};
pub use odata::OdataProvider;

use crate::datasource::Catalog;
use crate::error::{Result, SearchError};
use crate::query::{ChartQuery, HierarchyQuery, SearchQuery, SuggestionQuery};
use crate::result::{FacetResultSet, SearchResultSet, SuggestionResultSet};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capabilities a provider declares after initialization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Fuzzy term matching
    pub fuzzy: bool,

    /// Natural-language-query interpretation
    pub nlq: bool,
}

impl Capabilities {
    /// Field-wise OR, used when aggregating federation capabilities
    pub fn merge(self, other: Capabilities) -> Capabilities {
        Capabilities {
            fuzzy: self.fuzzy || other.fuzzy,
            nlq: self.nlq || other.nlq,
        }
    }
}

/// Backend search provider. Implementations are initialized before they are
/// handed out, so every method can assume a loaded catalog.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider id, prefix of synthesized multi ids
    fn id(&self) -> &str;

    /// Data source catalog of this provider
    fn catalog(&self) -> &Catalog;

    /// Capabilities declared during initialization
    fn capabilities(&self) -> Capabilities;

    /// Execute one search query
    async fn execute_search_query(&self, query: &SearchQuery) -> Result<SearchResultSet>;

    /// Execute one facet (aggregation) query for a single dimension
    async fn execute_chart_query(&self, query: &ChartQuery) -> Result<FacetResultSet>;

    /// Execute one type-ahead suggestion query
    async fn execute_suggestion_query(&self, query: &SuggestionQuery)
        -> Result<SuggestionResultSet>;

    /// Hierarchy queries are refused by every provider in this crate
    async fn execute_hierarchy_query(&self, _query: &HierarchyQuery) -> Result<SearchResultSet> {
        Err(SearchError::NotImplemented("hierarchy query"))
    }
}
