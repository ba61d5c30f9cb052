//! Common test utilities: a scriptable in-memory provider and catalog
//! builders shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use fedsearch::datasource::{
    AttributeDataType, AttributeMetadata, Catalog, DataSource, DataSourceType,
};
use fedsearch::error::Result;
use fedsearch::provider::{Capabilities, Provider};
use fedsearch::query::{ChartQuery, SearchQuery, SuggestionQuery};
use fedsearch::result::{
    FacetResultSet, SearchResultItem, SearchResultSet, SuggestionResultSet,
};
use parking_lot::Mutex;
use std::sync::Arc;

type SearchHandler = Box<dyn Fn(&SearchQuery) -> Result<SearchResultSet> + Send + Sync>;
type ChartHandler = Box<dyn Fn(&ChartQuery) -> Result<FacetResultSet> + Send + Sync>;
type SuggestionHandler = Box<dyn Fn(&SuggestionQuery) -> Result<SuggestionResultSet> + Send + Sync>;

/// In-memory provider whose behavior is supplied per test. Received
/// queries are recorded for assertions about dispatch order and query
/// rewriting.
pub struct MockProvider {
    id: String,
    catalog: Arc<Catalog>,
    capabilities: Capabilities,
    search_handler: SearchHandler,
    chart_handler: ChartHandler,
    suggestion_handler: SuggestionHandler,
    pub search_calls: Mutex<Vec<SearchQuery>>,
    pub chart_calls: Mutex<Vec<ChartQuery>>,
}

impl MockProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            catalog: Arc::new(Catalog::new()),
            capabilities: Capabilities::default(),
            search_handler: Box::new(|query| Ok(SearchResultSet::new(query.clone()))),
            chart_handler: Box::new(|chart| {
                Ok(FacetResultSet::chart(
                    chart.dimension.clone(),
                    chart.dimension.clone(),
                ))
            }),
            suggestion_handler: Box::new(|_| Ok(SuggestionResultSet::default())),
            search_calls: Mutex::new(Vec::new()),
            chart_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_data_source(self, data_source: DataSource) -> Self {
        self.catalog.register(data_source);
        self
    }

    /// Share the catalog handle, for handlers that simulate lazy metadata
    /// discovery.
    pub fn catalog_handle(&self) -> Arc<Catalog> {
        self.catalog.clone()
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn on_search(
        mut self,
        handler: impl Fn(&SearchQuery) -> Result<SearchResultSet> + Send + Sync + 'static,
    ) -> Self {
        self.search_handler = Box::new(handler);
        self
    }

    pub fn on_chart(
        mut self,
        handler: impl Fn(&ChartQuery) -> Result<FacetResultSet> + Send + Sync + 'static,
    ) -> Self {
        self.chart_handler = Box::new(handler);
        self
    }

    pub fn on_suggestions(
        mut self,
        handler: impl Fn(&SuggestionQuery) -> Result<SuggestionResultSet> + Send + Sync + 'static,
    ) -> Self {
        self.suggestion_handler = Box::new(handler);
        self
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn execute_search_query(&self, query: &SearchQuery) -> Result<SearchResultSet> {
        self.search_calls.lock().push(query.clone());
        (self.search_handler)(query)
    }

    async fn execute_chart_query(&self, query: &ChartQuery) -> Result<FacetResultSet> {
        self.chart_calls.lock().push(query.clone());
        (self.chart_handler)(query)
    }

    async fn execute_suggestion_query(
        &self,
        query: &SuggestionQuery,
    ) -> Result<SuggestionResultSet> {
        (self.suggestion_handler)(query)
    }
}

/// A business-object source with a discrete and a continuous facet
/// attribute
pub fn sales_data_source() -> DataSource {
    DataSource::new("sales", "Sales Orders", DataSourceType::BusinessObject)
        .with_attribute(
            AttributeMetadata::new("region", "Region", AttributeDataType::String)
                .with_facet_usage(),
        )
        .with_attribute(
            AttributeMetadata::new("price", "Price", AttributeDataType::Double)
                .with_facet_usage(),
        )
}

/// A folder-navigable source
pub fn documents_data_source() -> DataSource {
    DataSource::new("docs", "Documents", DataSourceType::BusinessObject)
        .with_folder_attribute("folder")
        .with_attribute(AttributeMetadata::new(
            "folder",
            "Folder",
            AttributeDataType::String,
        ))
}

pub fn result_item(key: &str, data_source: &str) -> SearchResultItem {
    SearchResultItem::new(key, data_source, key)
}
