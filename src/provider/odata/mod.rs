//! Single-backend OData-flavored search provider
//!
//! Translates the common query model into the backend's query options,
//! executes requests with a one-shot credential-refresh retry, and parses
//! responses in a fixed order: attribute metadata first (parsing depends on
//! type information), then items, facets and NLQ metadata.

mod client;
mod response;
mod serializer;

pub use client::{HttpTransport, Transport};

use crate::config::{HttpConfig, ProviderEndpointConfig};
use crate::datasource::{AttributeDataType, Catalog, DataSourceId};
use crate::error::{Result, SearchError};
use crate::provider::{Capabilities, Provider};
use crate::query::{ChartQuery, SearchQuery, SuggestionQuery};
use crate::result::{
    FacetResultSet, NavigationTarget, SearchResultItem, SearchResultSet, Suggestion,
    SuggestionResultSet,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Provider for one OData-flavored search backend
pub struct OdataProvider {
    id: String,
    transport: Arc<dyn Transport>,
    catalog: Catalog,
    capabilities: Capabilities,
}

impl OdataProvider {
    /// Initialize against an endpoint from configuration
    pub async fn init_http(endpoint: &ProviderEndpointConfig, http: &HttpConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(endpoint.base_url.clone(), http)?);
        Self::init_async(endpoint.id.clone(), transport).await
    }

    /// Initialize with an explicit transport. Loads the server descriptor
    /// first; an inactive search service short-circuits initialization and
    /// no catalog is fetched.
    pub async fn init_async(id: String, transport: Arc<dyn Transport>) -> Result<Self> {
        let info: response::ServerInfoResponse =
            response::decode(get_with_auth_retry(transport.as_ref(), "ServerInfo").await?)?;

        if !info.search_active {
            return Err(SearchError::ServiceNotActive(
                info.reason
                    .unwrap_or_else(|| "search service disabled on backend".to_string()),
            ));
        }

        let capabilities = Capabilities {
            fuzzy: info.fuzzy,
            nlq: info.nlq,
        };

        let catalog_doc: response::CatalogResponse =
            response::decode(get_with_auth_retry(transport.as_ref(), "DataSources").await?)?;

        let catalog = Catalog::new();
        for wire in catalog_doc.data_sources {
            catalog.register(response::to_data_source(wire));
        }

        info!(
            provider_id = %id,
            data_sources = catalog.len(),
            fuzzy = capabilities.fuzzy,
            "OData provider initialized"
        );

        Ok(Self {
            id,
            transport,
            catalog,
            capabilities,
        })
    }

    fn data_type_lookup<'a>(
        &'a self,
        data_source: &'a DataSourceId,
    ) -> impl Fn(&str) -> Option<AttributeDataType> + 'a {
        move |attribute: &str| {
            self.catalog
                .attribute(data_source, attribute)
                .map(|m| m.data_type)
        }
    }

    /// Cross-object navigation targets: every item gets at least the
    /// canonical object page link
    fn generate_navigation_targets(&self, items: &mut [SearchResultItem]) {
        for item in items.iter_mut() {
            if item.navigation_targets.is_empty() {
                item.navigation_targets.push(NavigationTarget {
                    label: item.title.clone(),
                    target_url: format!("objects/{}/{}", item.data_source, item.key),
                });
            }
        }
    }
}

/// Issue one GET with a hard retry budget of 1: an authorization expiry
/// triggers a session refresh and exactly one resubmission; a second
/// failure propagates.
async fn get_with_auth_retry(transport: &dyn Transport, path_and_query: &str) -> Result<Value> {
    match transport.get_json(path_and_query).await {
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "Authorization expired, refreshing session and retrying once");
            transport.refresh_session().await?;
            transport.get_json(path_and_query).await
        }
        other => other,
    }
}

#[async_trait]
impl Provider for OdataProvider {
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
        let started = Instant::now();
        let data_source = query.filter.data_source.clone();
        let scope = self
            .catalog
            .get(&data_source)
            .ok_or_else(|| SearchError::UnknownDataSource(data_source.0.clone()))?;

        let lookup = self.data_type_lookup(&data_source);
        let path = format!(
            "Search?{}",
            serializer::search_query_options(query, &scope, &lookup)
        );

        let body = get_with_auth_retry(self.transport.as_ref(), &path).await?;
        let wire: response::SearchResponse = response::decode(body)?;

        // Metadata update must precede item and facet parsing: the catalog
        // may be incomplete until first use and parsing depends on type
        // information.
        let discovered: Vec<_> = wire
            .metadata
            .into_iter()
            .map(response::to_attribute_metadata)
            .collect();
        if !discovered.is_empty() {
            debug!(
                provider_id = %self.id,
                data_source = %data_source,
                attributes = discovered.len(),
                "Discovered attribute metadata from search response"
            );
            self.catalog.upsert_attributes(&data_source, discovered);
        }

        let mut items = response::parse_items(wire.value, &data_source, &self.catalog);
        let facets = response::parse_facets(wire.facets, &data_source, &self.catalog);
        let nlq = if query.nlq {
            response::parse_nlq(wire.nlq)
        } else {
            None
        };

        let mut result = SearchResultSet::new(query.clone());
        result.total_count = wire.count;
        result.facets = facets;
        result.nlq = nlq;
        result.execution_time_ms = started.elapsed().as_millis() as u64;

        self.generate_navigation_targets(&mut items);
        result.items = items;

        Ok(result)
    }

    async fn execute_chart_query(&self, query: &ChartQuery) -> Result<FacetResultSet> {
        let data_source = query.query.filter.data_source.clone();
        let scope = self
            .catalog
            .get(&data_source)
            .ok_or_else(|| SearchError::UnknownDataSource(data_source.0.clone()))?;

        // Value-help style: the dimension is itself still filtered, the
        // caller wants candidate values for narrowing rather than a value
        // distribution.
        let value_help = !query
            .query
            .filter
            .root_condition
            .conditions_for_attribute(&query.dimension)
            .is_empty();

        let lookup = self.data_type_lookup(&data_source);
        let mode = if value_help { "valuehelp" } else { "chartdimension" };
        let path = format!(
            "Search?{}&{}={}",
            serializer::search_query_options(&query.query, &scope, &lookup),
            mode,
            query.dimension
        );

        let body = get_with_auth_retry(self.transport.as_ref(), &path).await?;
        let wire: response::SearchResponse = response::decode(body)?;

        let discovered: Vec<_> = wire
            .metadata
            .into_iter()
            .map(response::to_attribute_metadata)
            .collect();
        if !discovered.is_empty() {
            self.catalog.upsert_attributes(&data_source, discovered);
        }

        let mut facets = response::parse_facets(wire.facets, &data_source, &self.catalog);
        if let Some(index) = facets.iter().position(|f| f.dimension == query.dimension) {
            return Ok(facets.swap_remove(index));
        }

        // Never hand back "missing": synthesize an empty facet shell with
        // the attribute's label.
        let title = self
            .catalog
            .attribute(&data_source, &query.dimension)
            .map(|m| m.label)
            .unwrap_or_else(|| query.dimension.clone());
        debug!(
            provider_id = %self.id,
            dimension = %query.dimension,
            "Backend returned no facet, synthesizing empty shell"
        );
        Ok(FacetResultSet::chart(query.dimension.clone(), title))
    }

    async fn execute_suggestion_query(
        &self,
        query: &SuggestionQuery,
    ) -> Result<SuggestionResultSet> {
        let scope = self
            .catalog
            .get(&query.filter.data_source)
            .ok_or_else(|| {
                SearchError::UnknownDataSource(query.filter.data_source.0.clone())
            })?;

        let mut options = serializer::scope_options(&scope);
        options.push(format!(
            "term={}",
            serializer::encode_component(&query.prefix)
        ));
        options.push(format!("top={}", query.top));
        let path = format!("Suggestions?{}", options.join("&"));
        let body = get_with_auth_retry(self.transport.as_ref(), &path).await?;
        let wire: response::SuggestionResponse = response::decode(body)?;

        Ok(SuggestionResultSet {
            suggestions: wire
                .suggestions
                .into_iter()
                .map(|s| Suggestion {
                    text: s.text,
                    count: s.count,
                    score: s.score,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Transport that scripts responses per call and records request
    /// paths, for retry sequencing and wire-format assertions
    struct ScriptedTransport {
        responses: Mutex<Vec<Result<Value>>>,
        requests: Mutex<Vec<String>>,
        refresh_calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
                refresh_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get_json(&self, path: &str) -> Result<Value> {
            self.requests.lock().push(path.to_string());
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Err(SearchError::Internal("no scripted response left".to_string()));
            }
            responses.remove(0)
        }

        async fn refresh_session(&self) -> Result<()> {
            *self.refresh_calls.lock() += 1;
            Ok(())
        }
    }

    fn server_info(active: bool) -> Value {
        json!({ "search_active": active, "fuzzy": true, "nlq": false })
    }

    fn catalog_doc() -> Value {
        json!({
            "data_sources": [{
                "id": "sales",
                "label": "Sales Orders",
                "ds_type": "BusinessObject",
                "attributes": [
                    { "name": "region", "label": "Region", "data_type": "String", "facet": true }
                ]
            }]
        })
    }

    #[tokio::test]
    async fn test_init_service_not_active_short_circuits() {
        // Only one response scripted: the catalog must never be requested
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
            "search_active": false,
            "reason": "ESH not enabled"
        }))]));

        let result = OdataProvider::init_async("erp".to_string(), transport).await;
        match result {
            Err(SearchError::ServiceNotActive(reason)) => assert_eq!(reason, "ESH not enabled"),
            other => panic!("expected ServiceNotActive, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_auth_retry_exactly_once() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(SearchError::AuthExpired("401".to_string())),
            Ok(server_info(true)),
            Ok(catalog_doc()),
        ]));

        let provider = OdataProvider::init_async("erp".to_string(), transport.clone())
            .await
            .unwrap();
        assert_eq!(*transport.refresh_calls.lock(), 1);
        assert!(provider.capabilities().fuzzy);
    }

    #[tokio::test]
    async fn test_auth_retry_second_failure_propagates() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(SearchError::AuthExpired("401".to_string())),
            Err(SearchError::AuthExpired("401 again".to_string())),
        ]));

        let result = OdataProvider::init_async("erp".to_string(), transport.clone()).await;
        assert!(matches!(result, Err(SearchError::AuthExpired(_))));
        assert_eq!(*transport.refresh_calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_search_parses_in_order_and_discovers_metadata() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(server_info(true)),
            Ok(catalog_doc()),
            Ok(json!({
                "value": [
                    { "key": "42", "title": "Laptop Pro", "score": 1.5, "region": "EMEA" }
                ],
                "@odata.count": 317,
                "facets": [{
                    "dimension": "price",
                    "items": [
                        { "value": 0, "high_value": 100, "count": 12, "label": "0 - 100" }
                    ]
                }],
                "metadata": [
                    { "name": "price", "label": "Price", "data_type": "Double", "facet": true }
                ]
            })),
        ]));

        let provider = OdataProvider::init_async("erp".to_string(), transport)
            .await
            .unwrap();
        let query = SearchQuery::new(Filter::new("sales").with_search_term("laptop"));
        let result = provider.execute_search_query(&query).await.unwrap();

        assert_eq!(result.total_count, 317);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].navigation_targets.len(), 1);
        assert_eq!(result.facets.len(), 1);
        assert_eq!(result.facets[0].title, "Price");

        // Metadata from the response landed in the catalog
        let price = provider.catalog().attribute(&"sales".into(), "price").unwrap();
        assert_eq!(price.data_type, AttributeDataType::Double);
    }

    #[tokio::test]
    async fn test_requests_carry_data_source_scope() {
        let two_sources = json!({
            "data_sources": [
                { "id": "sales", "label": "Sales Orders", "ds_type": "BusinessObject", "attributes": [] },
                { "id": "inventory", "label": "Inventory", "ds_type": "BusinessObject", "attributes": [] }
            ]
        });
        let empty = json!({ "value": [], "@odata.count": 0, "facets": [] });
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(server_info(true)),
            Ok(two_sources),
            Ok(empty.clone()),
            Ok(empty),
            Ok(json!({ "suggestions": [] })),
        ]));

        let provider = OdataProvider::init_async("erp".to_string(), transport.clone())
            .await
            .unwrap();

        provider
            .execute_search_query(&SearchQuery::new(
                Filter::new("sales").with_search_term("x"),
            ))
            .await
            .unwrap();
        provider
            .execute_search_query(&SearchQuery::new(
                Filter::new("inventory").with_search_term("x"),
            ))
            .await
            .unwrap();
        provider
            .execute_suggestion_query(&SuggestionQuery::new(Filter::new("sales"), "lap"))
            .await
            .unwrap();

        // Same query against different sources must not produce identical
        // requests: the scope rides along on the wire
        let requests = transport.requests.lock();
        let searches: Vec<&String> =
            requests.iter().filter(|p| p.starts_with("Search?")).collect();
        assert!(searches[0].contains("datasource=sales"));
        assert!(searches[1].contains("datasource=inventory"));
        assert_ne!(searches[0], searches[1]);
        assert!(requests
            .last()
            .unwrap()
            .starts_with("Suggestions?datasource=sales"));
    }

    #[tokio::test]
    async fn test_grouping_source_members_reach_the_wire() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(server_info(true)),
            Ok(catalog_doc()),
            Ok(json!({ "value": [], "@odata.count": 0, "facets": [] })),
        ]));

        let provider = OdataProvider::init_async("erp".to_string(), transport.clone())
            .await
            .unwrap();
        provider.catalog().register(
            crate::datasource::DataSource::new(
                "$$UserCategory$$favorites",
                "My Favorites",
                crate::datasource::DataSourceType::Category,
            )
            .with_sub_data_sources(vec!["sales".into()]),
        );

        provider
            .execute_search_query(&SearchQuery::new(Filter::new("$$UserCategory$$favorites")))
            .await
            .unwrap();

        let requests = transport.requests.lock();
        let search = requests.last().unwrap();
        assert!(search.contains("subdatasources=sales"));
    }

    #[tokio::test]
    async fn test_chart_query_synthesizes_empty_shell() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(server_info(true)),
            Ok(catalog_doc()),
            Ok(json!({ "value": [], "@odata.count": 0, "facets": [] })),
        ]));

        let provider = OdataProvider::init_async("erp".to_string(), transport)
            .await
            .unwrap();
        let query = SearchQuery::new(Filter::new("sales")).to_chart_query("region");
        let facet = provider.execute_chart_query(&query).await.unwrap();

        assert_eq!(facet.dimension, "region");
        assert_eq!(facet.title, "Region");
        assert!(facet.items.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_data_source_rejected() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(server_info(true)),
            Ok(catalog_doc()),
        ]));

        let provider = OdataProvider::init_async("erp".to_string(), transport)
            .await
            .unwrap();
        let query = SearchQuery::new(Filter::new("nonexistent"));
        let result = provider.execute_search_query(&query).await;
        assert!(matches!(result, Err(SearchError::UnknownDataSource(_))));
    }

    #[tokio::test]
    async fn test_http_transport_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let _info = server
            .mock("GET", "/ServerInfo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(server_info(true).to_string())
            .create_async()
            .await;
        let _catalog = server
            .mock("GET", "/DataSources")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(catalog_doc().to_string())
            .create_async()
            .await;

        let transport = Arc::new(
            HttpTransport::new(server.url(), &HttpConfig::default()).unwrap(),
        );
        let provider = OdataProvider::init_async("erp".to_string(), transport)
            .await
            .unwrap();
        assert_eq!(provider.catalog().len(), 1);
    }

    #[tokio::test]
    async fn test_http_transport_maps_401_to_auth_expired() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ServerInfo")
            .with_status(401)
            .create_async()
            .await;
        // Session refresh succeeds, but the resubmitted request hits the
        // same 401: the second failure must propagate.
        let _refresh = server
            .mock("GET", "/Session?action=refresh")
            .with_status(200)
            .create_async()
            .await;

        let transport = Arc::new(
            HttpTransport::new(server.url(), &HttpConfig::default()).unwrap(),
        );
        let result = OdataProvider::init_async("erp".to_string(), transport).await;
        assert!(matches!(result, Err(SearchError::AuthExpired(_))));
    }
}
