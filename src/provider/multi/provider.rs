//! Federation of several independently-configured providers behind the
//! common [`Provider`] interface
//!
//! Initialization tolerates partial child failure (degrade, don't fail,
//! unless no child survives). Primary search fan-out does not: a failing
//! child fails the whole call. Suggestion fan-out drops failed children
//! silently. The asymmetry is intentional: a missing suggestion is a minor
//! UX degradation, a missing primary result set is an error.

use crate::config::Config;
use crate::datasource::{Catalog, DataSource, DataSourceId, DataSourceType};
use crate::error::{Result, SearchError};
use crate::provider::multi::federation::{FederationMethod, FederationMethodKind};
use crate::provider::odata::OdataProvider;
use crate::provider::{Capabilities, Provider};
use crate::query::{ChartQuery, Condition, SearchQuery, SuggestionQuery, DATA_SOURCE_ATTRIBUTE};
use crate::result::{
    FacetItem, FacetResultSet, FacetType, SearchResultSet, Suggestion, SuggestionResultSet,
};
use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Multi id of the federated "search everywhere" source
pub const ALL_DATA_SOURCE_ID: &str = "All";

/// Boxed child initialization future
pub type ProviderInit = Pin<Box<dyn Future<Output = Result<Arc<dyn Provider>>> + Send>>;

/// Declaration of one child provider to federate
pub struct ChildSpec {
    /// Whether the child backend can scope one request to several data
    /// sources (drives the favorites query splitting)
    pub supports_sub_data_sources: bool,

    /// Initialization of the child provider
    pub init: ProviderInit,
}

impl ChildSpec {
    pub fn new(init: ProviderInit) -> Self {
        Self {
            supports_sub_data_sources: false,
            init,
        }
    }

    pub fn with_sub_data_sources(mut self) -> Self {
        self.supports_sub_data_sources = true;
        self
    }
}

struct FederatedChild {
    provider: Arc<dyn Provider>,
    supports_sub_data_sources: bool,
    /// The child's native "search everywhere" source, if it declares one
    all_data_source: Option<DataSourceId>,
}

#[derive(Debug, Clone)]
struct ChildRef {
    child_index: usize,
    native_id: DataSourceId,
}

/// Children are asked for the widened window `[0, skip+top)`: federation
/// interleaves the full per-child lists and the caller's page is sliced
/// exactly once, after the merge.
fn widen_window(query: &SearchQuery) -> SearchQuery {
    let mut child_query = query.clone();
    child_query.top = query.skip + query.top;
    child_query.skip = 0;
    child_query
}

/// Provider federating N child providers into one data source catalog
pub struct MultiProvider {
    id: String,
    children: Vec<FederatedChild>,
    catalog: Catalog,
    /// Synthesized multi id -> owning child + native id. Built during
    /// initialization, extended only by idempotent lazy registration of
    /// favorites groupings.
    multi_map: RwLock<HashMap<DataSourceId, ChildRef>>,
    federation: Box<dyn FederationMethod>,
    capabilities: Capabilities,
}

impl MultiProvider {
    /// Build the federation from configuration: one OData child per
    /// configured endpoint.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut children = Vec::with_capacity(config.federation.providers.len());
        for endpoint in &config.federation.providers {
            let supports_sub = endpoint.supports_sub_data_sources;
            let endpoint = endpoint.clone();
            let http = config.http.clone();
            let init: ProviderInit = Box::pin(async move {
                let provider = OdataProvider::init_http(&endpoint, &http).await?;
                Ok(Arc::new(provider) as Arc<dyn Provider>)
            });
            let mut spec = ChildSpec::new(init);
            if supports_sub {
                spec = spec.with_sub_data_sources();
            }
            children.push(spec);
        }
        Self::init_async(children, config.federation.method).await
    }

    /// Initialize every child concurrently. Children that fail to
    /// initialize are logged and dropped; initialization itself fails only
    /// when no child survives.
    pub async fn init_async(children: Vec<ChildSpec>, method: FederationMethodKind) -> Result<Self> {
        let mut sub_flags = Vec::with_capacity(children.len());
        let mut inits = Vec::with_capacity(children.len());
        for spec in children {
            sub_flags.push(spec.supports_sub_data_sources);
            inits.push(spec.init);
        }

        // allSettled semantics: collect every outcome before deciding
        let outcomes = join_all(inits).await;

        let mut survivors = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(provider) => {
                    let all_data_source = provider
                        .catalog()
                        .list_sorted()
                        .into_iter()
                        .find(|ds| ds.ds_type == DataSourceType::All)
                        .map(|ds| ds.id);
                    if all_data_source.is_none() {
                        warn!(
                            provider_id = provider.id(),
                            "Child declares no 'all' data source, excluded from federated search"
                        );
                    }
                    survivors.push(FederatedChild {
                        provider,
                        supports_sub_data_sources: sub_flags[index],
                        all_data_source,
                    });
                }
                Err(err) => {
                    warn!(child = index, error = %err, "Child provider failed to initialize, dropping it");
                }
            }
        }

        if survivors.is_empty() {
            return Err(SearchError::NoUsableProviders);
        }

        let catalog = Catalog::new();
        catalog.register(DataSource::new(
            ALL_DATA_SOURCE_ID,
            "All",
            DataSourceType::All,
        ));

        let mut multi_map = HashMap::new();
        let mut capabilities = Capabilities::default();

        for (child_index, child) in survivors.iter().enumerate() {
            capabilities = capabilities.merge(child.provider.capabilities());

            for native in child.provider.catalog().list_sorted() {
                let multi_id = DataSourceId::multi(child.provider.id(), &native.id);
                let mut federated = native.clone();
                federated.id = multi_id.clone();
                // The federation owns the All dispatch. A child's native
                // "search everywhere" source is still addressable, but as a
                // grouping that routes to that one child.
                if federated.ds_type == DataSourceType::All {
                    federated.ds_type = DataSourceType::Category;
                }
                federated.sub_data_sources = native
                    .sub_data_sources
                    .iter()
                    .map(|sub| DataSourceId::multi(child.provider.id(), sub))
                    .collect();
                catalog.register(federated);
                multi_map.insert(
                    multi_id,
                    ChildRef {
                        child_index,
                        native_id: native.id,
                    },
                );
            }
        }

        info!(
            children = survivors.len(),
            data_sources = catalog.len(),
            fuzzy = capabilities.fuzzy,
            "Multi provider initialized"
        );

        Ok(Self {
            id: "multi".to_string(),
            children: survivors,
            catalog,
            multi_map: RwLock::new(multi_map),
            federation: method.build(),
            capabilities,
        })
    }

    /// Register a user-curated favorites source spanning federated
    /// data sources. `members` are multi ids.
    pub fn register_user_category(
        &self,
        id: impl Into<DataSourceId>,
        label: impl Into<String>,
        members: Vec<DataSourceId>,
    ) -> Result<DataSourceId> {
        let id = id.into();
        {
            let map = self.multi_map.read();
            for member in &members {
                if !map.contains_key(member) {
                    return Err(SearchError::UnknownDataSource(member.0.clone()));
                }
            }
        }
        let mut data_source = DataSource::new(id.clone(), label, DataSourceType::UserCategory);
        data_source.sub_data_sources = members;
        self.catalog.register(data_source);
        Ok(id)
    }

    fn filter_type(&self, query: &SearchQuery) -> Result<DataSourceType> {
        self.catalog
            .get(&query.filter.data_source)
            .map(|ds| ds.ds_type)
            .ok_or_else(|| SearchError::UnknownDataSource(query.filter.data_source.0.clone()))
    }

    fn multi_id(&self, child_index: usize, native: &DataSourceId) -> DataSourceId {
        DataSourceId::multi(self.children[child_index].provider.id(), native)
    }

    /// Scoped child queries for a federated (All / UserCategory) target.
    /// Returns `(child_index, query, multi id of the queried source)`.
    fn child_scoped_queries(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<(usize, SearchQuery, DataSourceId)>> {
        let target = self
            .catalog
            .get(&query.filter.data_source)
            .ok_or_else(|| SearchError::UnknownDataSource(query.filter.data_source.0.clone()))?;

        match target.ds_type {
            DataSourceType::All => {
                let mut scoped = Vec::new();
                for (child_index, child) in self.children.iter().enumerate() {
                    let Some(ref all_native) = child.all_data_source else {
                        continue;
                    };
                    let mut child_query = widen_window(query);
                    child_query.filter.data_source = all_native.clone();
                    let multi_id = self.multi_id(child_index, all_native);
                    scoped.push((child_index, child_query, multi_id));
                }
                Ok(scoped)
            }
            DataSourceType::UserCategory => self.favorites_scoped_queries(query, &target),
            _ => Err(SearchError::Internal(
                "child_scoped_queries called for a single-child target".to_string(),
            )),
        }
    }

    /// Split a favorites source per child. Sub-data-source capable children
    /// get one synthesized grouping source covering all their favorites;
    /// the rest are queried once per favorite.
    fn favorites_scoped_queries(
        &self,
        query: &SearchQuery,
        target: &DataSource,
    ) -> Result<Vec<(usize, SearchQuery, DataSourceId)>> {
        let mut per_child: HashMap<usize, Vec<DataSourceId>> = HashMap::new();
        {
            let map = self.multi_map.read();
            for member in &target.sub_data_sources {
                let entry = map
                    .get(member)
                    .ok_or_else(|| SearchError::UnknownDataSource(member.0.clone()))?;
                per_child
                    .entry(entry.child_index)
                    .or_default()
                    .push(entry.native_id.clone());
            }
        }

        let mut child_indices: Vec<usize> = per_child.keys().copied().collect();
        child_indices.sort_unstable();

        let mut scoped = Vec::new();
        for child_index in child_indices {
            let natives = &per_child[&child_index];
            let child = &self.children[child_index];

            if child.supports_sub_data_sources {
                // Lazy, idempotent registration of the grouping source; the
                // catalog refuses duplicates so concurrent first uses race
                // harmlessly.
                let grouping_id =
                    DataSourceId(format!("$$UserCategory$${}", target.id.0));
                let grouping = DataSource::new(
                    grouping_id.clone(),
                    target.label.clone(),
                    DataSourceType::Category,
                )
                .with_sub_data_sources(natives.clone());
                child.provider.catalog().register(grouping);
                self.multi_map.write().entry(self.multi_id(child_index, &grouping_id)).or_insert(
                    ChildRef {
                        child_index,
                        native_id: grouping_id.clone(),
                    },
                );

                let mut child_query = widen_window(query);
                child_query.filter.data_source = grouping_id.clone();
                let multi_id = self.multi_id(child_index, &grouping_id);
                scoped.push((child_index, child_query, multi_id));
            } else {
                for native in natives {
                    let mut child_query = widen_window(query);
                    child_query.filter.data_source = native.clone();
                    let multi_id = self.multi_id(child_index, native);
                    scoped.push((child_index, child_query, multi_id));
                }
            }
        }
        Ok(scoped)
    }

    /// Retag result items from a child into the multi id space
    fn retag_items(&self, child_index: usize, result: &mut SearchResultSet) {
        for item in result.items.iter_mut() {
            item.data_source = self.multi_id(child_index, &item.data_source);
        }
    }

    /// Fan out scoped queries (failures are fatal), then merge into one
    /// result set: data source facet, federated item order, paged window.
    async fn federated_search(
        &self,
        query: &SearchQuery,
        scoped: Vec<(usize, SearchQuery, DataSourceId)>,
    ) -> Result<SearchResultSet> {
        let started = Instant::now();

        let futures = scoped.iter().map(|(child_index, child_query, _)| {
            self.children[*child_index]
                .provider
                .execute_search_query(child_query)
        });
        let mut responses = try_join_all(futures).await?;

        let mut ds_facet = FacetResultSet::data_source("Search In");
        let mut total: u64 = 0;
        let mut lists = Vec::with_capacity(responses.len());

        for ((child_index, _, queried_multi_id), mut response) in
            scoped.into_iter().zip(responses.drain(..))
        {
            total += response.total_count;
            self.retag_items(child_index, &mut response);
            self.reconcile_data_source_facet(
                child_index,
                &queried_multi_id,
                &response,
                &mut ds_facet,
            );
            lists.push(response.items);
        }

        let merged = self.federation.merge(lists);

        let mut result = SearchResultSet::new(query.clone());
        result.total_count = total;
        result.items = merged
            .into_iter()
            .skip(query.skip)
            .take(query.top)
            .collect();
        result.facets = vec![ds_facet];
        result.execution_time_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Child responses do not agree on facet shape; normalize every
    /// response into items of one DataSource facet.
    fn reconcile_data_source_facet(
        &self,
        child_index: usize,
        queried_multi_id: &DataSourceId,
        response: &SearchResultSet,
        ds_facet: &mut FacetResultSet,
    ) {
        let label = self
            .catalog
            .get(queried_multi_id)
            .map(|ds| ds.label)
            .unwrap_or_else(|| self.children[child_index].provider.id().to_string());

        let synthesized_item = |measure: u64| {
            FacetItem::new(
                label.clone(),
                Some(measure),
                Condition::data_source(queried_multi_id.0.clone()),
            )
        };

        match response.facets.as_slice() {
            // No facets at all: synthesize one item from the hit count
            [] => {
                if !response.items.is_empty() {
                    ds_facet.items.push(synthesized_item(response.total_count));
                }
            }
            // A single chart facet: convert it into a data source item
            [facet] if facet.facet_type == FacetType::Chart => {
                if !facet.items.is_empty() {
                    ds_facet.items.push(synthesized_item(response.total_count));
                }
            }
            // A data source facet: merge its items, remapped to multi ids
            facets => {
                for facet in facets {
                    if facet.facet_type != FacetType::DataSource {
                        continue;
                    }
                    for item in &facet.items {
                        let mut remapped = item.clone();
                        if let Condition::Simple(ref mut simple) = remapped.filter_condition {
                            if simple.attribute == DATA_SOURCE_ATTRIBUTE {
                                if let Some(native) = simple.value.as_str() {
                                    simple.value = serde_json::Value::String(
                                        self.multi_id(child_index, &DataSourceId::from(native)).0,
                                    );
                                }
                            }
                        }
                        ds_facet.items.push(remapped);
                    }
                }
            }
        }
    }

    /// Route a query targeting one concrete child source
    async fn single_child_search(&self, query: &SearchQuery) -> Result<SearchResultSet> {
        let (child_index, native_id) = self.resolve_single(&query.filter.data_source)?;
        let child = &self.children[child_index];

        let mut child_query = query.clone();
        child_query.filter.data_source = native_id.clone();
        self.rewrite_refs_to_native(child_index, &mut child_query);

        let mut response = child.provider.execute_search_query(&child_query).await?;

        // Remap the response back into the multi id space and pick up any
        // lazily discovered attribute metadata.
        self.retag_items(child_index, &mut response);
        if let Some(native_ds) = child.provider.catalog().get(&native_id) {
            self.catalog.upsert_attributes(
                &query.filter.data_source,
                native_ds.attributes.into_values().collect(),
            );
        }
        response.query = query.clone();
        Ok(response)
    }

    fn resolve_single(&self, multi_id: &DataSourceId) -> Result<(usize, DataSourceId)> {
        let map = self.multi_map.read();
        let entry = map
            .get(multi_id)
            .ok_or_else(|| SearchError::UnknownDataSource(multi_id.0.clone()))?;
        Ok((entry.child_index, entry.native_id.clone()))
    }

    fn rewrite_refs_to_native(&self, child_index: usize, query: &mut SearchQuery) {
        let map = self.multi_map.read();
        query.filter.root_condition.rewrite_data_source_refs(&|id| {
            map.get(&DataSourceId::from(id))
                .filter(|entry| entry.child_index == child_index)
                .map(|entry| entry.native_id.0.clone())
        });
    }
}

#[async_trait]
impl Provider for MultiProvider {
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
        match self.filter_type(query)? {
            DataSourceType::All | DataSourceType::UserCategory => {
                let scoped = self.child_scoped_queries(query)?;
                self.federated_search(query, scoped).await
            }
            DataSourceType::BusinessObject | DataSourceType::Category => {
                self.single_child_search(query).await
            }
        }
    }

    async fn execute_chart_query(&self, query: &ChartQuery) -> Result<FacetResultSet> {
        match self.filter_type(&query.query)? {
            DataSourceType::BusinessObject | DataSourceType::Category => {
                let (child_index, native_id) =
                    self.resolve_single(&query.query.filter.data_source)?;
                let child = &self.children[child_index];

                let mut child_chart = query.clone();
                child_chart.query.filter.data_source = native_id;
                self.rewrite_refs_to_native(child_index, &mut child_chart.query);

                child.provider.execute_chart_query(&child_chart).await
            }
            // Federated targets: fan out and merge buckets by structural
            // condition equality
            _ => {
                let scoped = self.child_scoped_queries(&query.query)?;
                let futures = scoped.iter().map(|(child_index, child_query, _)| {
                    let child_chart = ChartQuery {
                        query: child_query.clone(),
                        dimension: query.dimension.clone(),
                    };
                    let provider = Arc::clone(&self.children[*child_index].provider);
                    async move { provider.execute_chart_query(&child_chart).await }
                });
                let responses = try_join_all(futures).await?;

                let title = responses
                    .first()
                    .map(|f| f.title.clone())
                    .unwrap_or_else(|| query.dimension.clone());
                let mut merged = FacetResultSet::chart(query.dimension.clone(), title);

                for facet in responses {
                    for item in facet.items {
                        match merged
                            .items
                            .iter_mut()
                            .find(|existing| existing.filter_condition == item.filter_condition)
                        {
                            Some(existing) => {
                                existing.measure = match (existing.measure, item.measure) {
                                    (Some(a), Some(b)) => Some(a + b),
                                    (a, b) => a.or(b),
                                };
                            }
                            None => merged.items.push(item),
                        }
                    }
                }

                merged
                    .items
                    .sort_by(|a, b| b.measure.unwrap_or(0).cmp(&a.measure.unwrap_or(0)));
                merged.items.truncate(query.query.facet_top);
                Ok(merged)
            }
        }
    }

    async fn execute_suggestion_query(
        &self,
        query: &SuggestionQuery,
    ) -> Result<SuggestionResultSet> {
        let target_type = self
            .catalog
            .get(&query.filter.data_source)
            .map(|ds| ds.ds_type)
            .ok_or_else(|| SearchError::UnknownDataSource(query.filter.data_source.0.clone()))?;

        let scoped: Vec<(usize, SuggestionQuery)> = match target_type {
            DataSourceType::BusinessObject | DataSourceType::Category => {
                let (child_index, native_id) = self.resolve_single(&query.filter.data_source)?;
                let mut child_query = query.clone();
                child_query.filter.data_source = native_id;
                vec![(child_index, child_query)]
            }
            _ => {
                let probe = SearchQuery::new(query.filter.clone());
                self.child_scoped_queries(&probe)?
                    .into_iter()
                    .map(|(child_index, scoped_query, _)| {
                        let mut child_query = query.clone();
                        child_query.filter = scoped_query.filter;
                        (child_index, child_query)
                    })
                    .collect()
            }
        };

        // allSettled: a child without suggestions is a minor degradation,
        // never an error
        let futures = scoped.into_iter().map(|(child_index, child_query)| {
            let provider = Arc::clone(&self.children[child_index].provider);
            async move { (child_index, provider.execute_suggestion_query(&child_query).await) }
        });
        let outcomes = join_all(futures).await;

        let mut merged: Vec<Suggestion> = Vec::new();
        for (child_index, outcome) in outcomes {
            match outcome {
                Ok(response) => {
                    for suggestion in response.suggestions {
                        match merged.iter_mut().find(|s| s.text == suggestion.text) {
                            Some(existing) => {
                                existing.count += suggestion.count;
                                existing.score = existing.score.max(suggestion.score);
                            }
                            None => merged.push(suggestion),
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        child = child_index,
                        error = %err,
                        "Child suggestion query failed, dropping its suggestions"
                    );
                }
            }
        }

        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a.text.cmp(&b.text))
        });
        merged.truncate(query.top);

        Ok(SuggestionResultSet { suggestions: merged })
    }
}
