//! Query execution on top of a provider
//!
//! The executor owns the orchestration a single backend call cannot
//! express: folder navigation (paired descendant/child queries), the
//! multi-select facet protocol (per-dimension chart sub-queries in two
//! dispatch waves) and the client-side facet merge.

pub mod facet_merge;

use crate::error::{Result, SearchError};
use crate::provider::Provider;
use crate::query::{ChartQuery, ComparisonOperator, SearchQuery};
use crate::result::{FacetResultSet, SearchResultSet};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

/// Orchestrates one search interaction against a provider
pub struct SearchExecutor {
    provider: Arc<dyn Provider>,
}

impl SearchExecutor {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Execute a search query, including its derived chart and folder
    /// queries where the query calls for them.
    pub async fn execute(&self, query: &SearchQuery) -> Result<SearchResultSet> {
        let data_source = self
            .provider
            .catalog()
            .get(&query.filter.data_source)
            .ok_or_else(|| SearchError::UnknownDataSource(query.filter.data_source.to_string()))?;

        if query.filter.is_folder_mode(&data_source) {
            if let Some(folder_attribute) = data_source.folder_attribute.as_deref() {
                return self.execute_folder(query, folder_attribute).await;
            }
        }

        if query.calculate_facets && query.multi_select_facets {
            return self.execute_with_chart_queries(query).await;
        }

        self.provider.execute_search_query(query).await
    }

    /// Folder navigation. The displayed result list shows only direct
    /// children of the current folder, while facets and counts keep the
    /// full descendant scope, so both variants run concurrently and the
    /// child items are grafted onto the descendant response.
    async fn execute_folder(
        &self,
        query: &SearchQuery,
        folder_attribute: &str,
    ) -> Result<SearchResultSet> {
        let has_folder_condition = query
            .filter
            .root_condition
            .has_operator(folder_attribute, ComparisonOperator::DescendantOf);
        if !has_folder_condition {
            // root of the folder tree, nothing to narrow
            return self.provider.execute_search_query(query).await;
        }

        let mut child_query = query.clone();
        child_query.filter.root_condition.rewrite_operator(
            folder_attribute,
            ComparisonOperator::DescendantOf,
            ComparisonOperator::ChildOf,
        );
        debug!(
            data_source = %query.filter.data_source,
            folder_attribute,
            "folder mode, running descendant and child queries"
        );

        let (mut descendants, children) = tokio::try_join!(
            self.provider.execute_search_query(query),
            self.provider.execute_search_query(&child_query)
        )?;

        descendants.items = children.items;
        descendants.total_count = children.total_count;
        Ok(descendants)
    }

    /// Multi-select facet protocol. Filtered attributes get their full
    /// value distribution from dedicated chart sub-queries; attributes
    /// whose metadata is not loaded yet are deferred to a second wave that
    /// runs after the main response (which may have carried the metadata).
    async fn execute_with_chart_queries(&self, query: &SearchQuery) -> Result<SearchResultSet> {
        let catalog = self.provider.catalog();
        let data_source = &query.filter.data_source;

        let mut first_wave: Vec<ChartQuery> = Vec::new();
        let mut deferred: Vec<String> = Vec::new();
        for attribute in query.filter.filtered_attributes() {
            match catalog.attribute(data_source, &attribute) {
                Some(metadata) => {
                    if metadata.is_hierarchy || !metadata.usage.facet {
                        continue;
                    }
                    first_wave.push(query.to_chart_query(attribute.as_str()));
                }
                // metadata may arrive with the main response
                None => deferred.push(attribute),
            }
        }
        debug!(
            data_source = %data_source,
            first_wave = first_wave.len(),
            deferred = deferred.len(),
            "dispatching chart sub-queries"
        );

        let (mut result, mut charts) = tokio::try_join!(
            self.provider.execute_search_query(query),
            try_join_all(
                first_wave
                    .iter()
                    .map(|chart| self.provider.execute_chart_query(chart)),
            )
        )?;

        let second_wave: Vec<ChartQuery> = deferred
            .into_iter()
            .filter(|attribute| {
                catalog
                    .attribute(data_source, attribute)
                    .map(|metadata| !metadata.is_hierarchy && metadata.usage.facet)
                    .unwrap_or(false)
            })
            .map(|attribute| query.to_chart_query(attribute))
            .collect();
        if !second_wave.is_empty() {
            let late = try_join_all(
                second_wave
                    .iter()
                    .map(|chart| self.provider.execute_chart_query(chart)),
            )
            .await?;
            charts.extend(late);
        }

        self.merge_facets(&mut result, charts);
        Ok(result)
    }

    /// Fixed merge order: selection placeholders first, then server charts
    /// reconciled against them.
    fn merge_facets(&self, result: &mut SearchResultSet, charts: Vec<FacetResultSet>) {
        let catalog = self.provider.catalog();
        let data_source = result.query.filter.data_source.clone();

        let title_of = |attribute: &str| {
            catalog
                .attribute(&data_source, attribute)
                .map(|metadata| metadata.label)
        };
        facet_merge::add_selected_filters(result, &title_of);

        for chart in charts {
            let is_range = catalog
                .attribute(&data_source, &chart.dimension)
                .map(|metadata| metadata.data_type.is_continuous())
                .unwrap_or(false);
            facet_merge::reconcile_chart(result, chart, is_range);
        }
    }
}
