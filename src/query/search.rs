//! Query descriptors
//!
//! A query is built once per search interaction and treated as immutable
//! after dispatch; every derived query (chart, folder, federation child)
//! works on a clone.

use crate::query::filter::Filter;
use serde::{Deserialize, Serialize};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One entry of the sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortAttribute {
    pub attribute_id: String,
    pub direction: SortDirection,
}

/// Comparison mode for [`SearchQuery::equals`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualsMode {
    /// Every flag must match exactly
    Strict,
    /// "Would firing this query produce a different result than the one
    /// currently displayed?" Turning facet calculation OFF relative to the
    /// displayed query compares equal: the displayed superset response
    /// already satisfies the new request. Turning it ON does not. The
    /// asymmetry is deliberate.
    CheckFireQuery,
}

/// Main search query descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub filter: Filter,

    /// Paging window
    pub skip: usize,
    pub top: usize,

    /// Sort specification; empty means backend relevance order
    #[serde(default)]
    pub sort_order: Vec<SortAttribute>,

    /// Request server-side facet computation
    #[serde(default)]
    pub calculate_facets: bool,

    /// Multi-select facet UX: filtered attributes still show their full
    /// value distribution via dedicated chart sub-queries
    #[serde(default)]
    pub multi_select_facets: bool,

    /// Number of values per facet, always >= 1
    pub facet_top: usize,

    /// Optional grouping attribute
    #[serde(default)]
    pub group_by: Option<String>,

    /// Natural-language-query interpretation requested
    #[serde(default)]
    pub nlq: bool,
}

impl SearchQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            skip: 0,
            top: 10,
            sort_order: Vec::new(),
            calculate_facets: false,
            multi_select_facets: false,
            facet_top: 5,
            group_by: None,
            nlq: false,
        }
    }

    pub fn with_paging(mut self, skip: usize, top: usize) -> Self {
        self.skip = skip;
        self.top = top;
        self
    }

    pub fn with_sort(mut self, attribute_id: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_order.push(SortAttribute {
            attribute_id: attribute_id.into(),
            direction,
        });
        self
    }

    pub fn with_facets(mut self, calculate: bool) -> Self {
        self.calculate_facets = calculate;
        self
    }

    pub fn with_multi_select_facets(mut self, enabled: bool) -> Self {
        self.multi_select_facets = enabled;
        self
    }

    /// Clamped to >= 1
    pub fn with_facet_top(mut self, facet_top: usize) -> Self {
        self.facet_top = facet_top.max(1);
        self
    }

    pub fn with_group_by(mut self, attribute: impl Into<String>) -> Self {
        self.group_by = Some(attribute.into());
        self
    }

    pub fn with_nlq(mut self, nlq: bool) -> Self {
        self.nlq = nlq;
        self
    }

    /// Compare against the currently displayed query `other`
    pub fn equals(&self, other: &SearchQuery, mode: EqualsMode) -> bool {
        let base = self.filter == other.filter
            && self.skip == other.skip
            && self.top == other.top
            && self.sort_order == other.sort_order
            && self.group_by == other.group_by
            && self.nlq == other.nlq;

        match mode {
            EqualsMode::Strict => {
                base && self.calculate_facets == other.calculate_facets
                    && self.multi_select_facets == other.multi_select_facets
                    && self.facet_top == other.facet_top
            }
            EqualsMode::CheckFireQuery => {
                // facets OFF when they were ON needs no re-fetch; with
                // facets still requested, a changed facet window or
                // dispatch mode does
                if !self.calculate_facets {
                    return base;
                }
                base && other.calculate_facets
                    && self.multi_select_facets == other.multi_select_facets
                    && self.facet_top == other.facet_top
            }
        }
    }

    /// Derive the chart sub-query for one dimension: the dimension's own
    /// conditions are stripped so the facet shows the full distribution,
    /// and paging is replaced by the facet window.
    pub fn to_chart_query(&self, dimension: impl Into<String>) -> ChartQuery {
        let dimension = dimension.into();
        let mut query = self.clone();
        query.filter.root_condition.remove_attribute_conditions(&dimension);
        query.skip = 0;
        query.top = self.facet_top;
        ChartQuery { query, dimension }
    }
}

/// Facet (aggregation) query for a single dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartQuery {
    pub query: SearchQuery,
    pub dimension: String,
}

/// Suggestion (type-ahead) query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionQuery {
    pub filter: Filter,
    pub prefix: String,
    pub top: usize,
}

impl SuggestionQuery {
    pub fn new(filter: Filter, prefix: impl Into<String>) -> Self {
        Self {
            filter,
            prefix: prefix.into(),
            top: 10,
        }
    }
}

/// Hierarchy navigation query. Present for interface completeness; every
/// provider in this crate refuses it with `NotImplemented`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyQuery {
    pub filter: Filter,
    pub attribute: String,
    pub node_id: Option<String>,
}
