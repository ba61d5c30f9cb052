//! Common result model returned by every provider

use crate::datasource::{AttributeDataType, DataSourceId};
use crate::query::{Condition, SearchQuery};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind of a facet result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacetType {
    /// Value distribution over one attribute
    Chart,
    /// "Search In" facet over data sources
    DataSource,
}

/// One value of a facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetItem {
    /// Formatted dimension value
    pub label: String,

    /// Measured count. `None` marks a selection placeholder the server has
    /// not (yet) counted.
    pub measure: Option<u64>,

    /// Condition that selecting this item would add to the filter. Merge
    /// identity of facet items is structural equality of this condition.
    pub filter_condition: Condition,

    /// Whether the item matches an active filter condition
    #[serde(default)]
    pub selected: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl FacetItem {
    pub fn new(label: impl Into<String>, measure: Option<u64>, filter_condition: Condition) -> Self {
        Self {
            label: label.into(),
            measure,
            filter_condition,
            selected: false,
            icon: None,
        }
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

/// Facet result set: one chart or data source facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetResultSet {
    pub facet_type: FacetType,

    /// Dimension attribute id; the reserved data source attribute for
    /// DataSource facets
    pub dimension: String,

    pub title: String,

    pub items: Vec<FacetItem>,

    /// Explicit ordering position; unset positions are assigned by the
    /// formatter behind all explicit ones
    #[serde(default)]
    pub position: Option<i64>,

    /// Data type of the dimension, attached by the formatter from catalog
    /// metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<AttributeDataType>,
}

impl FacetResultSet {
    pub fn chart(dimension: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            facet_type: FacetType::Chart,
            dimension: dimension.into(),
            title: title.into(),
            items: Vec::new(),
            position: None,
            data_type: None,
        }
    }

    pub fn data_source(title: impl Into<String>) -> Self {
        Self {
            facet_type: FacetType::DataSource,
            dimension: crate::query::DATA_SOURCE_ATTRIBUTE.to_string(),
            title: title.into(),
            items: Vec::new(),
            position: None,
            data_type: None,
        }
    }

    pub fn with_items(mut self, items: Vec<FacetItem>) -> Self {
        self.items = items;
        self
    }
}

/// Cross-object navigation target attached to a result item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationTarget {
    pub label: String,
    pub target_url: String,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// Backend key of the item
    pub key: String,

    /// Originating data source; rewritten to the multi id when the item
    /// crosses the federation boundary
    pub data_source: DataSourceId,

    pub title: String,

    /// Raw attribute values by attribute id
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// Backend relevance score; only comparable within one provider
    #[serde(default)]
    pub score: f64,

    #[serde(default)]
    pub navigation_targets: Vec<NavigationTarget>,
}

impl SearchResultItem {
    pub fn new(
        key: impl Into<String>,
        data_source: impl Into<DataSourceId>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            data_source: data_source.into(),
            title: title.into(),
            attributes: Map::new(),
            score: 0.0,
            navigation_targets: Vec::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_attribute(mut self, id: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(id.into(), value);
        self
    }
}

/// Natural-language-query interpretation metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NlqMetadata {
    /// Backend's interpretation of the natural-language input
    pub interpreted_query: String,

    /// Whether the backend actually applied NLQ processing
    #[serde(default)]
    pub applied: bool,
}

/// Merged result of one logical search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultSet {
    pub id: Uuid,

    /// Query that produced this result (back-reference by value)
    pub query: SearchQuery,

    pub items: Vec<SearchResultItem>,

    /// Server-estimated total; not an upper bound for `items.len()`
    pub total_count: u64,

    /// Ordering is significant and stable for the same query shape
    pub facets: Vec<FacetResultSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nlq: Option<NlqMetadata>,

    #[serde(default)]
    pub execution_time_ms: u64,
}

impl SearchResultSet {
    pub fn new(query: SearchQuery) -> Self {
        Self {
            id: Uuid::new_v4(),
            query,
            items: Vec::new(),
            total_count: 0,
            facets: Vec::new(),
            nlq: None,
            execution_time_ms: 0,
        }
    }

    /// Facet for a dimension, if present
    pub fn facet(&self, dimension: &str) -> Option<&FacetResultSet> {
        self.facets.iter().find(|f| f.dimension == dimension)
    }

    pub fn facet_mut(&mut self, dimension: &str) -> Option<&mut FacetResultSet> {
        self.facets.iter_mut().find(|f| f.dimension == dimension)
    }

    /// Replace the facet at the position of `dimension`, or append when the
    /// dimension is not present yet. Keeps facet ordering stable.
    pub fn replace_facet(&mut self, facet: FacetResultSet) {
        match self.facets.iter().position(|f| f.dimension == facet.dimension) {
            Some(index) => self.facets[index] = facet,
            None => self.facets.push(facet),
        }
    }
}

/// One type-ahead suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub count: u64,
    #[serde(default)]
    pub score: f64,
}

/// Result of a suggestion query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResultSet {
    pub suggestions: Vec<Suggestion>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Condition, Filter};
    use serde_json::json;

    #[test]
    fn test_replace_facet_keeps_position() {
        let query = SearchQuery::new(Filter::new("sales"));
        let mut result = SearchResultSet::new(query);
        result.facets.push(FacetResultSet::chart("region", "Region"));
        result.facets.push(FacetResultSet::chart("status", "Status"));

        let replacement = FacetResultSet::chart("region", "Region").with_items(vec![
            FacetItem::new("EMEA", Some(12), Condition::eq("region", json!("EMEA"))),
        ]);
        result.replace_facet(replacement);

        assert_eq!(result.facets.len(), 2);
        assert_eq!(result.facets[0].dimension, "region");
        assert_eq!(result.facets[0].items.len(), 1);
        assert_eq!(result.facets[1].dimension, "status");
    }

    #[test]
    fn test_facet_item_merge_identity_is_structural() {
        let a = FacetItem::new("EMEA", None, Condition::eq("region", json!("EMEA")));
        let b = FacetItem::new("Europe", Some(40), Condition::eq("region", json!("EMEA")));
        assert_eq!(a.filter_condition, b.filter_condition);
    }
}
