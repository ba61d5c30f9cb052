//! Wire response shapes of the OData backend and their conversion into the
//! common result model

use crate::datasource::{
    AttributeDataType, AttributeMetadata, AttributeUsage, Catalog, DataSource, DataSourceId,
    DataSourceType,
};
use crate::error::{Result, SearchError};
use crate::query::{Condition, SimpleCondition};
use crate::result::{
    FacetItem, FacetResultSet, NavigationTarget, NlqMetadata, SearchResultItem,
};
use serde::Deserialize;
use serde_json::{Map, Value};

/// `ServerInfo` document fetched during initialization
#[derive(Debug, Deserialize)]
pub struct ServerInfoResponse {
    #[serde(default)]
    pub search_active: bool,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default)]
    pub nlq: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One data source of the catalog document
#[derive(Debug, Deserialize)]
pub struct WireDataSource {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub label_plural: Option<String>,
    #[serde(default = "default_ds_type")]
    pub ds_type: String,
    #[serde(default)]
    pub folder_attribute: Option<String>,
    #[serde(default)]
    pub sub_data_sources: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<WireAttributeMetadata>,
}

fn default_ds_type() -> String {
    "BusinessObject".to_string()
}

/// Catalog document fetched during initialization
#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub data_sources: Vec<WireDataSource>,
}

/// Attribute metadata as reported by the backend
#[derive(Debug, Deserialize)]
pub struct WireAttributeMetadata {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_attribute_type")]
    pub data_type: String,
    #[serde(default)]
    pub facet: bool,
    #[serde(default)]
    pub advanced_search: bool,
    #[serde(default)]
    pub hierarchy: bool,
    #[serde(default)]
    pub position: Option<i64>,
}

fn default_attribute_type() -> String {
    "String".to_string()
}

/// Search response document
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub value: Vec<WireItem>,
    #[serde(rename = "@odata.count", default)]
    pub count: u64,
    #[serde(default)]
    pub facets: Vec<WireFacet>,
    #[serde(default)]
    pub metadata: Vec<WireAttributeMetadata>,
    #[serde(default)]
    pub nlq: Option<WireNlq>,
}

#[derive(Debug, Deserialize)]
pub struct WireItem {
    pub key: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub links: Vec<WireLink>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct WireLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub struct WireFacet {
    pub dimension: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<WireFacetItem>,
}

#[derive(Debug, Deserialize)]
pub struct WireFacetItem {
    pub value: Value,
    #[serde(default)]
    pub label: Option<String>,
    pub count: u64,
    /// Upper bound of a range bucket; presence marks the bucket as a range
    #[serde(default)]
    pub high_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct WireNlq {
    #[serde(default)]
    pub interpreted_query: String,
    #[serde(default)]
    pub applied: bool,
}

/// Suggestion response document
#[derive(Debug, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub suggestions: Vec<WireSuggestion>,
}

#[derive(Debug, Deserialize)]
pub struct WireSuggestion {
    pub text: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub score: f64,
}

pub fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| SearchError::Parse(e.to_string()))
}

/// Convert wire metadata into the catalog shape
pub fn to_attribute_metadata(wire: WireAttributeMetadata) -> AttributeMetadata {
    AttributeMetadata {
        label: wire.label.unwrap_or_else(|| wire.name.clone()),
        data_type: parse_data_type(&wire.data_type),
        usage: AttributeUsage {
            facet: wire.facet,
            advanced_search: wire.advanced_search,
        },
        is_hierarchy: wire.hierarchy,
        position: wire.position,
        id: wire.name,
    }
}

pub fn to_data_source(wire: WireDataSource) -> DataSource {
    let mut data_source = DataSource::new(wire.id, wire.label, parse_ds_type(&wire.ds_type));
    data_source.label_plural = wire.label_plural;
    data_source.folder_attribute = wire.folder_attribute;
    data_source.sub_data_sources = wire
        .sub_data_sources
        .into_iter()
        .map(DataSourceId::from)
        .collect();
    for attribute in wire.attributes {
        let metadata = to_attribute_metadata(attribute);
        data_source.attributes.insert(metadata.id.clone(), metadata);
    }
    data_source
}

fn parse_data_type(raw: &str) -> AttributeDataType {
    match raw {
        "Integer" => AttributeDataType::Integer,
        "Double" => AttributeDataType::Double,
        "Timestamp" => AttributeDataType::Timestamp,
        "Date" => AttributeDataType::Date,
        "GeoJson" => AttributeDataType::GeoJson,
        _ => AttributeDataType::String,
    }
}

fn parse_ds_type(raw: &str) -> DataSourceType {
    match raw {
        "All" => DataSourceType::All,
        "UserCategory" => DataSourceType::UserCategory,
        "Category" => DataSourceType::Category,
        _ => DataSourceType::BusinessObject,
    }
}

/// Parse result items. Runs after metadata update: title fallback and value
/// presentation consult the catalog's attribute labels.
pub fn parse_items(
    items: Vec<WireItem>,
    data_source: &DataSourceId,
    catalog: &Catalog,
) -> Vec<SearchResultItem> {
    items
        .into_iter()
        .map(|wire| {
            let title = wire.title.unwrap_or_else(|| {
                // Prefer the first attribute the catalog knows a label for
                wire.attributes
                    .iter()
                    .find(|(id, _)| catalog.attribute(data_source, id).is_some())
                    .and_then(|(_, value)| value.as_str().map(|s| s.to_string()))
                    .unwrap_or_else(|| wire.key.clone())
            });

            let mut item = SearchResultItem::new(wire.key, data_source.clone(), title);
            item.score = wire.score;
            item.attributes = wire.attributes;
            item.navigation_targets = wire
                .links
                .into_iter()
                .map(|link| NavigationTarget {
                    label: link.label,
                    target_url: link.href,
                })
                .collect();
            item
        })
        .collect()
}

/// Parse facets. Runs after metadata update: range bucket conditions need
/// the attribute's data type to be known.
pub fn parse_facets(
    facets: Vec<WireFacet>,
    data_source: &DataSourceId,
    catalog: &Catalog,
) -> Vec<FacetResultSet> {
    facets
        .into_iter()
        .map(|wire| {
            let title = wire.title.unwrap_or_else(|| {
                catalog
                    .attribute(data_source, &wire.dimension)
                    .map(|m| m.label)
                    .unwrap_or_else(|| wire.dimension.clone())
            });

            let items = wire
                .items
                .into_iter()
                .map(|bucket| to_facet_item(&wire.dimension, bucket))
                .collect();

            FacetResultSet::chart(wire.dimension, title).with_items(items)
        })
        .collect()
}

fn to_facet_item(dimension: &str, bucket: WireFacetItem) -> FacetItem {
    let label = bucket.label.unwrap_or_else(|| match &bucket.value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    let condition = match bucket.high_value {
        Some(high) => {
            Condition::Simple(SimpleCondition::between(dimension, bucket.value, high))
        }
        None => Condition::eq(dimension, bucket.value),
    };

    FacetItem::new(label, Some(bucket.count), condition)
}

pub fn parse_nlq(nlq: Option<WireNlq>) -> Option<NlqMetadata> {
    nlq.map(|wire| NlqMetadata {
        interpreted_query: wire.interpreted_query,
        applied: wire.applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_flatten_captures_attributes() {
        let response: SearchResponse = decode(json!({
            "value": [
                { "key": "42", "title": "Laptop Pro", "score": 0.9, "region": "EMEA" }
            ],
            "@odata.count": 1
        }))
        .unwrap();

        assert_eq!(response.count, 1);
        let item = &response.value[0];
        assert_eq!(item.attributes.get("region"), Some(&json!("EMEA")));
    }

    #[test]
    fn test_facet_range_bucket_becomes_between() {
        let bucket = WireFacetItem {
            value: json!(0),
            label: Some("0 - 100".to_string()),
            count: 7,
            high_value: Some(json!(100)),
        };

        let item = to_facet_item("price", bucket);
        match item.filter_condition {
            Condition::Simple(ref simple) => {
                assert_eq!(simple.operator, crate::query::ComparisonOperator::Between);
                assert_eq!(simple.high_value, Some(json!(100)));
            }
            _ => panic!("expected a simple condition"),
        }
        assert_eq!(item.measure, Some(7));
    }

    #[test]
    fn test_metadata_conversion() {
        let metadata = to_attribute_metadata(WireAttributeMetadata {
            name: "price".to_string(),
            label: None,
            data_type: "Double".to_string(),
            facet: true,
            advanced_search: false,
            hierarchy: false,
            position: Some(3),
        });

        assert_eq!(metadata.label, "price");
        assert_eq!(metadata.data_type, AttributeDataType::Double);
        assert!(metadata.usage.facet);
        assert_eq!(metadata.position, Some(3));
    }
}
