//! Data sources, attribute metadata and the shared catalog
//!
//! The catalog is the read-mostly registry a provider builds during
//! initialization. It is shared behind a lock because attribute metadata
//! can still be discovered lazily from search responses, and because the
//! federation registers synthesized grouping sources on first use.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a data source. For federated sources this is the
/// synthesized multi id (`childProviderId:childDataSourceId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataSourceId(pub String);

impl DataSourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Synthesized join key for a federated data source
    pub fn multi(provider_id: &str, native_id: &DataSourceId) -> Self {
        DataSourceId(format!("{}:{}", provider_id, native_id.0))
    }
}

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataSourceId {
    fn from(id: &str) -> Self {
        DataSourceId(id.to_string())
    }
}

impl From<String> for DataSourceId {
    fn from(id: String) -> Self {
        DataSourceId(id)
    }
}

/// Mutually exclusive classification of a query target; drives routing in
/// the multi-provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceType {
    /// Search across every federated source
    All,
    /// User-curated favorites spanning sources
    UserCategory,
    /// One concrete backend collection
    BusinessObject,
    /// Static grouping of collections within one backend
    Category,
}

/// Data type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeDataType {
    String,
    Integer,
    Double,
    Timestamp,
    Date,
    GeoJson,
}

impl AttributeDataType {
    /// Continuous types get range-bucket facets; selections outside the
    /// returned buckets replace the bucket list instead of appending.
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            AttributeDataType::Integer
                | AttributeDataType::Double
                | AttributeDataType::Timestamp
                | AttributeDataType::Date
        )
    }
}

/// Declared usages of an attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeUsage {
    /// Attribute participates in facet computation
    #[serde(default)]
    pub facet: bool,

    /// Attribute is offered in advanced search
    #[serde(default)]
    pub advanced_search: bool,
}

/// Metadata of one searchable attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    pub id: String,
    pub label: String,
    pub data_type: AttributeDataType,
    #[serde(default)]
    pub usage: AttributeUsage,
    /// Hierarchy attributes are handled by a dedicated formatter, not by
    /// chart sub-queries
    #[serde(default)]
    pub is_hierarchy: bool,
    /// Explicit facet position; unset positions are assigned at sort time
    #[serde(default)]
    pub position: Option<i64>,
}

impl AttributeMetadata {
    pub fn new(id: impl Into<String>, label: impl Into<String>, data_type: AttributeDataType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data_type,
            usage: AttributeUsage::default(),
            is_hierarchy: false,
            position: None,
        }
    }

    pub fn with_facet_usage(mut self) -> Self {
        self.usage.facet = true;
        self
    }
}

/// One searchable collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: DataSourceId,
    pub label: String,
    #[serde(default)]
    pub label_plural: Option<String>,
    pub ds_type: DataSourceType,
    /// Hierarchy attribute enabling folder navigation mode
    #[serde(default)]
    pub folder_attribute: Option<String>,
    /// Member sources of a Category / UserCategory
    #[serde(default)]
    pub sub_data_sources: Vec<DataSourceId>,
    /// Attribute metadata, possibly incomplete until first use
    #[serde(default)]
    pub attributes: HashMap<String, AttributeMetadata>,
}

impl DataSource {
    pub fn new(id: impl Into<DataSourceId>, label: impl Into<String>, ds_type: DataSourceType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            label_plural: None,
            ds_type,
            folder_attribute: None,
            sub_data_sources: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, metadata: AttributeMetadata) -> Self {
        self.attributes.insert(metadata.id.clone(), metadata);
        self
    }

    pub fn with_folder_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.folder_attribute = Some(attribute.into());
        self
    }

    pub fn with_sub_data_sources(mut self, subs: Vec<DataSourceId>) -> Self {
        self.sub_data_sources = subs;
        self
    }
}

/// Shared registry of data sources for one provider context
#[derive(Debug, Default)]
pub struct Catalog {
    sources: RwLock<HashMap<DataSourceId, DataSource>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data source. Idempotent: an already-registered id is left
    /// untouched (concurrent lazy registrations must not clobber each
    /// other). Returns whether the source was newly inserted.
    pub fn register(&self, data_source: DataSource) -> bool {
        let mut sources = self.sources.write();
        if sources.contains_key(&data_source.id) {
            return false;
        }
        sources.insert(data_source.id.clone(), data_source);
        true
    }

    pub fn get(&self, id: &DataSourceId) -> Option<DataSource> {
        self.sources.read().get(id).cloned()
    }

    pub fn contains(&self, id: &DataSourceId) -> bool {
        self.sources.read().contains_key(id)
    }

    /// Attribute metadata lookup
    pub fn attribute(&self, data_source: &DataSourceId, attribute: &str) -> Option<AttributeMetadata> {
        self.sources
            .read()
            .get(data_source)
            .and_then(|ds| ds.attributes.get(attribute).cloned())
    }

    /// Merge lazily discovered attribute metadata into a data source.
    /// Existing entries are overwritten: the response is authoritative.
    pub fn upsert_attributes(&self, data_source: &DataSourceId, attributes: Vec<AttributeMetadata>) {
        let mut sources = self.sources.write();
        if let Some(ds) = sources.get_mut(data_source) {
            for metadata in attributes {
                ds.attributes.insert(metadata.id.clone(), metadata);
            }
        }
    }

    /// All data sources sorted by display label, then id for stability
    pub fn list_sorted(&self) -> Vec<DataSource> {
        let mut list: Vec<DataSource> = self.sources.read().values().cloned().collect();
        list.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}
