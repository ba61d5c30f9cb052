//! Search filter: target data source plus a root condition tree

use crate::datasource::{DataSource, DataSourceId};
use crate::query::condition::{ComplexCondition, Condition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Filter state of one query. Owned exclusively by its query; derived
/// sub-queries always operate on a clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Target data source
    pub data_source: DataSourceId,

    /// Root condition tree; the root combines with AND
    pub root_condition: ComplexCondition,

    /// Free-text search term
    pub search_term: String,
}

impl Filter {
    pub fn new(data_source: impl Into<DataSourceId>) -> Self {
        Self {
            data_source: data_source.into(),
            root_condition: ComplexCondition::and(Vec::new()),
            search_term: String::new(),
        }
    }

    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<Condition>) -> Self {
        self.root_condition.add(condition.into());
        self
    }

    /// Attributes with at least one active condition, deterministic order
    pub fn filtered_attributes(&self) -> BTreeSet<String> {
        self.root_condition.referenced_attributes()
    }

    /// Folder navigation mode applies when the target data source declares
    /// a folder attribute
    pub fn is_folder_mode(&self, data_source: &DataSource) -> bool {
        data_source.folder_attribute.is_some()
    }
}
