//! Facet formatting for UI consumption
//!
//! Turns a raw result set plus the live filter state into the facet
//! hierarchy a frontend renders, independent of any backend. Metadata
//! lookup failures are logged and skipped here, never propagated.

use crate::datasource::{Catalog, DataSourceId};
use crate::executor::facet_merge;
use crate::query::{ComparisonOperator, Condition};
use crate::result::{FacetItem, FacetResultSet, FacetType, SearchResultSet};
use tracing::warn;

/// Positions assigned to facets without an explicit one start here, so
/// explicitly configured positions always sort first.
const IMPLICIT_POSITION_OFFSET: i64 = 1000;

/// Node of the client-held "Search In" navigation tree
#[derive(Debug, Clone)]
pub struct DataSourceTreeNode {
    pub data_source: DataSourceId,
    pub label: String,
    pub children: Vec<DataSourceTreeNode>,
}

impl DataSourceTreeNode {
    pub fn new(data_source: impl Into<DataSourceId>, label: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DataSourceTreeNode>) -> Self {
        self.children = children;
        self
    }
}

/// Formats raw facet results for display
pub struct FacetsFormatter;

impl FacetsFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Build the attribute facet list: every chart facet of the result,
    /// labels decorated for pattern-match operators, data-type metadata
    /// attached, selection-implied facets folded in, and facets holding an
    /// active selection promoted to the front.
    pub fn attribute_facets(
        &self,
        result: &SearchResultSet,
        catalog: &Catalog,
    ) -> Vec<FacetResultSet> {
        let data_source = &result.query.filter.data_source;

        // Fold in facets the server omitted for already-filtered attributes
        let mut working = result.clone();
        working.facets.retain(|f| f.facet_type == FacetType::Chart);
        let title_of = |attribute: &str| {
            catalog
                .attribute(data_source, attribute)
                .map(|metadata| metadata.label)
        };
        facet_merge::add_selected_filters(&mut working, &title_of);

        let mut facets: Vec<FacetResultSet> = working
            .facets
            .into_iter()
            .map(|mut facet| {
                match catalog.attribute(data_source, &facet.dimension) {
                    Some(metadata) => {
                        facet.data_type = Some(metadata.data_type);
                        if facet.position.is_none() {
                            facet.position = metadata.position;
                        }
                    }
                    None => {
                        warn!(
                            data_source = %data_source,
                            attribute = %facet.dimension,
                            "no attribute metadata, facet kept undecorated"
                        );
                    }
                }
                for item in facet.items.iter_mut() {
                    item.label = decorate_label(&item.label, &item.filter_condition);
                }
                facet
            })
            .collect();

        // Selected facets first, in their existing relative order
        facets.sort_by_key(|facet| !facet.items.iter().any(|item| item.selected));
        facets
    }

    /// Assign implicit positions in discovery order, then sort. The sort is
    /// stable, so facets sharing a position keep their relative order.
    pub fn sort_facets(&self, facets: &mut [FacetResultSet]) {
        for (index, facet) in facets.iter_mut().enumerate() {
            if facet.position.is_none() {
                facet.position = Some(IMPLICIT_POSITION_OFFSET + index as i64);
            }
        }
        facets.sort_by_key(|facet| facet.position);
    }

    /// Derive the "Search In" pseudo-facet from the navigation tree:
    /// breadcrumb items for the ancestor chain (root to parent), then the
    /// current node's siblings, with the current sibling's own children
    /// disclosed inline beneath it. One disclosure level only.
    pub fn data_source_facet(
        &self,
        root: &DataSourceTreeNode,
        current: &DataSourceId,
    ) -> FacetResultSet {
        let path = match find_path(root, current) {
            Some(path) => path,
            None => {
                warn!(data_source = %current, "current data source not in navigation tree");
                return FacetResultSet::data_source("Search In");
            }
        };

        let mut items = Vec::new();

        // Ancestors, root first, excluding the current node
        for ancestor in &path[..path.len() - 1] {
            items.push(tree_item(ancestor, false));
        }

        let siblings: &[DataSourceTreeNode] = if path.len() >= 2 {
            &path[path.len() - 2].children
        } else {
            std::slice::from_ref(root)
        };
        for sibling in siblings {
            let is_current = sibling.data_source == *current;
            items.push(tree_item(sibling, is_current));
            if is_current {
                for child in &sibling.children {
                    items.push(tree_item(child, false));
                }
            }
        }

        FacetResultSet::data_source("Search In").with_items(items)
    }
}

impl Default for FacetsFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pattern-match operators get their wildcard rendered into the label
fn decorate_label(label: &str, condition: &Condition) -> String {
    let operator = match condition.as_simple() {
        Some(simple) => simple.operator,
        None => return label.to_string(),
    };
    match operator {
        ComparisonOperator::Bw => format!("{label}*"),
        ComparisonOperator::Ew => format!("*{label}"),
        ComparisonOperator::Co => format!("*{label}*"),
        _ => label.to_string(),
    }
}

fn tree_item(node: &DataSourceTreeNode, selected: bool) -> FacetItem {
    let mut item = FacetItem::new(
        node.label.clone(),
        None,
        Condition::data_source(node.data_source.as_str()),
    );
    item.selected = selected;
    item
}

fn find_path<'a>(
    node: &'a DataSourceTreeNode,
    target: &DataSourceId,
) -> Option<Vec<&'a DataSourceTreeNode>> {
    if node.data_source == *target {
        return Some(vec![node]);
    }
    for child in &node.children {
        if let Some(mut path) = find_path(child, target) {
            path.insert(0, node);
            return Some(path);
        }
    }
    None
}
