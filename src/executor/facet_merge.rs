//! Facet merge steps of query execution
//!
//! The two steps run in a fixed order: selection-derived placeholders are
//! synthesized first, then server chart results are reconciled against
//! them. Reconciliation depends on the placeholders existing.

use crate::query::Condition;
use crate::result::{FacetItem, FacetResultSet, SearchResultSet};

/// Lookup of a display title for a dimension
pub type TitleLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Ensure every active filter condition is represented by a facet and a
/// selected item, even when the server omitted the facet (servers skip
/// facet computation for attributes that are already filtered). When a
/// condition is the sole one on its attribute, the current total count is
/// its placeholder measure; otherwise the count is unknown.
pub fn add_selected_filters(result: &mut SearchResultSet, title_of: TitleLookup<'_>) {
    let filter = result.query.filter.clone();
    let total = result.total_count;

    for attribute in filter.filtered_attributes() {
        let conditions = filter.root_condition.conditions_for_attribute(&attribute);
        if conditions.is_empty() {
            continue;
        }
        let sole = conditions.len() == 1;

        if result.facet(&attribute).is_none() {
            let title = title_of(&attribute).unwrap_or_else(|| attribute.clone());
            result.facets.push(FacetResultSet::chart(attribute.clone(), title));
        }
        let facet = match result.facet_mut(&attribute) {
            Some(facet) => facet,
            None => continue,
        };

        for condition in conditions {
            let filter_condition = Condition::Simple(condition.clone());
            match facet
                .items
                .iter_mut()
                .find(|item| item.filter_condition == filter_condition)
            {
                Some(existing) => existing.selected = true,
                None => {
                    let measure = if sole { Some(total) } else { None };
                    facet.items.push(
                        FacetItem::new(condition.display_label(), measure, filter_condition)
                            .selected(),
                    );
                }
            }
        }
    }
}

/// Reconcile one server chart result into the facet of its dimension.
///
/// Items matching a selection placeholder by structural condition equality
/// are replaced by the authoritative counted server item. Unmatched
/// selections survive: appended for discrete dimensions, but for continuous
/// (range-bucketed) dimensions an out-of-range selection replaces the whole
/// bucket list.
pub fn reconcile_chart(result: &mut SearchResultSet, chart: FacetResultSet, is_range: bool) {
    let active: Vec<Condition> = result
        .query
        .filter
        .root_condition
        .conditions_for_attribute(&chart.dimension)
        .into_iter()
        .map(|simple| Condition::Simple(simple.clone()))
        .collect();

    let existing = match result.facet_mut(&chart.dimension) {
        Some(existing) => existing,
        None => {
            let mut chart = chart;
            mark_selected(&mut chart.items, &active);
            result.facets.push(chart);
            return;
        }
    };

    let placeholders: Vec<FacetItem> =
        existing.items.iter().filter(|item| item.selected).cloned().collect();

    let mut items = chart.items;
    let mut unmatched = Vec::new();
    for placeholder in placeholders {
        match items
            .iter_mut()
            .find(|item| item.filter_condition == placeholder.filter_condition)
        {
            Some(server_item) => server_item.selected = true,
            None => unmatched.push(placeholder),
        }
    }

    if is_range {
        if !unmatched.is_empty() {
            // Out-of-range selections invalidate the server's buckets
            items = unmatched;
        }
    } else {
        items.extend(unmatched);
    }

    mark_selected(&mut items, &active);
    existing.title = chart.title;
    existing.items = items;
}

fn mark_selected(items: &mut [FacetItem], active: &[Condition]) {
    for item in items.iter_mut() {
        if active.iter().any(|condition| *condition == item.filter_condition) {
            item.selected = true;
        }
    }
}
