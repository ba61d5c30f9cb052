//! Serialization of the common query model into the backend filter grammar
//!
//! The grammar is OData-flavored: infix comparison tokens, parenthesized
//! and/or groups, `datasource`/`$skip`/`$top`/`$orderby` query options.
//! String literals are single-quoted with `''` escaping; timestamp
//! attributes are emitted as `datetime'...'` literals.

use crate::datasource::{AttributeDataType, DataSource};
use crate::query::{
    ComparisonOperator, ComplexCondition, Condition, LogicalOperator, SearchQuery, SimpleCondition,
    SortDirection,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Attribute data type lookup used while serializing
pub type DataTypeLookup<'a> = &'a dyn Fn(&str) -> Option<AttributeDataType>;

/// Query options scoping a request to its target data source. Grouping
/// sources additionally carry their member list; without it the backend
/// would search its whole catalog.
pub fn scope_options(scope: &DataSource) -> Vec<String> {
    let mut options = vec![format!("datasource={}", encode_component(scope.id.as_str()))];
    if !scope.sub_data_sources.is_empty() {
        let members: Vec<&str> = scope
            .sub_data_sources
            .iter()
            .map(|member| member.as_str())
            .collect();
        options.push(format!(
            "subdatasources={}",
            encode_component(&members.join(","))
        ));
    }
    options
}

/// Serialize one query into the query-option string of a search request
pub fn search_query_options(
    query: &SearchQuery,
    scope: &DataSource,
    data_type: DataTypeLookup<'_>,
) -> String {
    let mut options = scope_options(scope);
    options.push(format!("$skip={}", query.skip));
    options.push(format!("$top={}", query.top));

    if !query.filter.search_term.is_empty() {
        options.push(format!(
            "searchterm={}",
            encode_component(&query.filter.search_term)
        ));
    }

    if let Some(filter) = serialize_complex(&query.filter.root_condition, data_type) {
        options.push(format!("$filter={}", encode_component(&filter)));
    }

    if !query.sort_order.is_empty() {
        let orderby: Vec<String> = query
            .sort_order
            .iter()
            .map(|sort| {
                let direction = match sort.direction {
                    SortDirection::Ascending => "asc",
                    SortDirection::Descending => "desc",
                };
                format!("{} {}", sort.attribute_id, direction)
            })
            .collect();
        options.push(format!("$orderby={}", encode_component(&orderby.join(","))));
    }

    if query.calculate_facets {
        options.push("facets=all".to_string());
        options.push(format!("facetlimit={}", query.facet_top));
    }

    if let Some(ref group_by) = query.group_by {
        options.push(format!("groupby={}", encode_component(group_by)));
    }

    if query.nlq {
        options.push("nlq=true".to_string());
    }

    options.join("&")
}

/// Serialize the root condition tree; `None` when the tree is empty
pub fn serialize_complex(
    complex: &ComplexCondition,
    data_type: DataTypeLookup<'_>,
) -> Option<String> {
    if complex.is_empty() {
        return None;
    }

    let parts: Vec<String> = complex
        .conditions
        .iter()
        .filter_map(|condition| serialize_condition(condition, data_type))
        .collect();

    match parts.len() {
        0 => None,
        1 => Some(parts.into_iter().next().unwrap_or_default()),
        _ => {
            let joiner = match complex.operator {
                LogicalOperator::And => " and ",
                LogicalOperator::Or => " or ",
            };
            Some(format!("({})", parts.join(joiner)))
        }
    }
}

fn serialize_condition(condition: &Condition, data_type: DataTypeLookup<'_>) -> Option<String> {
    match condition {
        Condition::Simple(simple) => Some(serialize_simple(simple, data_type)),
        Condition::Complex(complex) => serialize_complex(complex, data_type),
    }
}

fn serialize_simple(simple: &SimpleCondition, data_type: DataTypeLookup<'_>) -> String {
    let attribute_type = data_type(&simple.attribute);

    if simple.operator == ComparisonOperator::Between {
        let low = literal(&simple.value, attribute_type);
        let high = simple
            .high_value
            .as_ref()
            .map(|v| literal(v, attribute_type))
            .unwrap_or_else(|| low.clone());
        return format!(
            "({attr} ge {low} and {attr} le {high})",
            attr = simple.attribute
        );
    }

    format!(
        "{} {} {}",
        simple.attribute,
        simple.operator.as_wire_token(),
        literal(&simple.value, attribute_type)
    )
}

/// Render one comparison value as a grammar literal
fn literal(value: &Value, attribute_type: Option<AttributeDataType>) -> String {
    match value {
        Value::String(s) => {
            if matches!(
                attribute_type,
                Some(AttributeDataType::Timestamp) | Some(AttributeDataType::Date)
            ) {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                    let normalized = parsed
                        .with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::Secs, true);
                    return format!("datetime'{}'", normalized);
                }
            }
            format!("'{}'", s.replace('\'', "''"))
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// Minimal percent encoding for query option values
pub fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'\''
            | b'(' | b')' | b'*' | b',' | b':' => encoded.push(byte as char),
            b' ' => encoded.push_str("%20"),
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use serde_json::json;

    fn no_types(_: &str) -> Option<AttributeDataType> {
        None
    }

    #[test]
    fn test_simple_condition_grammar() {
        let condition = ComplexCondition::and(vec![Condition::eq("region", json!("EMEA"))]);
        assert_eq!(
            serialize_complex(&condition, &no_types).unwrap(),
            "region eq 'EMEA'"
        );
    }

    #[test]
    fn test_nested_and_or() {
        let condition = ComplexCondition::and(vec![
            Condition::eq("region", json!("EMEA")),
            Condition::Complex(ComplexCondition::or(vec![
                Condition::eq("status", json!("open")),
                Condition::eq("status", json!("pending")),
            ])),
        ]);

        assert_eq!(
            serialize_complex(&condition, &no_types).unwrap(),
            "(region eq 'EMEA' and (status eq 'open' or status eq 'pending'))"
        );
    }

    #[test]
    fn test_quote_escaping() {
        let condition = ComplexCondition::and(vec![Condition::eq("name", json!("O'Brien"))]);
        assert_eq!(
            serialize_complex(&condition, &no_types).unwrap(),
            "name eq 'O''Brien'"
        );
    }

    #[test]
    fn test_between_expands_to_range() {
        let condition = ComplexCondition::and(vec![Condition::Simple(
            SimpleCondition::between("price", json!(10), json!(99)),
        )]);
        assert_eq!(
            serialize_complex(&condition, &no_types).unwrap(),
            "(price ge 10 and price le 99)"
        );
    }

    #[test]
    fn test_timestamp_literal() {
        let lookup = |attr: &str| {
            (attr == "created_at").then_some(AttributeDataType::Timestamp)
        };
        let condition = ComplexCondition::and(vec![Condition::Simple(SimpleCondition::new(
            "created_at",
            ComparisonOperator::Ge,
            json!("2026-03-01T08:30:00+01:00"),
        ))]);

        assert_eq!(
            serialize_complex(&condition, &lookup).unwrap(),
            "created_at ge datetime'2026-03-01T07:30:00Z'"
        );
    }

    #[test]
    fn test_search_query_options() {
        let scope = DataSource::new(
            "sales",
            "Sales Orders",
            crate::datasource::DataSourceType::BusinessObject,
        );
        let query = SearchQuery::new(
            Filter::new("sales")
                .with_search_term("laptop pro")
                .with_condition(Condition::eq("region", json!("EMEA"))),
        )
        .with_paging(10, 25)
        .with_sort("price", SortDirection::Descending)
        .with_facets(true);

        let options = search_query_options(&query, &scope, &no_types);
        assert!(options.contains("datasource=sales"));
        assert!(options.contains("$skip=10"));
        assert!(options.contains("$top=25"));
        assert!(options.contains("searchterm=laptop%20pro"));
        assert!(options.contains("$filter=region%20eq%20'EMEA'"));
        assert!(options.contains("$orderby=price%20desc"));
        assert!(options.contains("facets=all"));
        assert!(options.contains("facetlimit=5"));
    }

    #[test]
    fn test_grouping_scope_carries_member_list() {
        let scope = DataSource::new(
            "$$UserCategory$$favorites",
            "My Favorites",
            crate::datasource::DataSourceType::Category,
        )
        .with_sub_data_sources(vec!["sales".into(), "docs".into()]);

        let options = scope_options(&scope);
        assert_eq!(options[0], "datasource=%24%24UserCategory%24%24favorites");
        assert_eq!(options[1], "subdatasources=sales,docs");
    }
}
