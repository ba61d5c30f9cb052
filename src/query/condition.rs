//! Logical condition trees over data source attributes
//!
//! Conditions are plain data: providers serialize them into their native
//! filter grammar, facet reconciliation compares them structurally, and the
//! executor rewrites them when deriving chart or folder sub-queries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Reserved attribute id for conditions that select a data source rather
/// than filter an attribute. Used by the "Search In" facet and by the
/// multi-provider when remapping federated ids to child-native ids.
pub const DATA_SOURCE_ATTRIBUTE: &str = "$$DataSource$$";

/// Comparison operator of a simple condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// Equals
    Eq,
    /// Not equals
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Contains
    Co,
    /// Begins with
    Bw,
    /// Ends with
    Ew,
    /// Closed range; the condition carries both bounds
    Between,
    /// All nodes below a hierarchy node, any depth
    DescendantOf,
    /// Immediate children of a hierarchy node
    ChildOf,
}

impl ComparisonOperator {
    /// Wire token in the backend filter grammar
    pub fn as_wire_token(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::Ne => "ne",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Le => "le",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Ge => "ge",
            ComparisonOperator::Co => "co",
            ComparisonOperator::Bw => "bw",
            ComparisonOperator::Ew => "ew",
            ComparisonOperator::Between => "between",
            ComparisonOperator::DescendantOf => "descendantof",
            ComparisonOperator::ChildOf => "childof",
        }
    }
}

/// Logical operator of a complex condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    And,
    Or,
}

/// A single attribute comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleCondition {
    /// Attribute id the condition applies to
    pub attribute: String,

    /// Comparison operator
    pub operator: ComparisonOperator,

    /// Comparison value (low bound for `Between`)
    pub value: Value,

    /// High bound for `Between`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_value: Option<Value>,

    /// User-facing label for the value, used when synthesizing facet items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_label: Option<String>,

    /// Whether the condition was entered by the user (vs. derived)
    #[serde(default)]
    pub user_defined: bool,
}

impl SimpleCondition {
    pub fn new(attribute: impl Into<String>, operator: ComparisonOperator, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value,
            high_value: None,
            value_label: None,
            user_defined: false,
        }
    }

    pub fn between(attribute: impl Into<String>, low: Value, high: Value) -> Self {
        Self {
            attribute: attribute.into(),
            operator: ComparisonOperator::Between,
            value: low,
            high_value: Some(high),
            value_label: None,
            user_defined: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.value_label = Some(label.into());
        self
    }

    /// Label shown for this condition in a synthesized facet item
    pub fn display_label(&self) -> String {
        if let Some(ref label) = self.value_label {
            return label.clone();
        }
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A logical combination of nested conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexCondition {
    pub operator: LogicalOperator,
    pub conditions: Vec<Condition>,
}

impl ComplexCondition {
    pub fn and(conditions: Vec<Condition>) -> Self {
        Self {
            operator: LogicalOperator::And,
            conditions,
        }
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Self {
            operator: LogicalOperator::Or,
            conditions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn add(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Attribute ids referenced anywhere below this node, in deterministic
    /// (lexicographic) order. The data source pseudo attribute is excluded.
    pub fn referenced_attributes(&self) -> BTreeSet<String> {
        let mut attributes = BTreeSet::new();
        collect_attributes(&self.conditions, &mut attributes);
        attributes
    }

    /// All simple conditions on one attribute, in document order
    pub fn conditions_for_attribute(&self, attribute: &str) -> Vec<&SimpleCondition> {
        let mut found = Vec::new();
        collect_for_attribute(&self.conditions, attribute, &mut found);
        found
    }

    /// Remove every simple condition on `attribute`, pruning complex nodes
    /// that become empty. Returns the number of removed conditions.
    pub fn remove_attribute_conditions(&mut self, attribute: &str) -> usize {
        remove_attribute(&mut self.conditions, attribute)
    }

    /// Rewrite the operator of every simple condition on `attribute` that
    /// currently uses `from`. Returns the number of rewritten conditions.
    pub fn rewrite_operator(
        &mut self,
        attribute: &str,
        from: ComparisonOperator,
        to: ComparisonOperator,
    ) -> usize {
        rewrite_operator(&mut self.conditions, attribute, from, to)
    }

    /// Whether any simple condition on `attribute` uses `operator`
    pub fn has_operator(&self, attribute: &str, operator: ComparisonOperator) -> bool {
        self.conditions_for_attribute(attribute)
            .iter()
            .any(|c| c.operator == operator)
    }

    /// Rewrite data-source-reference values through `map`. Used when routing
    /// a federated query to a single child provider: conditions that name a
    /// multi id must name the child's native id on the wire, and vice versa
    /// on the way back.
    pub fn rewrite_data_source_refs(&mut self, map: &dyn Fn(&str) -> Option<String>) {
        rewrite_ds_refs(&mut self.conditions, map);
    }
}

/// A node in the condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Condition {
    Simple(SimpleCondition),
    Complex(ComplexCondition),
}

impl Condition {
    pub fn eq(attribute: impl Into<String>, value: Value) -> Self {
        Condition::Simple(SimpleCondition::new(attribute, ComparisonOperator::Eq, value))
    }

    /// Condition selecting a data source (reserved pseudo attribute)
    pub fn data_source(id: impl Into<String>) -> Self {
        Condition::Simple(SimpleCondition::new(
            DATA_SOURCE_ATTRIBUTE,
            ComparisonOperator::Eq,
            Value::String(id.into()),
        ))
    }

    pub fn as_simple(&self) -> Option<&SimpleCondition> {
        match self {
            Condition::Simple(simple) => Some(simple),
            Condition::Complex(_) => None,
        }
    }
}

impl From<SimpleCondition> for Condition {
    fn from(simple: SimpleCondition) -> Self {
        Condition::Simple(simple)
    }
}

impl From<ComplexCondition> for Condition {
    fn from(complex: ComplexCondition) -> Self {
        Condition::Complex(complex)
    }
}

fn collect_attributes(conditions: &[Condition], out: &mut BTreeSet<String>) {
    for condition in conditions {
        match condition {
            Condition::Simple(simple) => {
                if simple.attribute != DATA_SOURCE_ATTRIBUTE {
                    out.insert(simple.attribute.clone());
                }
            }
            Condition::Complex(complex) => collect_attributes(&complex.conditions, out),
        }
    }
}

fn collect_for_attribute<'a>(
    conditions: &'a [Condition],
    attribute: &str,
    out: &mut Vec<&'a SimpleCondition>,
) {
    for condition in conditions {
        match condition {
            Condition::Simple(simple) if simple.attribute == attribute => out.push(simple),
            Condition::Simple(_) => {}
            Condition::Complex(complex) => {
                collect_for_attribute(&complex.conditions, attribute, out)
            }
        }
    }
}

fn remove_attribute(conditions: &mut Vec<Condition>, attribute: &str) -> usize {
    let mut removed = 0;
    conditions.retain_mut(|condition| match condition {
        Condition::Simple(simple) => {
            if simple.attribute == attribute {
                removed += 1;
                false
            } else {
                true
            }
        }
        Condition::Complex(complex) => {
            removed += remove_attribute(&mut complex.conditions, attribute);
            !complex.conditions.is_empty()
        }
    });
    removed
}

fn rewrite_operator(
    conditions: &mut [Condition],
    attribute: &str,
    from: ComparisonOperator,
    to: ComparisonOperator,
) -> usize {
    let mut rewritten = 0;
    for condition in conditions {
        match condition {
            Condition::Simple(simple) => {
                if simple.attribute == attribute && simple.operator == from {
                    simple.operator = to;
                    rewritten += 1;
                }
            }
            Condition::Complex(complex) => {
                rewritten += rewrite_operator(&mut complex.conditions, attribute, from, to);
            }
        }
    }
    rewritten
}

fn rewrite_ds_refs(conditions: &mut [Condition], map: &dyn Fn(&str) -> Option<String>) {
    for condition in conditions {
        match condition {
            Condition::Simple(simple) if simple.attribute == DATA_SOURCE_ATTRIBUTE => {
                if let Value::String(ref id) = simple.value {
                    if let Some(mapped) = map(id) {
                        simple.value = Value::String(mapped);
                    }
                }
            }
            Condition::Simple(_) => {}
            Condition::Complex(complex) => rewrite_ds_refs(&mut complex.conditions, map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> ComplexCondition {
        ComplexCondition::and(vec![
            Condition::eq("region", json!("EMEA")),
            Condition::Complex(ComplexCondition::or(vec![
                Condition::eq("status", json!("open")),
                Condition::eq("status", json!("pending")),
            ])),
            Condition::Simple(SimpleCondition::between("price", json!(10), json!(99))),
        ])
    }

    #[test]
    fn test_referenced_attributes_ordered() {
        let tree = sample_tree();
        let attributes: Vec<String> = tree.referenced_attributes().into_iter().collect();
        assert_eq!(attributes, vec!["price", "region", "status"]);
    }

    #[test]
    fn test_conditions_for_attribute_recurses() {
        let tree = sample_tree();
        assert_eq!(tree.conditions_for_attribute("status").len(), 2);
        assert_eq!(tree.conditions_for_attribute("region").len(), 1);
        assert!(tree.conditions_for_attribute("missing").is_empty());
    }

    #[test]
    fn test_remove_prunes_empty_complex_nodes() {
        let mut tree = sample_tree();
        let removed = tree.remove_attribute_conditions("status");
        assert_eq!(removed, 2);
        // The inner OR node became empty and must be gone entirely
        assert_eq!(tree.conditions.len(), 2);
        assert!(tree.conditions_for_attribute("status").is_empty());
    }

    #[test]
    fn test_rewrite_operator() {
        let mut tree = ComplexCondition::and(vec![
            Condition::Simple(SimpleCondition::new(
                "folder",
                ComparisonOperator::DescendantOf,
                json!("node-7"),
            )),
            Condition::eq("region", json!("EMEA")),
        ]);

        let rewritten = tree.rewrite_operator(
            "folder",
            ComparisonOperator::DescendantOf,
            ComparisonOperator::ChildOf,
        );

        assert_eq!(rewritten, 1);
        assert!(tree.has_operator("folder", ComparisonOperator::ChildOf));
        assert!(!tree.has_operator("folder", ComparisonOperator::DescendantOf));
    }

    #[test]
    fn test_structural_equality() {
        let a = Condition::eq("region", json!("EMEA"));
        let b = Condition::eq("region", json!("EMEA"));
        let c = Condition::eq("region", json!("APJ"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_rewrite_data_source_refs() {
        let mut tree = ComplexCondition::and(vec![
            Condition::data_source("erp:SalesOrder"),
            Condition::eq("region", json!("EMEA")),
        ]);

        tree.rewrite_data_source_refs(&|id| {
            id.strip_prefix("erp:").map(|native| native.to_string())
        });

        let simple = tree.conditions[0].as_simple().unwrap();
        assert_eq!(simple.value, json!("SalesOrder"));
        // Non data-source conditions are untouched
        let other = tree.conditions[1].as_simple().unwrap();
        assert_eq!(other.value, json!("EMEA"));
    }
}
