//! Query model: condition trees, filters and query descriptors

mod condition;
mod filter;
mod search;

pub use condition::{
    ComparisonOperator, ComplexCondition, Condition, LogicalOperator, SimpleCondition,
    DATA_SOURCE_ATTRIBUTE,
};
pub use filter::Filter;
pub use search::{
    ChartQuery, EqualsMode, HierarchyQuery, SearchQuery, SortAttribute, SortDirection,
    SuggestionQuery,
};
