//! Collection types.
//!
//! Provides type definitions for collection queries:
//! - CollectionsConfig: YAML declaration of collections and their displays
//! - QueryDefinition: One flattened (collection, display) pair, immutable once registered
//! - FilterParameter / ValueShape: Exposed filters and how their input is validated
//! - ExecutionRequest / ExecutionResult: What goes to and comes back from a query engine

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::filter::BoundFilters;

// -------------------------------------------------------------------------
// Configuration (deserialized from the collections file)
// -------------------------------------------------------------------------

/// Top-level collections file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionsConfig {
    /// Entity kind → subtypes that have a resource type.
    #[serde(default)]
    pub resource_types: BTreeMap<String, Vec<String>>,

    /// Declared collections.
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

/// A named, reusable query with one or more displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Machine name, used in routes.
    pub name: String,

    /// Human-readable label.
    pub label: Option<String>,

    /// Disabled collections are never registered.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entity kind of every result row (e.g. "node").
    pub entity_kind: String,

    /// Table or dataset the engine reads from.
    #[serde(default = "default_base_table")]
    pub base_table: String,

    /// Column holding the stable row identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Column holding the row subtype (bundle).
    #[serde(default = "default_subtype_field")]
    pub subtype_field: String,

    /// Attribute columns. Empty means every column except id and subtype.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Fixed conditions applied on every display.
    #[serde(default)]
    pub conditions: Vec<QueryCondition>,

    /// Exposed filter parameters.
    #[serde(default)]
    pub filters: Vec<FilterParameter>,

    /// Default sort order.
    #[serde(default)]
    pub sorts: Vec<QuerySort>,

    /// Displays of this collection.
    #[serde(default)]
    pub displays: Vec<DisplayConfig>,
}

/// A named variant of a collection with its own paging and access rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Machine name, used in routes.
    pub name: String,

    /// Human-readable label.
    pub label: Option<String>,

    /// Number of items per page (0 = all items).
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,

    /// Pager configuration.
    #[serde(default)]
    pub pager: PagerConfig,

    /// Who may read this display.
    #[serde(default)]
    pub access: AccessPolicy,

    /// Max-age in seconds for cache headers.
    pub cache_max_age: Option<u32>,

    /// Extra conditions, appended to the collection's.
    #[serde(default)]
    pub conditions: Vec<QueryCondition>,

    /// Sort override. When non-empty, replaces the collection's sorts.
    #[serde(default)]
    pub sorts: Vec<QuerySort>,
}

fn default_true() -> bool {
    true
}

fn default_base_table() -> String {
    "item".to_string()
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_subtype_field() -> String {
    "type".to_string()
}

fn default_items_per_page() -> u32 {
    10
}

// -------------------------------------------------------------------------
// Query definition
// -------------------------------------------------------------------------

/// One registered (collection, display) pair.
///
/// Built once at startup by the registry and shared behind `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub collection: String,
    pub display: String,
    pub label: String,
    pub entity_kind: String,
    pub base_table: String,
    pub id_field: String,
    pub subtype_field: String,
    pub fields: Vec<String>,
    pub conditions: Vec<QueryCondition>,
    pub filters: Vec<FilterParameter>,
    pub sorts: Vec<QuerySort>,
    pub items_per_page: u32,
    pub pager: PagerConfig,
    pub access: AccessPolicy,
    pub cache_max_age: Option<u32>,
}

impl QueryDefinition {
    /// Look up a declared exposed filter by name.
    pub fn filter(&self, name: &str) -> Option<&FilterParameter> {
        self.filters.iter().find(|f| f.name == name)
    }
}

impl Default for QueryDefinition {
    fn default() -> Self {
        Self {
            collection: String::new(),
            display: String::new(),
            label: String::new(),
            entity_kind: String::new(),
            base_table: default_base_table(),
            id_field: default_id_field(),
            subtype_field: default_subtype_field(),
            fields: Vec::new(),
            conditions: Vec::new(),
            filters: Vec::new(),
            sorts: Vec::new(),
            items_per_page: default_items_per_page(),
            pager: PagerConfig::default(),
            access: AccessPolicy::default(),
            cache_max_age: None,
        }
    }
}

/// Fixed condition (not caller-controlled).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCondition {
    /// Column to test.
    pub field: String,

    /// Comparison operator.
    #[serde(default)]
    pub operator: FilterOperator,

    /// Value to compare against.
    pub value: FilterValue,
}

/// Exposed filter parameter declared by a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterParameter {
    /// Parameter name as it appears in the query string.
    pub name: String,

    /// Column to filter on (defaults to `name`).
    pub field: Option<String>,

    /// Comparison operator.
    #[serde(default)]
    pub operator: FilterOperator,

    /// Accepted value shape.
    #[serde(default)]
    pub shape: ValueShape,

    /// Value used when the caller does not supply one.
    pub default: Option<String>,

    /// Label for documentation and UIs.
    pub label: Option<String>,
}

impl FilterParameter {
    /// Column this parameter filters on.
    pub fn field(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Exact match.
    #[default]
    Equals,
    /// Not equal.
    NotEquals,
    /// Case-insensitive substring match.
    Contains,
    /// Case-insensitive prefix match.
    StartsWith,
    /// Case-insensitive suffix match.
    EndsWith,
    /// Greater than.
    GreaterThan,
    /// Less than.
    LessThan,
    /// Greater than or equal.
    GreaterOrEqual,
    /// Less than or equal.
    LessOrEqual,
}

impl FilterOperator {
    /// Whether this operator does text matching.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith
        )
    }
}

/// Typed filter value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    /// String value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
}

impl FilterValue {
    /// Canonical query-string form. Booleans render as `1`/`0`.
    pub fn as_string(&self) -> String {
        match self {
            FilterValue::String(s) => s.clone(),
            FilterValue::Integer(i) => i.to_string(),
            FilterValue::Float(f) => f.to_string(),
            FilterValue::Boolean(b) => String::from(if *b { "1" } else { "0" }),
        }
    }

    /// Convert to integer if possible.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FilterValue::Integer(i) => Some(*i),
            FilterValue::Boolean(b) => Some(i64::from(*b)),
            FilterValue::String(s) => s.parse().ok(),
            FilterValue::Float(_) => None,
        }
    }

    /// Convert to float if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FilterValue::Integer(i) => Some(*i as f64),
            FilterValue::Float(f) => Some(*f),
            FilterValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FilterValue::String(s) => s.parse().ok(),
        }
    }
}

/// Accepted shape of an exposed filter value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueShape {
    /// Free text, optionally length-limited.
    String {
        #[serde(default)]
        max_length: Option<usize>,
    },
    /// Whole number within optional bounds.
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// `1`/`0`/`true`/`false`.
    Boolean,
    /// One of an enumerated set of values.
    Enum { values: Vec<String> },
}

impl Default for ValueShape {
    fn default() -> Self {
        ValueShape::String { max_length: None }
    }
}

impl ValueShape {
    /// Parse raw input against this shape.
    ///
    /// Returns a human-readable reason on failure.
    pub fn parse(&self, raw: &str) -> Result<FilterValue, String> {
        match self {
            ValueShape::String { max_length } => {
                if let Some(max) = max_length
                    && raw.chars().count() > *max
                {
                    return Err(format!("must be at most {max} characters"));
                }
                Ok(FilterValue::String(raw.to_string()))
            }
            ValueShape::Integer { min, max } => {
                let value: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| "must be an integer".to_string())?;
                if let Some(min) = min
                    && value < *min
                {
                    return Err(format!("must be at least {min}"));
                }
                if let Some(max) = max
                    && value > *max
                {
                    return Err(format!("must be at most {max}"));
                }
                Ok(FilterValue::Integer(value))
            }
            ValueShape::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(FilterValue::Boolean(true)),
                "0" | "false" => Ok(FilterValue::Boolean(false)),
                _ => Err("must be one of 1, 0, true, false".to_string()),
            },
            ValueShape::Enum { values } => {
                if values.iter().any(|v| v == raw) {
                    Ok(FilterValue::String(raw.to_string()))
                } else {
                    Err(format!("must be one of {}", values.join(", ")))
                }
            }
        }
    }
}

/// Sort specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySort {
    /// Field to sort by.
    pub field: String,

    /// Sort direction.
    #[serde(default)]
    pub direction: SortDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Pager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PagerConfig {
    /// Whether paging is enabled. A disabled pager with a positive
    /// `items_per_page` yields a limited display.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pager style.
    #[serde(default)]
    pub style: PagerStyle,

    /// Whether to report the total count in `meta.count`.
    #[serde(default = "default_true")]
    pub show_count: bool,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            style: PagerStyle::default(),
            show_count: true,
        }
    }
}

/// Pager styles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PagerStyle {
    /// Counts the total, so `next` is exact.
    #[default]
    Full,
    /// Skips the count query; `next` is offered whenever a full page came back.
    Mini,
}

/// Access rule for a display.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Anyone may read.
    #[default]
    Public,
    /// Caller must hold the named permission.
    Permission { permission: String },
}

// -------------------------------------------------------------------------
// Execution
// -------------------------------------------------------------------------

/// Input to a query engine for one request.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Definition being executed.
    pub definition: Arc<QueryDefinition>,

    /// Validated exposed filter values.
    pub filters: BoundFilters,

    /// Zero-indexed page.
    pub page: u32,

    /// Maximum rows to return. `None` returns every row.
    pub limit: Option<u32>,

    /// Whether the engine must report the total row count.
    pub count_total: bool,
}

impl ExecutionRequest {
    /// Row offset of the requested page.
    pub fn offset(&self) -> u64 {
        self.limit
            .map(|limit| u64::from(self.page) * u64::from(limit))
            .unwrap_or(0)
    }
}

/// One raw result row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRow {
    /// Stable identifier.
    pub id: String,

    /// Entity kind (e.g. "node").
    pub entity_kind: String,

    /// Subtype (bundle), when the row has one.
    pub subtype: Option<String>,

    /// Attribute values.
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Rows returned by a query engine, in query order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Rows of the requested page.
    pub rows: Vec<ExecutionRow>,

    /// Total matching rows, when counted.
    pub total: Option<u64>,

    /// Page the rows belong to.
    pub page: u32,
}

/// Cache-relevant facts about a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetadata {
    /// Request facets the response varies by (e.g. `url.query_args:page`).
    pub contexts: BTreeSet<String>,

    /// Tags invalidating the response when the underlying data changes.
    pub tags: BTreeSet<String>,

    /// Max-age in seconds. `None` means not cacheable.
    pub max_age: Option<u32>,
}

impl CacheMetadata {
    /// Add a cache context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    /// Add a cache tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Set the max-age, keeping the lower of the two when one is set.
    pub fn with_max_age(mut self, max_age: Option<u32>) -> Self {
        self.max_age = min_max_age(self.max_age, max_age);
        self
    }

    /// Union of contexts and tags; the lower max-age wins.
    pub fn merge(mut self, other: CacheMetadata) -> Self {
        self.contexts.extend(other.contexts);
        self.tags.extend(other.tags);
        self.max_age = min_max_age(self.max_age, other.max_age);
        self
    }
}

fn min_max_age(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Engine output: the result and its cache metadata, returned together.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    pub result: ExecutionResult,
    pub cache: CacheMetadata,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn display_defaults() {
        let display: DisplayConfig = serde_yml::from_str("name: page").unwrap();
        assert_eq!(display.items_per_page, 10);
        assert!(display.pager.enabled);
        assert_eq!(display.pager.style, PagerStyle::Full);
        assert_eq!(display.access, AccessPolicy::Public);
    }

    #[test]
    fn collection_defaults() {
        let collection: CollectionConfig =
            serde_yml::from_str("name: rooms\nentity_kind: node\n").unwrap();
        assert!(collection.enabled);
        assert_eq!(collection.base_table, "item");
        assert_eq!(collection.id_field, "id");
        assert_eq!(collection.subtype_field, "type");
    }

    #[test]
    fn value_shape_deserializes_tagged() {
        let shape: ValueShape = serde_yml::from_str("type: enum\nvalues: [\"0\", \"1\"]").unwrap();
        assert_eq!(
            shape,
            ValueShape::Enum {
                values: vec!["0".to_string(), "1".to_string()]
            }
        );

        let shape: ValueShape = serde_yml::from_str("type: integer\nmin: 1").unwrap();
        assert_eq!(
            shape,
            ValueShape::Integer {
                min: Some(1),
                max: None
            }
        );
    }

    #[test]
    fn enum_shape_accepts_only_declared_values() {
        let shape = ValueShape::Enum {
            values: vec!["0".to_string(), "1".to_string()],
        };
        assert_eq!(shape.parse("1"), Ok(FilterValue::String("1".to_string())));
        assert!(shape.parse("2").is_err());
    }

    #[test]
    fn integer_shape_enforces_bounds() {
        let shape = ValueShape::Integer {
            min: Some(1),
            max: Some(5),
        };
        assert_eq!(shape.parse("3"), Ok(FilterValue::Integer(3)));
        assert!(shape.parse("0").is_err());
        assert!(shape.parse("6").is_err());
        assert!(shape.parse("three").is_err());
    }

    #[test]
    fn boolean_shape_canonicalizes() {
        let value = ValueShape::Boolean.parse("true").unwrap();
        assert_eq!(value, FilterValue::Boolean(true));
        assert_eq!(value.as_string(), "1");
        assert_eq!(ValueShape::Boolean.parse("0").unwrap().as_string(), "0");
        assert!(ValueShape::Boolean.parse("yes").is_err());
    }

    #[test]
    fn string_shape_max_length() {
        let shape = ValueShape::String {
            max_length: Some(3),
        };
        assert!(shape.parse("abc").is_ok());
        assert!(shape.parse("abcd").is_err());
    }

    #[test]
    fn condition_value_untagged() {
        let condition: QueryCondition =
            serde_yml::from_str("field: status\nvalue: 1").unwrap();
        assert_eq!(condition.operator, FilterOperator::Equals);
        assert_eq!(condition.value, FilterValue::Integer(1));
    }

    #[test]
    fn cache_metadata_merge_keeps_lowest_max_age() {
        let a = CacheMetadata::default()
            .with_context("url.query_args:page")
            .with_max_age(Some(60));
        let b = CacheMetadata::default()
            .with_tag("item_list")
            .with_max_age(Some(30));

        let merged = a.merge(b);
        assert!(merged.contexts.contains("url.query_args:page"));
        assert!(merged.tags.contains("item_list"));
        assert_eq!(merged.max_age, Some(30));
    }

    #[test]
    fn execution_request_offset() {
        let request = ExecutionRequest {
            definition: Arc::new(QueryDefinition::default()),
            filters: BoundFilters::default(),
            page: 2,
            limit: Some(5),
            count_total: true,
        };
        assert_eq!(request.offset(), 10);

        let unlimited = ExecutionRequest {
            limit: None,
            ..request
        };
        assert_eq!(unlimited.offset(), 0);
    }
}
