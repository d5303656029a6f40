//! In-memory query engine.
//!
//! Serves rows from a dataset loaded once at startup. Conditions, filters,
//! sorts and paging follow the same rules as the SQL engine: text operators
//! are case-insensitive, comparisons are numeric when both sides are
//! numbers, and null or missing values never match.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{QueryEngine, list_cache_tag, row_from_record, scalar_text};
use crate::collection::{
    CacheMetadata, Execution, ExecutionRequest, ExecutionResult, FilterOperator, FilterValue,
    QuerySort, SortDirection,
};

/// Record set keyed by table name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<Map<String, Value>>>,
}

/// Query engine over an in-memory [`Dataset`].
#[derive(Debug, Clone, Default)]
pub struct MemoryQueryEngine {
    dataset: Dataset,
}

impl MemoryQueryEngine {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    /// Parse a YAML dataset.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let dataset: Dataset = serde_yml::from_str(yaml).context("failed to parse dataset")?;
        Ok(Self::new(dataset))
    }

    /// Load a YAML dataset file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("in {}", path.display()))
    }

    /// Number of records in a table.
    pub fn table_len(&self, table: &str) -> Option<usize> {
        self.dataset.tables.get(table).map(Vec::len)
    }
}

#[async_trait]
impl QueryEngine for MemoryQueryEngine {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Execution> {
        let definition = &request.definition;
        let table = self
            .dataset
            .tables
            .get(&definition.base_table)
            .with_context(|| format!("unknown table '{}'", definition.base_table))?;

        let conditions = definition
            .conditions
            .iter()
            .map(|c| (c.field.as_str(), c.operator, &c.value));
        let filters = request
            .filters
            .iter()
            .map(|f| (f.field.as_str(), f.operator, &f.value));
        let predicates: Vec<_> = conditions.chain(filters).collect();

        let mut matched: Vec<&Map<String, Value>> = table
            .iter()
            .filter(|record| {
                predicates
                    .iter()
                    .all(|(field, operator, value)| matches(record.get(*field), *operator, value))
            })
            .collect();

        // Stable, so equal keys keep dataset order.
        matched.sort_by(|a, b| compare_records(a, b, &definition.sorts));

        let total = request.count_total.then_some(matched.len() as u64);

        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let limit = request.limit.map_or(usize::MAX, |limit| limit as usize);

        let rows = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|record| row_from_record(definition, record))
            .collect::<Result<Vec<_>>>()?;

        Ok(Execution {
            result: ExecutionResult {
                rows,
                total,
                page: request.page,
            },
            cache: CacheMetadata::default().with_tag(list_cache_tag(&definition.base_table)),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Whether a record value satisfies one predicate.
fn matches(actual: Option<&Value>, operator: FilterOperator, expected: &FilterValue) -> bool {
    let Some(actual) = actual.filter(|v| !v.is_null()) else {
        return false;
    };

    if operator.is_text() {
        let Some(text) = scalar_text(actual) else {
            return false;
        };
        let haystack = text.to_lowercase();
        let needle = expected.as_string().to_lowercase();
        return match operator {
            FilterOperator::Contains => haystack.contains(&needle),
            FilterOperator::StartsWith => haystack.starts_with(&needle),
            _ => haystack.ends_with(&needle),
        };
    }

    let Some(ordering) = compare_to_filter(actual, expected) else {
        return false;
    };

    match operator {
        FilterOperator::Equals => ordering == Ordering::Equal,
        FilterOperator::NotEquals => ordering != Ordering::Equal,
        FilterOperator::GreaterThan => ordering == Ordering::Greater,
        FilterOperator::LessThan => ordering == Ordering::Less,
        FilterOperator::GreaterOrEqual => ordering != Ordering::Less,
        FilterOperator::LessOrEqual => ordering != Ordering::Greater,
        FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => false,
    }
}

fn compare_to_filter(actual: &Value, expected: &FilterValue) -> Option<Ordering> {
    let numeric = as_number(actual).zip(expected.as_f64());
    if let Some((a, b)) = numeric {
        return a.partial_cmp(&b);
    }
    scalar_text(actual).map(|text| text.as_str().cmp(expected.as_string().as_str()))
}

/// Numeric reading of a value. `NaN` and infinities count as text.
fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn compare_records(
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    sorts: &[QuerySort],
) -> Ordering {
    for sort in sorts {
        let ordering = compare_values(a.get(&sort.field), b.get(&sort.field));
        let ordering = match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over record values: nulls, then numbers (numerically), then
/// everything else as text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => scalar_text(a).cmp(&scalar_text(b)),
        },
    }
}
