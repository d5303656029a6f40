//! Query engines.
//!
//! A query engine executes a bound [`ExecutionRequest`] and returns the rows
//! together with their cache metadata. Engines never retry; failures are
//! returned as opaque errors for the endpoint to report.

pub mod memory;
pub mod query_builder;
pub mod sql;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::collection::{Execution, ExecutionRequest, ExecutionRow, QueryDefinition};
use crate::metrics::Metrics;

pub use memory::{Dataset, MemoryQueryEngine};
pub use query_builder::CollectionQueryBuilder;
pub use sql::SqlQueryEngine;

/// Executes collection queries.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Execute a request.
    async fn execute(&self, request: &ExecutionRequest) -> Result<Execution>;

    /// Whether the engine's backing store is reachable.
    async fn healthy(&self) -> bool {
        true
    }

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Engine wrapper recording execution time.
pub struct InstrumentedEngine {
    inner: Arc<dyn QueryEngine>,
    metrics: Arc<Metrics>,
}

impl InstrumentedEngine {
    pub fn new(inner: Arc<dyn QueryEngine>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl QueryEngine for InstrumentedEngine {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Execution> {
        let start = Instant::now();
        let result = self.inner.execute(request).await;
        self.metrics
            .record_engine(self.inner.name(), start.elapsed().as_secs_f64());
        result
    }

    async fn healthy(&self) -> bool {
        self.inner.healthy().await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Cache tag invalidated whenever rows of `base_table` change.
pub fn list_cache_tag(base_table: &str) -> String {
    format!("{base_table}_list")
}

/// Build a result row from a flat record.
///
/// The id column is required; a missing or null subtype leaves the row
/// without one, which the mapper later rejects.
pub fn row_from_record(
    definition: &QueryDefinition,
    record: &Map<String, Value>,
) -> Result<ExecutionRow> {
    let id = record
        .get(&definition.id_field)
        .and_then(scalar_text)
        .with_context(|| format!("record has no '{}' value", definition.id_field))?;

    let subtype = record.get(&definition.subtype_field).and_then(scalar_text);

    let attributes = if definition.fields.is_empty() {
        record
            .iter()
            .filter(|(key, _)| **key != definition.id_field && **key != definition.subtype_field)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    } else {
        definition
            .fields
            .iter()
            .map(|field| {
                (
                    field.clone(),
                    record.get(field).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    };

    Ok(ExecutionRow {
        id,
        entity_kind: definition.entity_kind.clone(),
        subtype,
        attributes,
    })
}

/// Text form of a scalar JSON value. Booleans render as `1`/`0`.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(String::from(if *b { "1" } else { "0" })),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
