//! PostgreSQL query engine.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::query_builder::CollectionQueryBuilder;
use super::{QueryEngine, list_cache_tag, row_from_record};
use crate::collection::{CacheMetadata, Execution, ExecutionRequest, ExecutionResult};
use crate::db;

/// Executes collection queries against PostgreSQL.
pub struct SqlQueryEngine {
    pool: PgPool,
}

impl SqlQueryEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryEngine for SqlQueryEngine {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Execution> {
        let definition = &request.definition;
        let builder = CollectionQueryBuilder::new(definition, &request.filters);

        // Count and page are read in one transaction so they agree.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        let total = if request.count_total {
            let count_sql = builder.build_count();
            let total: i64 = sqlx::query_scalar(&count_sql)
                .fetch_one(&mut *tx)
                .await
                .context("failed to execute count query")?;
            Some(u64::try_from(total).unwrap_or(0))
        } else {
            None
        };

        let main_sql = builder.build(request.offset(), request.limit);
        let records: Vec<serde_json::Value> =
            sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({main_sql}) t"))
                .fetch_all(&mut *tx)
                .await
                .context("failed to execute main query")?;

        tx.commit()
            .await
            .context("failed to commit query transaction")?;

        let rows = records
            .iter()
            .map(|record| {
                let record = record
                    .as_object()
                    .context("row_to_json returned a non-object")?;
                row_from_record(definition, record)
            })
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

    async fn healthy(&self) -> bool {
        db::check_health(&self.pool).await
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
