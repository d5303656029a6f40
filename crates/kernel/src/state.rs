//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::collection::{
    BaseUrlBuilder, BundleResourceTypeResolver, CollectionEndpoint, CollectionsConfig,
    PermissionAccessEvaluator, QueryRegistry, links::normalize_base_path,
};
use crate::config::Config;
use crate::db;
use crate::engine::{InstrumentedEngine, MemoryQueryEngine, QueryEngine, SqlQueryEngine};
use crate::metrics::Metrics;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Collection endpoint with its registry and collaborators.
    endpoint: CollectionEndpoint,

    /// Prometheus metrics.
    metrics: Arc<Metrics>,

    /// Normalized collection base path.
    base_path: String,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// Uses PostgreSQL when `DATABASE_URL` is set, otherwise the dataset file.
    pub async fn new(config: &Config) -> Result<Self> {
        let collections = config.load_collections()?;

        let engine: Arc<dyn QueryEngine> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections).await?;
                info!("PostgreSQL connection established");
                Arc::new(SqlQueryEngine::new(pool))
            }
            None => {
                let engine = MemoryQueryEngine::from_yaml_file(&config.dataset_file)?;
                info!(dataset = %config.dataset_file.display(), "in-memory dataset loaded");
                Arc::new(engine)
            }
        };

        Self::build(
            &collections,
            engine,
            &config.granted_permissions,
            &config.site_url,
            &config.base_path,
        )
    }

    /// Assemble state from already-loaded parts.
    pub fn build(
        collections: &CollectionsConfig,
        engine: Arc<dyn QueryEngine>,
        granted_permissions: &[String],
        site_url: &str,
        base_path: &str,
    ) -> Result<Self> {
        let resolver = Arc::new(BundleResourceTypeResolver::new(&collections.resource_types));
        let registry = QueryRegistry::from_config(collections, resolver.as_ref())
            .context("invalid collections configuration")?;
        info!(displays = registry.len(), "collections registered");

        let urls = BaseUrlBuilder::new(site_url, base_path)?;
        let metrics = Arc::new(Metrics::new());
        let engine = Arc::new(InstrumentedEngine::new(engine, Arc::clone(&metrics)));
        let access = PermissionAccessEvaluator::new(granted_permissions.iter().cloned());

        let endpoint = CollectionEndpoint::new(
            Arc::new(registry),
            engine,
            Arc::new(access),
            resolver,
            Arc::new(urls),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                endpoint,
                metrics,
                base_path: normalize_base_path(base_path),
            }),
        })
    }

    /// Get the collection endpoint.
    pub fn endpoint(&self) -> &CollectionEndpoint {
        &self.inner.endpoint
    }

    /// Get the query registry.
    pub fn registry(&self) -> &QueryRegistry {
        self.inner.endpoint.registry()
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// Normalized collection base path (empty for the root).
    pub fn base_path(&self) -> &str {
        &self.inner.base_path
    }

    /// Name of the query engine.
    pub fn engine_name(&self) -> &'static str {
        self.inner.endpoint.engine().name()
    }

    /// Check if the query engine is healthy.
    pub async fn engine_healthy(&self) -> bool {
        self.inner.endpoint.engine().healthy().await
    }
}
