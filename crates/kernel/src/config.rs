//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::collection::CollectionsConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Public site URL used for absolute links (default: http://localhost:{port}).
    pub site_url: String,

    /// Path prefix of collection routes (default: /collections).
    pub base_path: String,

    /// Collections definition file (default: ./collections.yml).
    pub collections_file: PathBuf,

    /// In-memory dataset, used when no database is configured (default: ./dataset.yml).
    pub dataset_file: PathBuf,

    /// PostgreSQL connection URL. When set, queries run against PostgreSQL.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Permissions granted to callers (comma-separated, default: "access content").
    pub granted_permissions: Vec<String>,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let site_url = env::var("SITE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let base_path = env::var("BASE_PATH").unwrap_or_else(|_| "/collections".to_string());

        let collections_file = env::var("COLLECTIONS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./collections.yml"));

        let dataset_file = env::var("DATASET_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./dataset.yml"));

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let granted_permissions = split_list(
            &env::var("GRANTED_PERMISSIONS").unwrap_or_else(|_| "access content".to_string()),
        );

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            site_url,
            base_path,
            collections_file,
            dataset_file,
            database_url,
            database_max_connections,
            granted_permissions,
            cors_allowed_origins,
        })
    }

    /// Read and parse the collections file.
    pub fn load_collections(&self) -> Result<CollectionsConfig> {
        let yaml = std::fs::read_to_string(&self.collections_file).with_context(|| {
            format!(
                "failed to read collections file {}",
                self.collections_file.display()
            )
        })?;
        serde_yml::from_str(&yaml).with_context(|| {
            format!(
                "failed to parse collections file {}",
                self.collections_file.display()
            )
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
