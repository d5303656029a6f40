//! Raccolta Kernel Library
//!
//! Serves registered queries as paginated, filterable JSON:API collections.
//! The main entry point for running the server is the `raccolta` binary.

pub mod collection;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{CollectionError, RegistryError, ValidationError};
pub use state::AppState;
