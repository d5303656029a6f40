//! Collection API routes.
//!
//! JSON:API endpoints for registered collection displays.

use std::time::Instant;

use axum::Router;
use axum::extract::{Path, RawQuery, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tracing::debug;

use crate::collection::{CacheMetadata, CollectionResponse};
use crate::metrics::UNKNOWN_LABEL;
use crate::state::AppState;

/// Create the collection router under `base_path`.
pub fn router(base_path: &str) -> Router<AppState> {
    let entry = if base_path.is_empty() { "/" } else { base_path };

    Router::new()
        .route(entry, get(entry_point))
        .route(
            &format!("{base_path}/{{collection}}/{{display}}"),
            get(get_collection),
        )
}

/// Split a raw query string into ordered, decoded pairs.
pub fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

async fn entry_point(State(state): State<AppState>) -> Response {
    CollectionResponse {
        document: state.endpoint().entry_point(),
        cache: CacheMetadata::default(),
    }
    .into_response()
}

async fn get_collection(
    State(state): State<AppState>,
    Path((collection, display_name)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Response {
    let start = Instant::now();
    let params = query_pairs(query.as_deref());

    let response = match state
        .endpoint()
        .handle_query(&collection, &display_name, &params)
        .await
    {
        Ok(response) => response.into_response(),
        Err(e) => {
            debug!(%collection, display = %display_name, error = %e, "collection request failed");
            e.into_response()
        }
    };

    // Unregistered names share one label to bound metric cardinality.
    let known = state.registry().resolve(&collection, &display_name).is_ok();
    let (collection_label, display_label) = if known {
        (collection.as_str(), display_name.as_str())
    } else {
        (UNKNOWN_LABEL, UNKNOWN_LABEL)
    };
    state.metrics().record_request(
        collection_label,
        display_label,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
