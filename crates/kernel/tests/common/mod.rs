#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! This module provides test infrastructure that uses the REAL kernel code:
//! the same router `main` serves, backed by the in-memory query engine.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use raccolta_kernel::collection::CollectionsConfig;
use raccolta_kernel::engine::MemoryQueryEngine;
use raccolta_kernel::{AppState, routes};
use raccolta_test_utils::{
    TestRecord, TestUser, anonymous_user, collections, dataset, rooms, test_record,
};

pub const SITE_URL: &str = "http://localhost:3000";
pub const BASE_PATH: &str = "/collections";

/// Dataset used by most tests.
///
/// Twelve published rooms (ids 1-12, created in id order), one unpublished
/// room (13) and one location.
pub fn fixture_records() -> Vec<TestRecord> {
    let mut records = rooms(12);
    records.push(
        test_record("room", "Room 13")
            .with_id("13")
            .created_at(13)
            .unpublished(),
    );
    records.push(
        test_record("location", "Lobby")
            .with_id("lobby")
            .created_at(1),
    );
    records
}

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Rooms fixture, anonymous caller.
    pub fn new() -> Self {
        Self::with_user(&anonymous_user())
    }

    /// Rooms fixture, given caller.
    pub fn with_user(user: &TestUser) -> Self {
        Self::build(
            collections::rooms_config(),
            dataset("item", fixture_records()),
            user,
        )
    }

    /// Custom collections and dataset.
    pub fn build(collections: Value, dataset: Value, user: &TestUser) -> Self {
        let collections: CollectionsConfig =
            serde_json::from_value(collections).expect("Invalid collections fixture");
        let engine = MemoryQueryEngine::from_yaml_str(&dataset.to_string())
            .expect("Invalid dataset fixture");

        let state = AppState::build(
            &collections,
            Arc::new(engine),
            &user.permissions,
            SITE_URL,
            BASE_PATH,
        )
        .expect("Failed to initialize AppState");

        Self::from_state(state)
    }

    /// Wrap already-built state.
    pub fn from_state(state: AppState) -> Self {
        let router = routes::app_router(state.clone());
        Self { router, state }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a GET request.
    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}

/// Read a response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Response body is not UTF-8")
}

/// Ids `from..=to` as strings.
pub fn id_range(from: u32, to: u32) -> Vec<String> {
    (from..=to).map(|n| n.to_string()).collect()
}
