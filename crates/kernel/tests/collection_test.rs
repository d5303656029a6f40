#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for collection endpoints.

mod common;

use axum::http::{StatusCode, header};
use serde_json::json;

use common::{TestApp, body_json, body_text, fixture_records, id_range};
use raccolta_test_utils::{assert, collections, dataset, editor_user, test_record};

// -------------------------------------------------------------------------
// Paging
// -------------------------------------------------------------------------

#[tokio::test]
async fn rooms_page_one_links_both_ways() {
    let app = TestApp::new();

    let response = app.get("/collections/rooms/page?status=1&page=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.api+json"
    );

    let body = body_json(response).await;
    assert_eq!(assert::data_ids(&body), id_range(6, 10));
    assert_eq!(body["jsonapi"]["version"], "1.0");
    assert_eq!(body["meta"]["count"], 12);
    assert_eq!(
        body["links"]["prev"]["href"],
        "http://localhost:3000/collections/rooms/page?status=1&page=0"
    );
    assert_eq!(
        body["links"]["next"]["href"],
        "http://localhost:3000/collections/rooms/page?status=1&page=2"
    );
}

#[tokio::test]
async fn first_page_has_no_prev() {
    let app = TestApp::new();

    let body = body_json(app.get("/collections/rooms/page").await).await;
    assert_eq!(assert::data_ids(&body), id_range(1, 5));
    assert::lacks_key(&body["links"], "prev");
    assert_eq!(
        body["links"]["next"]["href"],
        "http://localhost:3000/collections/rooms/page?page=1"
    );
}

#[tokio::test]
async fn last_page_is_partial_without_next() {
    let app = TestApp::new();

    let body = body_json(app.get("/collections/rooms/page?page=2").await).await;
    assert_eq!(assert::data_ids(&body), id_range(11, 12));
    assert::has_key(&body["links"], "prev");
    assert::lacks_key(&body["links"], "next");
}

#[tokio::test]
async fn out_of_range_page_is_empty() {
    let app = TestApp::new();

    let response = app.get("/collections/rooms/page?page=10").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"], json!([]));
    assert::lacks_key(&body["links"], "next");
}

#[tokio::test]
async fn bracketed_filter_survives_page_links() {
    let app = TestApp::new();

    let body = body_json(
        app.get("/collections/rooms/page?filter%5Btitle%5D=room&page=1")
            .await,
    )
    .await;
    assert_eq!(assert::data_ids(&body), id_range(6, 10));

    for rel in ["prev", "next"] {
        let href = body["links"][rel]["href"].as_str().unwrap();
        assert::contains(href, "filter[title]=room");
    }
}

#[tokio::test]
async fn limited_display_has_no_links() {
    let app = TestApp::new();

    let body = body_json(app.get("/collections/rooms/block?page=2").await).await;
    assert_eq!(assert::data_ids(&body), id_range(1, 3));
    assert::lacks_key(&body, "links");
}

#[tokio::test]
async fn unlimited_display_returns_every_row_in_order() {
    let app = TestApp::new();

    let body = body_json(app.get("/collections/rooms/all").await).await;
    assert_eq!(assert::data_ids(&body), id_range(1, 12));
    assert::lacks_key(&body, "links");
}

#[tokio::test]
async fn mini_pager_guesses_next_from_full_page() {
    let app = TestApp::new();

    let body = body_json(app.get("/collections/rooms/mini").await).await;
    assert_eq!(assert::data_ids(&body).len(), 5);
    assert::has_key(&body["links"], "next");
    assert::lacks_key(&body, "meta");

    let body = body_json(app.get("/collections/rooms/mini?page=2").await).await;
    assert_eq!(assert::data_ids(&body), id_range(11, 12));
    assert::lacks_key(&body["links"], "next");
    assert::has_key(&body["links"], "prev");
}

// -------------------------------------------------------------------------
// Filters
// -------------------------------------------------------------------------

#[tokio::test]
async fn filter_key_spellings_bind_the_same_parameter() {
    let app = TestApp::new();

    for query in ["status=0", "filter%5Bstatus%5D=0", "views-filter%5Bstatus%5D=0"] {
        let body = body_json(app.get(&format!("/collections/rooms/all?{query}")).await).await;
        assert_eq!(assert::data_ids(&body), vec!["13"], "query: {query}");
    }
}

#[tokio::test]
async fn text_filter_is_case_insensitive() {
    let app = TestApp::new();

    let body = body_json(app.get("/collections/rooms/all?title=ROOM%201").await).await;
    assert_eq!(assert::data_ids(&body), vec!["1", "10", "11", "12"]);
}

#[tokio::test]
async fn unknown_filter_is_rejected() {
    let app = TestApp::new();

    let response = app.get("/collections/rooms/page?foo=1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["status"], "400");
    assert_eq!(body["errors"][0]["code"], "unknown_parameter");
    assert_eq!(body["errors"][0]["source"]["parameter"], "foo");
}

#[tokio::test]
async fn invalid_filter_value_is_rejected() {
    let app = TestApp::new();

    let response = app.get("/collections/rooms/page?status=2").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["code"], "invalid_value");
    assert_eq!(body["errors"][0]["source"]["parameter"], "status");
}

#[tokio::test]
async fn malformed_page_is_rejected() {
    let app = TestApp::new();

    let response = app.get("/collections/rooms/page?page=abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["source"]["parameter"], "page");
}

// -------------------------------------------------------------------------
// Lookup and access
// -------------------------------------------------------------------------

#[tokio::test]
async fn unknown_display_is_not_found() {
    let app = TestApp::new();

    for uri in [
        "/collections/rooms/nope",
        "/collections/nope/page",
        "/collections/accounts/page",
        "/collections/nope/page?page=abc",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {uri}");
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["code"], "not_found");
    }
}

#[tokio::test]
async fn denied_access_is_an_empty_collection() {
    let app = TestApp::new();

    let response = app.get("/collections/rooms/admin").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["data"], json!([]));
    assert::lacks_key(&body, "links");
    assert::lacks_key(&body, "errors");
}

#[tokio::test]
async fn denied_access_wins_over_malformed_input() {
    let app = TestApp::new();

    for uri in [
        "/collections/rooms/admin?page=abc",
        "/collections/rooms/admin?foo=1",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "uri: {uri}");

        let body = body_json(response).await;
        assert_eq!(body["data"], json!([]));
        assert::lacks_key(&body, "errors");
    }
}

#[tokio::test]
async fn permitted_caller_sees_malformed_page() {
    let app = TestApp::with_user(&editor_user());

    let response = app.get("/collections/rooms/admin?page=abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["source"]["parameter"], "page");
}

#[tokio::test]
async fn permitted_caller_reads_restricted_display() {
    let app = TestApp::with_user(&editor_user());

    let response = app.get("/collections/rooms/admin").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(assert::data_ids(&body), id_range(1, 5));
}

#[tokio::test]
async fn entry_point_lists_accessible_displays() {
    let app = TestApp::new();

    let body = body_json(app.get("/collections").await).await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(
        body["links"]["collections--rooms-page"]["href"],
        "http://localhost:3000/collections/rooms/page"
    );
    for display in ["mini", "block", "all"] {
        assert::has_key(&body["links"], &format!("collections--rooms-{display}"));
    }
    assert::lacks_key(&body["links"], "collections--rooms-admin");

    let editor = TestApp::with_user(&editor_user());
    let body = body_json(editor.get("/collections").await).await;
    assert::has_key(&body["links"], "collections--rooms-admin");
}

// -------------------------------------------------------------------------
// Resource objects and cache metadata
// -------------------------------------------------------------------------

#[tokio::test]
async fn rows_map_to_resource_objects() {
    let app = TestApp::new();

    let body = body_json(app.get("/collections/rooms/page").await).await;
    let first = &body["data"][0];
    assert_eq!(first["id"], "1");
    assert_eq!(first["type"], "node--room");
    assert_eq!(first["attributes"]["title"], "Room 1");
    assert::lacks_key(&first["attributes"], "id");
}

#[tokio::test]
async fn paged_display_cache_headers() {
    let app = TestApp::new();

    let response = app.get("/collections/rooms/page").await;
    let headers = response.headers();

    let contexts = headers["x-cache-contexts"].to_str().unwrap();
    assert::contains(contexts, "url.query_args:page");
    assert::contains(contexts, "url.query_args:status");
    assert::contains(contexts, "url.query_args:title");
    assert_eq!(headers["x-cache-tags"], "item_list");
    assert_eq!(headers[header::CACHE_CONTROL], "max-age=60, public");
}

#[tokio::test]
async fn limited_display_does_not_vary_by_page() {
    let app = TestApp::new();

    let response = app.get("/collections/rooms/block").await;
    let contexts = response.headers()["x-cache-contexts"].to_str().unwrap();
    assert::not_contains(contexts, "url.query_args:page");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
}

// -------------------------------------------------------------------------
// Failures
// -------------------------------------------------------------------------

#[tokio::test]
async fn engine_failure_is_bad_gateway() {
    let mut config = collections::rooms_config();
    config["collections"][0]["base_table"] = json!("missing");
    let app = TestApp::build(config, dataset("item", fixture_records()), &editor_user());

    let response = app.get("/collections/rooms/page").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["code"], "engine_failure");
    assert::not_contains(&body.to_string(), "missing");
}

#[tokio::test]
async fn unmappable_row_is_server_error() {
    let mut config = collections::rooms_config();
    config["collections"][0]["conditions"] = json!([]);

    let mut records = fixture_records();
    records.push(test_record("article", "Stray").with_id("stray").created_at(99));
    let app = TestApp::build(config, dataset("item", records), &editor_user());

    let response = app.get("/collections/rooms/all").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["code"], "unmappable_row");
}

// -------------------------------------------------------------------------
// Operational routes
// -------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_engine() {
    let app = TestApp::new();

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["engine"], "memory");
    assert_eq!(body["collections"], 5);
}

#[tokio::test]
async fn metrics_count_collection_requests() {
    let app = TestApp::new();

    app.get("/collections/rooms/page").await;
    app.get("/collections/nope/page").await;

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert::contains(&text, "collection_requests_total");
    assert::contains(&text, "collection=\"rooms\"");
    assert::contains(&text, "collection=\"unknown\"");
    assert::contains(&text, "engine_query_duration_seconds");
}
