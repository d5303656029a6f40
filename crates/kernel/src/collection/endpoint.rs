//! Collection endpoint.
//!
//! Orchestrates one request: resolve the definition, check access, bind
//! filters, execute, paginate, map rows, and assemble the JSON:API document.
//! Every collaborator is injected at construction.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error};

use super::access::AccessEvaluator;
use super::filter::{self, PAGE_PARAM};
use super::links::{LinkKind, LinkSet, UrlBuilder, build_link};
use super::mapper::{ResourceObject, ResourceTypeResolver, map_rows};
use super::pager::{Pager, pager_links, requested_page};
use super::registry::QueryRegistry;
use super::types::{CacheMetadata, ExecutionRequest, QueryDefinition};
use crate::engine::QueryEngine;
use crate::error::CollectionError;

/// JSON:API media type.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// The `jsonapi` member of every document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonApiVersion {
    pub version: &'static str,
}

impl Default for JsonApiVersion {
    fn default() -> Self {
        Self { version: "1.0" }
    }
}

/// Top-level collection document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionDocument {
    pub jsonapi: JsonApiVersion,
    pub data: Vec<ResourceObject>,
    #[serde(skip_serializing_if = "LinkSet::is_empty")]
    pub links: LinkSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DocumentMeta>,
}

impl CollectionDocument {
    /// A document with no data and no links.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMeta {
    pub count: u64,
}

/// A successful collection response and its cache metadata.
#[derive(Debug, Clone)]
pub struct CollectionResponse {
    pub document: CollectionDocument,
    pub cache: CacheMetadata,
}

impl IntoResponse for CollectionResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSONAPI_MEDIA_TYPE),
        );
        cache_headers(&self.cache, &mut headers);

        (StatusCode::OK, headers, axum::Json(self.document)).into_response()
    }
}

fn cache_headers(cache: &CacheMetadata, headers: &mut HeaderMap) {
    let joined = |values: &std::collections::BTreeSet<String>| {
        values.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    };

    if !cache.contexts.is_empty()
        && let Ok(value) = HeaderValue::from_str(&joined(&cache.contexts))
    {
        headers.insert("x-cache-contexts", value);
    }
    if !cache.tags.is_empty()
        && let Ok(value) = HeaderValue::from_str(&joined(&cache.tags))
    {
        headers.insert("x-cache-tags", value);
    }

    let control = match cache.max_age {
        Some(age) if age > 0 => format!("max-age={age}, public"),
        _ => "no-cache".to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
}

/// Serves collection displays.
pub struct CollectionEndpoint {
    registry: Arc<QueryRegistry>,
    engine: Arc<dyn QueryEngine>,
    access: Arc<dyn AccessEvaluator>,
    resolver: Arc<dyn ResourceTypeResolver>,
    urls: Arc<dyn UrlBuilder>,
}

impl CollectionEndpoint {
    pub fn new(
        registry: Arc<QueryRegistry>,
        engine: Arc<dyn QueryEngine>,
        access: Arc<dyn AccessEvaluator>,
        resolver: Arc<dyn ResourceTypeResolver>,
        urls: Arc<dyn UrlBuilder>,
    ) -> Self {
        Self {
            registry,
            engine,
            access,
            resolver,
            urls,
        }
    }

    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    /// Handle a request from its raw query pairs.
    ///
    /// The page number is validated only once the display has resolved and
    /// the caller has been let in, so unknown displays stay 404 and denied
    /// callers always get the empty 403 document.
    pub async fn handle_query(
        &self,
        collection: &str,
        display_name: &str,
        params: &[(String, String)],
    ) -> Result<CollectionResponse, CollectionError> {
        let definition = self.authorize(collection, display_name)?;
        let page = requested_page(params)?;
        self.run(&definition, params, page).await
    }

    /// Handle one collection request.
    pub async fn handle(
        &self,
        collection: &str,
        display_name: &str,
        params: &[(String, String)],
        requested_page: u32,
    ) -> Result<CollectionResponse, CollectionError> {
        let definition = self.authorize(collection, display_name)?;
        self.run(&definition, params, requested_page).await
    }

    /// Resolve a display and check the caller may read it.
    fn authorize(
        &self,
        collection: &str,
        display_name: &str,
    ) -> Result<Arc<QueryDefinition>, CollectionError> {
        let definition = self.registry.resolve(collection, display_name)?;

        if !self.access.is_allowed(&definition, display_name) {
            debug!(collection, display = display_name, "access denied");
            return Err(CollectionError::Forbidden);
        }

        Ok(definition)
    }

    async fn run(
        &self,
        definition: &Arc<QueryDefinition>,
        params: &[(String, String)],
        requested_page: u32,
    ) -> Result<CollectionResponse, CollectionError> {
        let collection = definition.collection.as_str();
        let display_name = definition.display.as_str();

        let filters = filter::bind(definition, &filter::exposed_input(params))?;

        let pager = Pager::for_definition(definition);
        let page = pager.effective_page(requested_page);
        let request = ExecutionRequest {
            definition: Arc::clone(definition),
            filters,
            page,
            limit: pager.fetch_limit(),
            count_total: pager.counts_total(),
        };

        let execution = self.engine.execute(&request).await.map_err(|e| {
            error!(
                collection,
                display = display_name,
                error = %format!("{e:#}"),
                "query engine failure"
            );
            CollectionError::Engine(e)
        })?;

        let window = pager.window(&execution.result);
        let links = pager_links(
            window.as_ref(),
            page,
            collection,
            display_name,
            params,
            self.urls.as_ref(),
        );

        let meta = execution
            .result
            .total
            .filter(|_| definition.pager.show_count)
            .map(|count| DocumentMeta { count });

        let data = map_rows(execution.result, self.resolver.as_ref()).inspect_err(|e| {
            error!(
                collection,
                display = display_name,
                error = %e,
                "result row could not be mapped"
            );
        })?;

        let cache = request_cache(definition, &pager).merge(execution.cache);

        Ok(CollectionResponse {
            document: CollectionDocument {
                jsonapi: JsonApiVersion::default(),
                data,
                links,
                meta,
            },
            cache,
        })
    }

    /// Entry-point document linking every display the caller may read.
    pub fn entry_point(&self) -> CollectionDocument {
        let mut links = LinkSet::default();

        for definition in self.registry.definitions() {
            if !self.access.is_allowed(definition, &definition.display) {
                continue;
            }
            let (key, link) = build_link(
                &LinkKind::Items {
                    collection: &definition.collection,
                    display: &definition.display,
                },
                self.urls.as_ref(),
            );
            links.insert(key, link);
        }

        CollectionDocument {
            links,
            ..CollectionDocument::empty()
        }
    }
}

/// Cache metadata contributed by the request itself.
fn request_cache(definition: &QueryDefinition, pager: &Pager) -> CacheMetadata {
    let mut cache = CacheMetadata::default().with_max_age(definition.cache_max_age);
    if pager.is_paged() {
        cache = cache.with_context(format!("url.query_args:{PAGE_PARAM}"));
    }
    for param in &definition.filters {
        cache = cache.with_context(format!("url.query_args:{}", param.name));
    }
    cache
}
