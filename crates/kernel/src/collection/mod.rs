//! Query-result collections.
//!
//! Exposes registered queries as paginated, filterable JSON:API collection
//! endpoints:
//! - Registry: (collection, display) → immutable query definition
//! - Filter binding: closed-set validation of caller filter input
//! - Pager: page windows and prev/next links
//! - Mapper: result rows → resource objects
//! - Endpoint: per-request orchestration

pub mod access;
pub mod endpoint;
pub mod filter;
pub mod links;
pub mod mapper;
pub mod pager;
pub mod registry;
pub mod types;

pub use access::{AccessEvaluator, PermissionAccessEvaluator};
pub use endpoint::{
    CollectionDocument, CollectionEndpoint, CollectionResponse, DocumentMeta, JSONAPI_MEDIA_TYPE,
    JsonApiVersion,
};
pub use filter::{BoundFilter, BoundFilters, PAGE_PARAM};
pub use links::{BaseUrlBuilder, Link, LinkKind, LinkSet, PageRelation, UrlBuilder, build_link};
pub use mapper::{BundleResourceTypeResolver, ResourceObject, ResourceTypeResolver, map_rows};
pub use pager::{MAX_ITEMS_PER_PAGE, PageWindow, Pager, compute_window};
pub use registry::{CollectionRoute, QueryRegistry, is_safe_identifier};
pub use types::{
    AccessPolicy, CacheMetadata, CollectionConfig, CollectionsConfig, DisplayConfig, Execution,
    ExecutionRequest, ExecutionResult, ExecutionRow, FilterOperator, FilterParameter, FilterValue,
    PagerConfig, PagerStyle, QueryCondition, QueryDefinition, QuerySort, SortDirection,
    ValueShape,
};
