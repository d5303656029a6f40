//! Application error types.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::collection::{CollectionDocument, JSONAPI_MEDIA_TYPE, JsonApiVersion};

/// Invalid caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown filter parameter '{0}'")]
    UnknownParameter(String),

    #[error("invalid value for parameter '{parameter}': {reason}")]
    InvalidValue { parameter: String, reason: String },
}

impl ValidationError {
    /// Name of the offending parameter.
    pub fn parameter(&self) -> &str {
        match self {
            ValidationError::UnknownParameter(name) => name,
            ValidationError::InvalidValue { parameter, .. } => parameter,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownParameter(_) => "unknown_parameter",
            ValidationError::InvalidValue { .. } => "invalid_value",
        }
    }
}

/// Request-scoped collection errors.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collection '{collection}' has no display '{display}'")]
    NotFound { collection: String, display: String },

    #[error("access denied")]
    Forbidden,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(
        "row '{row_id}' of kind '{entity_kind}' with subtype '{subtype}' has no resource type"
    )]
    UnmappableRow {
        row_id: String,
        entity_kind: String,
        subtype: String,
    },

    #[error("query engine failure")]
    Engine(#[source] anyhow::Error),
}

impl CollectionError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            CollectionError::NotFound { .. } => StatusCode::NOT_FOUND,
            CollectionError::Forbidden => StatusCode::FORBIDDEN,
            CollectionError::Validation(_) => StatusCode::BAD_REQUEST,
            CollectionError::UnmappableRow { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CollectionError::Engine(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            CollectionError::NotFound { .. } => "not_found",
            CollectionError::Forbidden => "forbidden",
            CollectionError::Validation(e) => e.code(),
            CollectionError::UnmappableRow { .. } => "unmappable_row",
            CollectionError::Engine(_) => "engine_failure",
        }
    }
}

/// JSON:API error document.
#[derive(Debug, Serialize)]
struct ErrorDocument {
    jsonapi: JsonApiVersion,
    errors: Vec<ErrorObject>,
}

#[derive(Debug, Serialize)]
struct ErrorObject {
    status: String,
    code: &'static str,
    title: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ErrorSource>,
}

#[derive(Debug, Serialize)]
struct ErrorSource {
    parameter: String,
}

impl IntoResponse for CollectionError {
    fn into_response(self) -> Response {
        let status = self.status();

        // A denied request still gets a collection document, just an empty one.
        if let CollectionError::Forbidden = self {
            return (
                status,
                [(header::CONTENT_TYPE, JSONAPI_MEDIA_TYPE)],
                axum::Json(CollectionDocument::empty()),
            )
                .into_response();
        }

        // Server-side failures stay vague; details are in the logs.
        let detail = match &self {
            CollectionError::UnmappableRow { .. } | CollectionError::Engine(_) => {
                "the collection could not be built".to_string()
            }
            _ => self.to_string(),
        };

        let source = match &self {
            CollectionError::Validation(e) => Some(ErrorSource {
                parameter: e.parameter().to_string(),
            }),
            _ => None,
        };

        let document = ErrorDocument {
            jsonapi: JsonApiVersion::default(),
            errors: vec![ErrorObject {
                status: status.as_u16().to_string(),
                code: self.code(),
                title: status.canonical_reason().unwrap_or("Error"),
                detail,
                source,
            }],
        };

        (
            status,
            [(header::CONTENT_TYPE, JSONAPI_MEDIA_TYPE)],
            axum::Json(document),
        )
            .into_response()
    }
}

/// Invalid collections configuration, detected at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("collection '{collection}' declares display '{display}' more than once")]
    DuplicateDisplay { collection: String, display: String },

    #[error("collection '{collection}' is declared more than once")]
    DuplicateCollection { collection: String },

    #[error("unsafe {what} '{value}'")]
    UnsafeIdentifier { what: &'static str, value: String },

    #[error("collection '{collection}' declares filter '{filter}' more than once")]
    DuplicateFilter { collection: String, filter: String },

    #[error("collection '{collection}' uses reserved filter name '{filter}'")]
    ReservedFilterName { collection: String, filter: String },

    #[error("collection '{collection}' filter '{filter}' has an invalid default: {reason}")]
    InvalidDefault {
        collection: String,
        filter: String,
        reason: String,
    },
}
