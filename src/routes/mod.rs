//! HTTP routes for the gateway

pub mod health;
pub mod ngsi;
pub mod sync;

pub use health::{health_check, readiness_check, status_check, version_info};
pub use ngsi::{handle_get_entity, handle_query_entities, match_entity_route, EntityRoute};
pub use sync::{handle_sync, SyncTarget};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::GatewayError;

pub const JSON: &str = "application/json";
pub const JSON_LD: &str = "application/ld+json";

/// Error body: `{"error": "<Reason>", "detail": "<message>"}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

// =============================================================================
// Response Helpers
// =============================================================================

/// Response with a body, content type and the CORS origin header
pub fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    respond(status, JSON, json)
}

/// Map a gateway error to its status and JSON body
pub fn error_response(err: &GatewayError) -> Response<Full<Bytes>> {
    json_response(
        err.status_code(),
        &ErrorBody {
            error: err.reason(),
            detail: err.to_string(),
        },
    )
}

pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorBody {
            error: "NotFound",
            detail: format!("no route for {}", path),
        },
    )
}

pub fn method_not_allowed_response(method: &hyper::Method, path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorBody {
            error: "MethodNotAllowed",
            detail: format!("{} is not supported on {}", method, path),
        },
    )
}

/// CORS preflight
pub fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = respond(StatusCode::OK, JSON, String::new());
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

/// Decode a query string into `T`, or a `BadRequest`
pub(crate) fn parse_query<T: serde::de::DeserializeOwned>(query: Option<&str>) -> Result<T, GatewayError> {
    serde_urlencoded::from_str(query.unwrap_or(""))
        .map_err(|e| GatewayError::BadRequest(format!("invalid query parameters: {}", e)))
}
