//! HTTP routes for Waymark
//!
//! Route modules own their handlers and response shapes; this module holds
//! the shared plumbing: JSON response helpers, the error-taxonomy mapping,
//! body parsing, caller identification, and query-string parsing.
//!
//! The excluded auth layer identifies the caller via the `X-User-Id`
//! header; privileged operations additionally require the configured admin
//! API key in `X-Api-Key`.

pub mod drafts;
pub mod entries;
pub mod health;
pub mod trackers;
pub mod warnings;

pub use health::{health_check, readiness_check, version_info};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

use crate::server::AppState;
use crate::types::WaymarkError;

pub(crate) type FullBody = Full<Bytes>;

/// Standard error body; `fieldErrors` present only on validation failures
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_errors: Option<BTreeMap<String, Vec<String>>>,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<FullBody> {
    json_response(
        status,
        &ErrorResponse {
            error: message.to_string(),
            errors: None,
            field_errors: None,
        },
    )
}

/// Map the error taxonomy onto status codes and bodies. Store and runtime
/// failures are logged in full and reported generically.
pub(crate) fn error_to_response(err: &WaymarkError) -> Response<FullBody> {
    match err {
        WaymarkError::NotFound(_) => error_response(StatusCode::NOT_FOUND, &err.to_string()),
        WaymarkError::InvalidId(_) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        WaymarkError::Validation(report) => json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "Validation failed".to_string(),
                errors: Some(report.errors.clone()),
                field_errors: Some(report.field_errors.clone()),
            },
        ),
        WaymarkError::Database(detail) | WaymarkError::Internal(detail) => {
            error!("Request failed: {}", detail);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Parse the request body as JSON
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, Response<FullBody>> {
    let bytes = match req.into_body().collect().await {
        Ok(body) => body.to_bytes(),
        Err(e) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read body: {e}"),
            ))
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            &format!("Invalid request data: {e}"),
        )
    })
}

/// The calling user, from the `X-User-Id` header
pub(crate) fn require_user(req: &Request<Incoming>) -> Result<String, Response<FullBody>> {
    match req
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
    {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(error_response(StatusCode::UNAUTHORIZED, "Unauthorized")),
    }
}

/// Gate privileged operations on the admin API key in `X-Api-Key`
pub(crate) fn require_admin(
    req: &Request<Incoming>,
    state: &AppState,
) -> Result<(), Response<FullBody>> {
    let presented = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());
    if state.args.is_admin_key(presented) {
        Ok(())
    } else {
        Err(error_response(StatusCode::FORBIDDEN, "Forbidden"))
    }
}

/// Stored bson timestamp as an RFC 3339 wire string
pub(crate) fn bson_to_iso(value: Option<bson::DateTime>) -> Option<String> {
    value.map(|d| {
        d.to_chrono()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    })
}

/// Extract a query parameter, percent-decoded
pub(crate) fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some(key) {
            let raw = parts.next().unwrap_or("");
            return Some(
                urlencoding::decode(raw)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| raw.to_string()),
            );
        }
    }
    None
}

/// Boolean query flag: `true` or `1`
pub(crate) fn query_flag(query: Option<&str>, key: &str) -> bool {
    matches!(
        query_param(query, key).as_deref(),
        Some("true") | Some("1")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_decodes_values() {
        let query = Some("path=peeLog.kind&value=very%20large&permanent=true");
        assert_eq!(query_param(query, "path").as_deref(), Some("peeLog.kind"));
        assert_eq!(query_param(query, "value").as_deref(), Some("very large"));
        assert_eq!(query_param(query, "missing"), None);
        assert_eq!(query_param(None, "path"), None);
    }

    #[test]
    fn test_query_flag() {
        assert!(query_flag(Some("includeDeleted=true"), "includeDeleted"));
        assert!(query_flag(Some("includeDeleted=1"), "includeDeleted"));
        assert!(!query_flag(Some("includeDeleted=false"), "includeDeleted"));
        assert!(!query_flag(None, "includeDeleted"));
    }
}
