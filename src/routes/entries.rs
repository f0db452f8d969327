//! Log entry routes
//!
//! ## Endpoints
//!
//! - `GET /api/trackers/{id}/entries?includeDeleted=&limit=&skip=`
//! - `POST /api/trackers/{id}/entries` - create an entry; the response
//!   carries the ids of any cascade-derived entries
//! - `DELETE /api/entries/{id}` - soft delete; `?permanent=true` (admin)
//!   removes the document
//!
//! A validation failure returns 400 with per-field messages; a missing or
//! misconfigured cascade link never fails the submission.

use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::schemas::LogEntryDoc;
use crate::routes::{
    bson_to_iso, error_response, error_to_response, json_response, query_flag, query_param,
    read_json, require_admin, require_user, FullBody,
};
use crate::server::AppState;

/// Log entry as serialized to callers
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryView {
    #[serde(rename = "_id")]
    pub id: String,
    pub tracker_id: String,
    pub user_id: String,
    pub data: Map<String, Value>,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_from_log_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

impl LogEntryView {
    pub fn from_doc(doc: &LogEntryDoc, annotate_deleted: bool) -> Self {
        Self {
            id: doc.id_hex(),
            tracker_id: doc.tracker_id.clone(),
            user_id: doc.user_id.clone(),
            data: doc.data.clone(),
            created_at: bson_to_iso(doc.metadata.created_at),
            deleted_at: bson_to_iso(doc.metadata.deleted_at),
            linked_from_log_id: doc.linked_from_log_id.clone(),
            is_deleted: annotate_deleted.then_some(doc.metadata.is_deleted()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogEntryRequest {
    data: Map<String, Value>,
    custom_enum_values: Option<HashMap<String, Vec<String>>>,
    created_at: Option<String>,
    draft_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogEntryResponse {
    #[serde(flatten)]
    entry: LogEntryView,
    created_linked_logs: Vec<String>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// GET /api/trackers/{id}/entries
pub async fn handle_list(
    req: Request<Incoming>,
    state: Arc<AppState>,
    tracker_id: &str,
) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let query = req.uri().query();
    let include_deleted = query_flag(query, "includeDeleted");
    let limit = query_param(query, "limit").and_then(|v| v.parse::<i64>().ok());
    let skip = query_param(query, "skip").and_then(|v| v.parse::<u64>().ok());

    match state
        .entries
        .list_entries(&user_id, tracker_id, include_deleted, limit, skip)
        .await
    {
        Ok(entries) => {
            let views: Vec<LogEntryView> = entries
                .iter()
                .map(|e| LogEntryView::from_doc(e, include_deleted))
                .collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => error_to_response(&e),
    }
}

/// POST /api/trackers/{id}/entries
pub async fn handle_create(
    req: Request<Incoming>,
    state: Arc<AppState>,
    tracker_id: &str,
) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    // Backdating is a privileged capability
    let is_admin = require_admin(&req, &state).is_ok();

    let request: CreateLogEntryRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let created_at_override = match &request.created_at {
        Some(raw) => {
            if !is_admin {
                return error_response(StatusCode::FORBIDDEN, "Forbidden");
            }
            match DateTime::parse_from_rfc3339(raw) {
                Ok(parsed) => Some(parsed.with_timezone(&Utc)),
                Err(_) => {
                    return error_response(StatusCode::BAD_REQUEST, "Invalid createdAt value")
                }
            }
        }
        None => None,
    };

    match state
        .entries
        .create_log_entry(
            &user_id,
            tracker_id,
            request.data,
            request.custom_enum_values,
            created_at_override,
            request.draft_id,
        )
        .await
    {
        Ok(created) => json_response(
            StatusCode::OK,
            &CreateLogEntryResponse {
                entry: LogEntryView::from_doc(&created.entry, false),
                created_linked_logs: created.created_linked_logs,
            },
        ),
        Err(e) => error_to_response(&e),
    }
}

/// Main handler for /api/entries/{id}
pub async fn handle(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/api/entries").unwrap_or("");
    let id = subpath.trim_start_matches('/').to_string();

    match method {
        Method::DELETE if !id.is_empty() && !id.contains('/') => {
            handle_delete(req, state, &id).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

/// DELETE /api/entries/{id}[?permanent=true]
async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    log_entry_id: &str,
) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let permanent = query_flag(req.uri().query(), "permanent");
    let result = if permanent {
        if let Err(resp) = require_admin(&req, &state) {
            return resp;
        }
        state.entries.permanently_delete_log_entry(log_entry_id).await
    } else {
        state.entries.delete_log_entry(&user_id, log_entry_id).await
    };

    match result {
        Ok(()) => json_response(StatusCode::OK, &SuccessResponse { success: true }),
        Err(e) => error_to_response(&e),
    }
}
