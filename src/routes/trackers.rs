//! Tracker routes
//!
//! ## Endpoints
//!
//! - `GET /api/trackers` - list the caller's trackers in display order
//! - `POST /api/trackers` - create (or join) a tracker
//! - `PUT /api/trackers/order` - reorder the caller's active list
//! - `PUT /api/trackers/{id}` - replace a tracker's schema
//! - `DELETE /api/trackers/{id}` - soft delete; `?permanent=true` (admin)
//!   removes the tracker, all memberships, and all entries
//! - `DELETE /api/trackers/{id}/enum?path=&value=` - admin enum-value
//!   removal, scrubbing stored drafts
//! - `GET|POST /api/trackers/{id}/entries` - delegated to the entry routes

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::TrackerDoc;
use crate::routes::{
    self, bson_to_iso, error_response, error_to_response, json_response, query_flag, query_param,
    read_json, require_admin, require_user, FullBody,
};
use crate::schema::TrackerSchema;
use crate::server::AppState;

/// Tracker as serialized to callers
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub schema: TrackerSchema,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

impl TrackerView {
    pub fn from_doc(doc: &TrackerDoc, is_deleted: Option<bool>) -> Self {
        Self {
            id: doc.id_hex(),
            name: doc.name.clone(),
            schema: doc.schema.clone(),
            created_at: bson_to_iso(doc.metadata.created_at),
            updated_at: bson_to_iso(doc.metadata.updated_at),
            is_deleted,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTrackerRequest {
    name: String,
    schema: TrackerSchema,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTrackerRequest {
    schema: TrackerSchema,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderRequest {
    tracker_ids: Vec<String>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// Main handler for /api/trackers* routes
pub async fn handle(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/api/trackers").unwrap_or("");

    match (method, subpath) {
        (Method::GET, "") | (Method::GET, "/") => handle_list(req, state).await,
        (Method::POST, "") | (Method::POST, "/") => handle_create(req, state).await,
        (Method::PUT, "/order") => handle_reorder(req, state).await,

        (Method::GET, p) if p.ends_with("/entries") => {
            let id = trimmed_id(p, "/entries");
            routes::entries::handle_list(req, state, &id).await
        }
        (Method::POST, p) if p.ends_with("/entries") => {
            let id = trimmed_id(p, "/entries");
            routes::entries::handle_create(req, state, &id).await
        }

        (Method::DELETE, p) if p.ends_with("/enum") => {
            let id = trimmed_id(p, "/enum");
            handle_remove_enum_value(req, state, &id).await
        }

        (Method::PUT, p) if is_id_path(p) => {
            let id = p.trim_start_matches('/').to_string();
            handle_update_schema(req, state, &id).await
        }
        (Method::DELETE, p) if is_id_path(p) => {
            let id = p.trim_start_matches('/').to_string();
            handle_delete(req, state, &id).await
        }

        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

fn is_id_path(subpath: &str) -> bool {
    let trimmed = subpath.trim_start_matches('/');
    !trimmed.is_empty() && !trimmed.contains('/')
}

fn trimmed_id(subpath: &str, suffix: &str) -> String {
    subpath
        .strip_prefix('/')
        .and_then(|s| s.strip_suffix(suffix))
        .unwrap_or("")
        .to_string()
}

/// GET /api/trackers
async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let include_deleted = query_flag(req.uri().query(), "includeDeleted");

    match state.trackers.list_for_user(&user_id, include_deleted).await {
        Ok(records) => {
            let views: Vec<TrackerView> = records
                .iter()
                .map(|r| {
                    TrackerView::from_doc(
                        &r.tracker,
                        include_deleted.then_some(r.is_deleted),
                    )
                })
                .collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => error_to_response(&e),
    }
}

/// POST /api/trackers
async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let request: CreateTrackerRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state
        .trackers
        .create(&user_id, &request.name, request.schema)
        .await
    {
        Ok(tracker) => {
            info!("User {} joined tracker '{}'", user_id, tracker.name);
            json_response(StatusCode::OK, &TrackerView::from_doc(&tracker, None))
        }
        Err(e) => error_to_response(&e),
    }
}

/// PUT /api/trackers/order
async fn handle_reorder(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let request: ReorderRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state.trackers.reorder(&user_id, request.tracker_ids).await {
        Ok(tracker_ids) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "trackerIds": tracker_ids }),
        ),
        Err(e) => error_to_response(&e),
    }
}

/// PUT /api/trackers/{id}
async fn handle_update_schema(
    req: Request<Incoming>,
    state: Arc<AppState>,
    tracker_id: &str,
) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let request: UpdateTrackerRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state
        .trackers
        .update_schema(&user_id, tracker_id, request.schema)
        .await
    {
        Ok(tracker) => json_response(StatusCode::OK, &TrackerView::from_doc(&tracker, None)),
        Err(e) => error_to_response(&e),
    }
}

/// DELETE /api/trackers/{id}[?permanent=true]
async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    tracker_id: &str,
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
        info!("Permanently deleting tracker {}", tracker_id);
        state.trackers.permanent_delete(tracker_id).await
    } else {
        state.trackers.soft_delete(&user_id, tracker_id).await
    };

    match result {
        Ok(()) => json_response(StatusCode::OK, &SuccessResponse { success: true }),
        Err(e) => error_to_response(&e),
    }
}

/// DELETE /api/trackers/{id}/enum?path=&value= (admin)
async fn handle_remove_enum_value(
    req: Request<Incoming>,
    state: Arc<AppState>,
    tracker_id: &str,
) -> Response<FullBody> {
    if let Err(resp) = require_admin(&req, &state) {
        return resp;
    }

    let query = req.uri().query();
    let Some(path) = query_param(query, "path") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'path' parameter");
    };
    let Some(value) = query_param(query, "value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };

    let tracker = match state
        .trackers
        .remove_enum_value(tracker_id, &path, &value)
        .await
    {
        Ok(tracker) => tracker,
        Err(e) => return error_to_response(&e),
    };

    // In-flight form state loses the value; historical entries keep it
    match state
        .drafts
        .scrub_enum_value(&tracker.id_hex(), &path, &value)
        .await
    {
        Ok(scrubbed) => {
            if scrubbed > 0 {
                info!(
                    "Scrubbed enum value '{}' at '{}' from {} draft(s)",
                    value, path, scrubbed
                );
            }
            json_response(StatusCode::OK, &TrackerView::from_doc(&tracker, None))
        }
        Err(e) => error_to_response(&e),
    }
}
