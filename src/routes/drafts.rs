//! Draft routes
//!
//! ## Endpoints
//!
//! - `GET /api/drafts` - list the caller's drafts, newest-updated first
//! - `POST /api/drafts` - save a new draft
//! - `GET /api/drafts/{id}` - fetch one draft
//! - `PUT /api/drafts/{id}` - replace a draft's content
//! - `DELETE /api/drafts/{id}` - remove a draft
//!
//! Draft responses include a `formData` projection: stored ISO-normalized
//! values converted back into editable form representations against the
//! owning tracker's schema.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::schemas::DraftDoc;
use crate::routes::{
    bson_to_iso, error_response, error_to_response, json_response, read_json, require_user,
    FullBody,
};
use crate::server::AppState;
use crate::services::DraftService;

/// Draft as serialized to callers
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub tracker_id: String,
    pub data: Map<String, Value>,
    /// Stored data converted into editable form values
    pub form_data: Map<String, Value>,
    pub custom_enum_values: HashMap<String, Vec<String>>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftRequest {
    tracker_id: String,
    data: Map<String, Value>,
    custom_enum_values: Option<HashMap<String, Vec<String>>>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// Main handler for /api/drafts* routes
pub async fn handle(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/api/drafts").unwrap_or("");
    let id = subpath.trim_start_matches('/').to_string();

    match (method, id.as_str()) {
        (Method::GET, "") => handle_list(req, state).await,
        (Method::POST, "") => handle_create(req, state).await,
        (Method::GET, id) if !id.contains('/') => handle_get(req, state, id).await,
        (Method::PUT, id) if !id.contains('/') => handle_update(req, state, id).await,
        (Method::DELETE, id) if !id.contains('/') => handle_delete(req, state, id).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

/// Build the caller-facing view, resolving the tracker schema for the
/// form-data projection. A draft whose tracker has vanished projects its
/// stored data unchanged.
async fn view(state: &AppState, user_id: &str, draft: &DraftDoc) -> DraftView {
    let form_data = match state
        .trackers
        .get_for_user(user_id, &draft.tracker_id)
        .await
    {
        Ok(tracker) => DraftService::form_data(&tracker.schema, draft),
        Err(_) => draft.data.clone(),
    };

    DraftView {
        id: draft.id_hex(),
        user_id: draft.user_id.clone(),
        tracker_id: draft.tracker_id.clone(),
        data: draft.data.clone(),
        form_data,
        custom_enum_values: draft.custom_enum_values.clone(),
        created_at: bson_to_iso(draft.metadata.created_at),
        updated_at: bson_to_iso(draft.metadata.updated_at),
    }
}

/// GET /api/drafts
async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.drafts.list(&user_id).await {
        Ok(drafts) => {
            let mut views = Vec::with_capacity(drafts.len());
            for draft in &drafts {
                views.push(view(&state, &user_id, draft).await);
            }
            json_response(StatusCode::OK, &views)
        }
        Err(e) => error_to_response(&e),
    }
}

/// POST /api/drafts
async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let request: DraftRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state
        .drafts
        .save(
            &user_id,
            &request.tracker_id,
            request.data,
            request.custom_enum_values.unwrap_or_default(),
        )
        .await
    {
        Ok(draft) => json_response(StatusCode::OK, &view(&state, &user_id, &draft).await),
        Err(e) => error_to_response(&e),
    }
}

/// GET /api/drafts/{id}
async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    draft_id: &str,
) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.drafts.get(&user_id, draft_id).await {
        Ok(draft) => json_response(StatusCode::OK, &view(&state, &user_id, &draft).await),
        Err(e) => error_to_response(&e),
    }
}

/// PUT /api/drafts/{id}
async fn handle_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    draft_id: &str,
) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let request: DraftRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state
        .drafts
        .update(
            &user_id,
            draft_id,
            &request.tracker_id,
            request.data,
            request.custom_enum_values.unwrap_or_default(),
        )
        .await
    {
        Ok(draft) => json_response(StatusCode::OK, &view(&state, &user_id, &draft).await),
        Err(e) => error_to_response(&e),
    }
}

/// DELETE /api/drafts/{id}
async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    draft_id: &str,
) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.drafts.delete(&user_id, draft_id).await {
        Ok(()) => json_response(StatusCode::OK, &SuccessResponse { success: true }),
        Err(e) => error_to_response(&e),
    }
}
