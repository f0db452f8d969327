//! Cascade warning routes
//!
//! `GET /api/cascade/warnings` drains the caller's pending cascade skip
//! diagnostics, oldest first. Skips are silent in the submission response
//! itself; this endpoint is how a UI or operator surfaces them.

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

use crate::routes::{json_response, require_user, FullBody};
use crate::server::AppState;

/// GET /api/cascade/warnings
pub fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let user_id = match require_user(&req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let warnings = state.warnings.take(&user_id);
    json_response(StatusCode::OK, &warnings)
}
