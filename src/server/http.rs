//! HTTP server implementation
//!
//! hyper http1 with TokioIo; one spawned task per connection, dispatch by
//! `(Method, path)`. All handlers return `Response<Full<Bytes>>`, so the
//! boundary never propagates an error to hyper.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Args;
use crate::db::MongoClient;
use crate::routes;
use crate::services::{CascadeWarningStore, DraftService, LogEntryService, TrackerService};
use crate::types::{Result, WaymarkError};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    pub trackers: TrackerService,
    pub entries: LogEntryService,
    pub drafts: DraftService,
    /// Cascade skip diagnostics, process-local
    pub warnings: Arc<CascadeWarningStore>,
}

impl AppState {
    /// Wire the services over a connected Mongo client
    pub fn new(args: Args, mongo: MongoClient) -> Self {
        let warnings = Arc::new(CascadeWarningStore::new(args.cascade_warning_capacity));
        let trackers = TrackerService::new(mongo.clone());
        let entries = LogEntryService::new(
            mongo.clone(),
            Arc::clone(&warnings),
            args.cascade_name_fallback,
        );
        let drafts = DraftService::new(mongo.clone());

        Self {
            args,
            mongo,
            trackers,
            entries,
            drafts,
            warnings,
        }
    }
}

/// Run the HTTP server; returns only on listener failure
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen)
        .await
        .map_err(|e| WaymarkError::Internal(format!("Failed to bind {}: {}", state.args.listen, e)))?;

    info!("Listening on {}", state.args.listen);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept failed: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move {
                    Ok::<_, std::convert::Infallible>(handle_request(req, state).await)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection from {} ended: {}", peer, e);
            }
        });
    }
}

async fn handle_request(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("{} {}", method, path);

    match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(state),

        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(state).await
        }

        (Method::GET, "/version") => routes::version_info(),

        (Method::GET, "/api/cascade/warnings") => routes::warnings::handle_list(req, state),

        (_, p) if p == "/api/trackers" || p.starts_with("/api/trackers/") => {
            routes::trackers::handle(req, state, p).await
        }

        (_, p) if p.starts_with("/api/entries/") => routes::entries::handle(req, state, p).await,

        (_, p) if p == "/api/drafts" || p.starts_with("/api/drafts/") => {
            routes::drafts::handle(req, state, p).await
        }

        _ => routes::error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}
