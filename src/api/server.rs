use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{HeaderName, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;
use uuid::Uuid;

use crate::api::handler::*;
use crate::api::render::{JsonRenderer, RenderLeaderboard};
use crate::leaderboard::{LeaderboardError, LeaderboardService};

pub type RouteResult<T> = core::result::Result<T, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub leaderboard: Arc<LeaderboardService>,
    pub renderer: Arc<dyn RenderLeaderboard>,
    pub viewer_header: HeaderName,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        leaderboard: Arc<LeaderboardService>,
        viewer_header: HeaderName,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            leaderboard,
            renderer: Arc::new(JsonRenderer),
            viewer_header,
            shutdown,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn RenderLeaderboard>) -> Self {
        self.renderer = renderer;
        self
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { Response::new(Body::empty()) }))
        .route("/leaderboard", get(get_leaderboard))
        .route("/leaderboard/refresh", post(refresh_leaderboard))
        .route("/leaderboard/{kind}", get(leaderboard_by_type))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!(
                    "api_request",
                    request_id = %Uuid::new_v4(),
                    ?method,
                    ?uri,
                    ?matched_path
                )
            }),
        )
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

/// Logs the `RouteError` a handler attached to its response, if any.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

/// Binds the listener and spawns the server plus a task that reports the bound address. The
/// server drains and exits once `state.shutdown` is cancelled.
#[instrument(skip(state, cors))]
pub async fn start_server(
    state: Arc<AppState>,
    port: u16,
    cors: CorsLayer,
) -> std::io::Result<Vec<JoinHandle<()>>> {
    tracing::info!("starting server");

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SocketAddr>();

    let shutdown = state.shutdown.clone();
    let app = router(state).layer(cors);

    let server_handle = tokio::task::spawn(async move {
        if let Ok(addr) = listener.local_addr() {
            _ = tx.send(addr);
        }

        let drain = shutdown.clone();
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { drain.cancelled().await })
            .await
        {
            tracing::error!(error = ?e, "server exited with error");
        }

        // stop anything still waiting on the server
        shutdown.cancel();
    });

    let logging_handle = tokio::task::spawn(async move {
        if let Some(addr) = rx.recv().await {
            tracing::info!(
                server_url = &format!("http://127.0.0.1:{}", addr.port()),
                "server ready"
            );
        }
    });

    Ok(vec![server_handle, logging_handle])
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),

    #[error("limit '{0}' is not an integer")]
    MalformedLimit(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let message = self.to_string();
        let (status, err) = match &self {
            RouteError::MalformedLimit(_) => (StatusCode::BAD_REQUEST, None),

            RouteError::Leaderboard(lb_err) => match lb_err {
                LeaderboardError::InvalidLimit { .. }
                | LeaderboardError::InvalidLeaderboardType(_) => {
                    (StatusCode::BAD_REQUEST, None) // caller's problem, not ours
                }
                LeaderboardError::StoreUnavailable(_) | LeaderboardError::Cancelled => {
                    (StatusCode::SERVICE_UNAVAILABLE, Some(self))
                }
                LeaderboardError::MissingMemberIdentity(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, Some(self))
                }
            },
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        if let Some(err) = err {
            response.extensions_mut().insert(Arc::new(err));
        }

        response
    }
}
