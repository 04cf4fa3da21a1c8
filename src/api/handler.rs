use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::debug_handler;
use axum::response::Response;
use serde::Deserialize;
use tracing::instrument;

use crate::api::middleware::viewer::CurrentViewer;
use crate::api::render::LeaderboardView;
use crate::api::server::{AppState, RouteError, RouteResult};
use crate::db::prelude::Viewer;
use crate::leaderboard::LimitPolicy;

/// `?type=<kind>&limit=<n>`; both optional. `limit` stays a string so a malformed value can be
/// reported instead of being swallowed by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshForm {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitParam {
    #[serde(default)]
    pub limit: Option<String>,
}

#[instrument(skip(state))]
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Query(param): Query<LeaderboardQuery>,
) -> RouteResult<Response> {
    let kind = param.kind.unwrap_or_default();
    render_board(&state, &kind, param.limit.as_deref(), viewer).await
}

#[instrument(skip(state))]
pub async fn leaderboard_by_type(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(kind): Path<String>,
    Query(param): Query<LimitParam>,
) -> RouteResult<Response> {
    render_board(&state, &kind, param.limit.as_deref(), viewer).await
}

/// Re-renders a board on request from an already-loaded page. Always uses the default limit.
#[instrument(skip(state))]
#[debug_handler]
pub async fn refresh_leaderboard(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Form(form): Form<RefreshForm>,
) -> RouteResult<Response> {
    let kind = form.kind.unwrap_or_default();
    render_board(&state, &kind, None, viewer).await
}

async fn render_board(
    state: &AppState,
    kind: &str,
    raw_limit: Option<&str>,
    viewer: Viewer,
) -> RouteResult<Response> {
    let limit = parse_limit(raw_limit, state.leaderboard.limits())?;
    let params = state.leaderboard.params(kind, limit)?;

    let cancel = state.shutdown.child_token();
    let entries = state
        .leaderboard
        .leaderboard(&params, viewer, &cancel)
        .await?;

    Ok(state
        .renderer
        .render(LeaderboardView::new(params.kind, entries)))
}

/// Missing or blank limits take the default, oversized ones (the default included) are capped;
/// anything that isn't an integer is rejected.
pub fn parse_limit(raw: Option<&str>, policy: &LimitPolicy) -> RouteResult<i64> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(policy.clamp(policy.default)),
        Some(s) => s
            .parse::<i64>()
            .map(|n| policy.clamp(n))
            .map_err(|_| RouteError::MalformedLimit(s.to_owned())),
    }
}
