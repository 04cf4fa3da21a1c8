use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use http::request::Parts;
use http::{HeaderMap, HeaderName};

use crate::api::middleware::MiddlewareResult;
use crate::api::server::AppState;
use crate::db::prelude::{MemberId, Viewer};
use crate::util::env::Var;
use crate::var;

/// Identity of the member making the request.
///
/// The upstream authentication layer is trusted to set the viewer header; a request without it,
/// or with a value that isn't a member id, is treated as anonymous.
#[derive(Debug, Clone, Copy)]
pub struct CurrentViewer(pub Viewer);

impl FromRequestParts<Arc<AppState>> for CurrentViewer {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(viewer_from_headers(&parts.headers, &state.viewer_header)))
    }
}

pub fn viewer_from_headers(headers: &HeaderMap, header: &HeaderName) -> Viewer {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<MemberId>().ok())
        .into()
}

pub async fn viewer_header() -> MiddlewareResult<HeaderName> {
    let name = var!(Var::ViewerHeader).await?;
    Ok(HeaderName::from_bytes(name.trim().as_bytes())?)
}
