pub mod viewer;

use http::header::InvalidHeaderName;
use http::request::Parts as ReqParts;
use http::{HeaderValue, Method};
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::util::env::{EnvErr, Var};
use crate::var;

pub type MiddlewareResult<T> = core::result::Result<T, MiddlewareErr>;

#[derive(Debug, Error)]
pub enum MiddlewareErr {
    #[error(transparent)]
    EnvErr(#[from] EnvErr),

    #[error(transparent)]
    InvalidHeaderName(#[from] InvalidHeaderName),
}

/// Browser-facing CORS policy. `*` allows any origin; anything else is matched as an origin
/// suffix (e.g. `.example.org`).
pub async fn cors() -> MiddlewareResult<CorsLayer> {
    let cors_allowed = var!(Var::CorsAllowOrigins).await?;
    Ok(cors_layer(cors_allowed))
}

pub fn cors_layer(cors_allowed: &'static str) -> CorsLayer {
    let allowed = if cors_allowed == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::predicate(|org: &HeaderValue, _: &ReqParts| {
            org.as_bytes().ends_with(cors_allowed.as_bytes())
        })
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(allowed)
}
