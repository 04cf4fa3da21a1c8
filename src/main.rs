use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::api::middleware::{self, MiddlewareErr};
use crate::api::server::AppState;
use crate::db::prelude::MemberStatsRepository;
use crate::db::{Db, PgError};
use crate::leaderboard::{LeaderboardService, LimitPolicy};
use crate::util::env::EnvErr;
use crate::util::telemetry;

mod api;
mod db;
mod leaderboard;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),

    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Pg(#[from] PgError),

    #[error(transparent)]
    Middleware(#[from] MiddlewareErr),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let env = util::env::config().await?;
    let telemetry_registry = telemetry::Telemetry::new(env)?.register();

    tracing::info!("starting leaderboard service");

    let db = Db::from_env().await?;
    if env.run_migrations {
        db.migrate().await?;
    }

    let store = Arc::new(MemberStatsRepository::new(db.pool()));
    let leaderboard = Arc::new(LeaderboardService::new(
        store,
        LimitPolicy::from_env(env),
        env.store_timeout(),
    ));

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(
        leaderboard,
        middleware::viewer::viewer_header().await?,
        shutdown.clone(),
    ));

    let mut handles =
        api::server::start_server(state, env.server_api_port, middleware::cors().await?).await?;

    handles.push(tokio::task::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    tracing::error!(error = ?e, "failed to listen for shutdown signal");
                }
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    }));

    _ = join_all(handles).await;

    telemetry_registry.shutdown();
    Ok(())
}
