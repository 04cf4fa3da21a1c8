use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::instrument;

use crate::util::env::{self, Var};
use crate::var;

pub mod models;
pub mod repositories;

pub mod prelude {
    pub use crate::db::models::leaderboard::{LeaderboardEntry, ScoredMember, Viewer};
    pub use crate::db::models::member::{MemberId, MemberStat};

    pub use crate::db::repositories::member_stats::MemberStatsRepository;
    pub use crate::db::repositories::{StatQuery, StatsStore, StoreError};
}

pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn from_env() -> PgResult<Self> {
        let db_url = var!(Var::DatabaseUrl).await?;
        Self::connect(db_url).await
    }

    #[instrument(skip(db_url))]
    pub async fn connect(db_url: &str) -> PgResult<Self> {
        let pool = PgPoolOptions::new().connect(db_url).await?;
        tracing::info!("database pool connected");

        Ok(Self { pool })
    }

    #[instrument(skip(self))]
    pub async fn migrate(&self) -> PgResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");

        Ok(())
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}

pub type PgResult<T> = core::result::Result<T, PgError>;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum PgError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    EnvError(#[from] env::EnvErr),
}
