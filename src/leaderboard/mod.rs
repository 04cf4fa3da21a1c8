//! Leaderboard computation: window and metric selection, aggregation through the statistics
//! store, ranking, and flagging the viewer's row.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::db::prelude::{LeaderboardEntry, MemberId, StatsStore, StoreError, Viewer};
use crate::leaderboard::kind::LeaderboardKind;
use crate::leaderboard::query::QueryBuilder;
use crate::util::env::Env;

pub mod kind;
pub mod query;
pub mod rank;

pub type LeaderboardResult<T> = core::result::Result<T, LeaderboardError>;

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("unrecognized leaderboard type '{0}'")]
    InvalidLeaderboardType(String),

    #[error("limit must be between 1 and {max}, got {value}")]
    InvalidLimit { value: i64, max: i64 },

    #[error("statistics store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("no member identity for user {0}")]
    MissingMemberIdentity(MemberId),

    #[error("leaderboard request cancelled")]
    Cancelled,
}

/// Bounds applied to requested row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    pub default: i64,
    pub max: i64,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            default: 10,
            max: 100,
        }
    }
}

impl LimitPolicy {
    pub fn from_env(env: &Env) -> Self {
        Self {
            default: env.leaderboard_default_limit,
            max: env.leaderboard_max_limit,
        }
    }

    /// Caps oversized requests at the maximum. Non-positive values are left for [`Limit::new`] to
    /// reject.
    pub fn clamp(&self, requested: i64) -> i64 {
        requested.min(self.max)
    }
}

/// A validated row limit, `1..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(i64);

impl Limit {
    pub fn new(value: i64, policy: &LimitPolicy) -> LeaderboardResult<Self> {
        if value <= 0 || value > policy.max {
            return Err(LeaderboardError::InvalidLimit {
                value,
                max: policy.max,
            });
        }

        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardParams {
    pub kind: LeaderboardKind,
    pub limit: Limit,
}

impl LeaderboardParams {
    /// Unrecognized types fall back to the overall leaderboard; limits outside the policy are
    /// rejected.
    pub fn new(kind: &str, limit: i64, policy: &LimitPolicy) -> LeaderboardResult<Self> {
        Ok(Self {
            kind: LeaderboardKind::parse_or_default(kind),
            limit: Limit::new(limit, policy)?,
        })
    }
}

pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Entry point for leaderboard reads. Holds no per-request state; share it behind an `Arc`.
#[derive(Debug)]
pub struct LeaderboardService {
    query: QueryBuilder,
    clock: Arc<dyn Clock>,
    limits: LimitPolicy,
    store_timeout: Duration,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn StatsStore>, limits: LimitPolicy, store_timeout: Duration) -> Self {
        Self {
            query: QueryBuilder::new(store),
            clock: Arc::new(SystemClock),
            limits,
            store_timeout,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn limits(&self) -> &LimitPolicy {
        &self.limits
    }

    pub fn params(&self, kind: &str, limit: i64) -> LeaderboardResult<LeaderboardParams> {
        LeaderboardParams::new(kind, limit, &self.limits)
    }

    pub async fn get_leaderboard(
        &self,
        kind: &str,
        limit: i64,
        viewer: Viewer,
    ) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        let params = self.params(kind, limit)?;
        self.leaderboard(&params, viewer, &CancellationToken::new())
            .await
    }

    /// Reads and ranks a leaderboard. The store read is abandoned when `cancel` fires or the
    /// store deadline passes.
    #[instrument(skip(self, cancel), fields(kind = %params.kind, limit = params.limit.get()))]
    pub async fn leaderboard(
        &self,
        params: &LeaderboardParams,
        viewer: Viewer,
        cancel: &CancellationToken,
    ) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        let now = self.clock.now();
        let read = tokio::time::timeout(self.store_timeout, self.query.build(params, now));

        let ordered = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("leaderboard read cancelled");
                return Err(LeaderboardError::Cancelled);
            }
            res = read => res.map_err(|_| {
                LeaderboardError::StoreUnavailable(StoreError::Timeout(self.store_timeout))
            })??,
        };

        let entries = rank::assign(ordered, viewer);
        tracing::debug!(entries = entries.len(), "leaderboard ranked");

        Ok(entries)
    }
}
