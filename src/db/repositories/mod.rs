use core::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::member::MemberStat;
use crate::leaderboard::kind::RankingMetric;

#[cfg(test)]
pub mod memory;
pub mod member_stats;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error("statistics read exceeded {0:?}")]
    Timeout(Duration),

    #[error("statistics store unreachable: {0}")]
    Unreachable(String),
}

/// What a leaderboard asks of the statistics store: one aggregated row per member with activity
/// on or after `since`, ordered by `metric` descending then member id ascending, up to `limit`
/// named rows. Nameless rows ranked above the cutoff are returned as well and don't count
/// towards `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatQuery {
    pub since: Option<DateTime<Utc>>,
    pub metric: RankingMetric,
    pub limit: i64,
}

impl StatQuery {
    pub fn admits(&self, stat: &MemberStat) -> bool {
        self.since.is_none_or(|since| stat.activity_date >= since)
    }
}

#[async_trait]
pub trait StatsStore: Send + Sync + fmt::Debug {
    fn backend_tag(&self) -> &'static str;

    /// Reads aggregated member statistics. Rows whose member can't be resolved come back with no
    /// display name rather than being dropped.
    async fn fetch(&self, query: &StatQuery) -> StoreResult<Vec<MemberStat>>;
}
