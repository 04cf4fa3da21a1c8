use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::models::member::{MemberId, MemberStat};
use crate::db::repositories::{StatQuery, StatsStore, StoreError, StoreResult};

/// In-process statistics store holding raw per-activity rows, aggregated on read the same way
/// the Postgres query does.
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    rows: Mutex<Vec<MemberStat>>,
    pub fetch_calls: AtomicU64,
    unreachable: AtomicBool,
    read_delay: Duration,
}

impl MemoryStatsStore {
    pub fn with_rows(rows: Vec<MemberStat>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    pub async fn push(&self, stat: MemberStat) {
        self.rows.lock().await.push(stat);
    }

    pub async fn set_points(&self, id: MemberId, total_points: i64) {
        for row in self.rows.lock().await.iter_mut() {
            if row.user_id == id {
                row.total_points = total_points;
            }
        }
    }

    pub async fn set_streak(&self, id: MemberId, current_streak: i64) {
        for row in self.rows.lock().await.iter_mut() {
            if row.user_id == id {
                row.current_streak = current_streak;
            }
        }
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, query: &StatQuery) -> StoreResult<Vec<MemberStat>> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }

        if self.unreachable.load(Ordering::Relaxed) {
            return Err(StoreError::Unreachable("memory store offline".into()));
        }

        let mut members: BTreeMap<MemberId, MemberStat> = BTreeMap::new();
        for row in self.rows.lock().await.iter().filter(|r| query.admits(r)) {
            members
                .entry(row.user_id)
                .and_modify(|agg| agg.absorb(row))
                .or_insert_with(|| row.clone());
        }

        let mut stats: Vec<MemberStat> = members.into_values().collect();
        stats.sort_by(|a, b| {
            query
                .metric
                .score(b)
                .cmp(&query.metric.score(a))
                .then(a.user_id.cmp(&b.user_id))
        });

        Ok(cut_at_named_limit(stats, query.limit))
    }
}

/// Keeps ordered rows until `limit` named members have been taken; nameless rows before that
/// point are kept too.
fn cut_at_named_limit(stats: Vec<MemberStat>, limit: i64) -> Vec<MemberStat> {
    let limit = usize::try_from(limit).unwrap_or(0);
    let mut named = 0;
    let mut kept = Vec::new();

    for stat in stats {
        if named >= limit {
            break;
        }
        if stat.display_name.is_some() {
            named += 1;
        }
        kept.push(stat);
    }

    kept
}

/// Builds a stats row with a resolvable member name.
pub fn stat(
    id: i64,
    name: &str,
    total_points: i64,
    current_streak: i64,
    activity_date: DateTime<Utc>,
) -> MemberStat {
    MemberStat {
        user_id: MemberId(id),
        display_name: Some(name.to_owned()),
        total_points,
        current_streak,
        activity_date,
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;
    use crate::leaderboard::kind::RankingMetric;

    #[tokio::test]
    async fn test_aggregates_rows_per_member() {
        let day = |d| Utc.with_ymd_and_hms(2026, 10, d, 9, 0, 0).unwrap();
        let store = MemoryStatsStore::with_rows(vec![
            stat(1, "Amani", 30, 1, day(1)),
            stat(1, "Amani", 20, 4, day(10)),
            stat(2, "Baraka", 45, 2, day(12)),
        ]);

        let all = store
            .fetch(&StatQuery {
                since: None,
                metric: RankingMetric::TotalPoints,
                limit: 10,
            })
            .await
            .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_id, MemberId(1));
        assert_eq!(all[0].total_points, 50);
        assert_eq!(all[0].current_streak, 4);
        assert_eq!(all[0].activity_date, day(10));

        let recent = store
            .fetch(&StatQuery {
                since: Some(day(5)),
                metric: RankingMetric::TotalPoints,
                limit: 10,
            })
            .await
            .unwrap();

        assert_eq!(recent[0].user_id, MemberId(2));
        assert_eq!(recent[1].total_points, 20);
        assert_eq!(store.fetch_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_nameless_rows_do_not_use_up_limit() {
        let day = Utc.with_ymd_and_hms(2026, 10, 12, 9, 0, 0).unwrap();
        let mut orphan = stat(8, "", 1_000, 0, day);
        orphan.display_name = None;
        let store = MemoryStatsStore::with_rows(vec![
            orphan,
            stat(1, "Amani", 100, 0, day),
            stat(2, "Baraka", 50, 0, day),
            stat(3, "Chausiku", 75, 0, day),
        ]);

        let rows = store
            .fetch(&StatQuery {
                since: None,
                metric: RankingMetric::TotalPoints,
                limit: 2,
            })
            .await
            .unwrap();

        let ids: Vec<i64> = rows.iter().map(|r| r.user_id.0).collect();
        assert_eq!(ids, vec![8, 1, 3]);
    }
}
