use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::db::prelude::{MemberStat, ScoredMember, StatQuery, StatsStore};
use crate::leaderboard::kind::RankingMetric;
use crate::leaderboard::{LeaderboardError, LeaderboardParams, LeaderboardResult};

/// Resolves a leaderboard's window and metric, reads the matching aggregated stats and returns
/// them ordered and truncated.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    store: Arc<dyn StatsStore>,
}

impl QueryBuilder {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }

    pub fn stat_query(params: &LeaderboardParams, now: DateTime<Utc>) -> StatQuery {
        let policy = params.kind.policy();
        StatQuery {
            since: policy.window.since(now),
            metric: policy.metric,
            limit: params.limit.get(),
        }
    }

    #[instrument(skip(self, params), fields(kind = %params.kind, limit = params.limit.get(), backend = self.store.backend_tag()))]
    pub async fn build(
        &self,
        params: &LeaderboardParams,
        now: DateTime<Utc>,
    ) -> LeaderboardResult<Vec<ScoredMember>> {
        let query = Self::stat_query(params, now);
        let stats = self
            .store
            .fetch(&query)
            .await
            .map_err(LeaderboardError::StoreUnavailable)?;

        Ok(order(stats, &query))
    }
}

/// Applies the window, drops rows without a member identity, sorts by the metric descending with
/// ascending member id as tie-break, and truncates to the query's limit.
pub fn order(stats: Vec<MemberStat>, query: &StatQuery) -> Vec<ScoredMember> {
    let mut scored: Vec<ScoredMember> = stats
        .into_iter()
        .filter(|stat| query.admits(stat))
        .filter_map(|stat| resolve(stat, query.metric))
        .collect();

    scored.sort_by(|a, b| {
        b.ranking_score
            .cmp(&a.ranking_score)
            .then(a.user_id.cmp(&b.user_id))
    });
    scored.truncate(usize::try_from(query.limit).unwrap_or(0));

    scored
}

fn resolve(mut stat: MemberStat, metric: RankingMetric) -> Option<ScoredMember> {
    match stat.display_name.take() {
        Some(name) => {
            let score = metric.score(&stat);
            Some(ScoredMember::new(stat, name, score))
        }
        None => {
            tracing::warn!(
                error = %LeaderboardError::MissingMemberIdentity(stat.user_id),
                "excluding stats row from leaderboard"
            );
            None
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::db::repositories::memory::{MemoryStatsStore, stat};
    use crate::leaderboard::kind::LeaderboardKind;
    use crate::leaderboard::{Limit, LimitPolicy};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn params(kind: LeaderboardKind, limit: i64) -> LeaderboardParams {
        LeaderboardParams {
            kind,
            limit: Limit::new(limit, &LimitPolicy::default()).unwrap(),
        }
    }

    fn ids(scored: &[ScoredMember]) -> Vec<i64> {
        scored.iter().map(|s| s.user_id.0).collect()
    }

    #[test]
    fn test_stat_query_per_kind() {
        let weekly = QueryBuilder::stat_query(&params(LeaderboardKind::Weekly, 5), now());
        assert_eq!(weekly.since, Some(now() - Duration::days(7)));
        assert_eq!(weekly.metric, RankingMetric::TotalPoints);
        assert_eq!(weekly.limit, 5);

        let streaks = QueryBuilder::stat_query(&params(LeaderboardKind::Streaks, 5), now());
        assert_eq!(streaks.since, None);
        assert_eq!(streaks.metric, RankingMetric::CurrentStreak);
    }

    #[test]
    fn test_order_breaks_ties_by_member_id() {
        let query = StatQuery {
            since: None,
            metric: RankingMetric::TotalPoints,
            limit: 10,
        };
        let scored = order(
            vec![
                stat(9, "Imani", 60, 0, now()),
                stat(3, "Juma", 60, 0, now()),
                stat(5, "Kito", 80, 0, now()),
            ],
            &query,
        );

        assert_eq!(ids(&scored), vec![5, 3, 9]);
    }

    #[test]
    fn test_order_excludes_missing_identity() {
        let query = StatQuery {
            since: None,
            metric: RankingMetric::TotalPoints,
            limit: 10,
        };
        let mut orphan = stat(2, "", 500, 0, now());
        orphan.display_name = None;

        let scored = order(
            vec![stat(1, "Neema", 10, 0, now()), orphan, stat(3, "Zuri", 20, 0, now())],
            &query,
        );

        assert_eq!(ids(&scored), vec![3, 1]);
    }

    #[test]
    fn test_order_rechecks_window_and_limit() {
        let query = StatQuery {
            since: Some(now() - Duration::days(7)),
            metric: RankingMetric::TotalPoints,
            limit: 1,
        };
        let scored = order(
            vec![
                stat(1, "Old", 900, 0, now() - Duration::days(8)),
                stat(2, "Fresh", 10, 0, now()),
                stat(3, "Fresher", 20, 0, now()),
            ],
            &query,
        );

        assert_eq!(ids(&scored), vec![3]);
    }

    #[tokio::test]
    async fn test_build_reads_store_once() {
        let store = Arc::new(MemoryStatsStore::with_rows(vec![
            stat(1, "Amani", 100, 2, now()),
            stat(2, "Baraka", 50, 5, now()),
        ]));
        let builder = QueryBuilder::new(store.clone());

        let scored = builder
            .build(&params(LeaderboardKind::Streaks, 10), now())
            .await
            .unwrap();

        assert_eq!(ids(&scored), vec![2, 1]);
        assert_eq!(scored[0].ranking_score, 5);
        assert_eq!(scored[0].total_points, 50);
        assert_eq!(
            store.fetch_calls.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_build_surfaces_store_failure() {
        let store = Arc::new(MemoryStatsStore::default());
        store.set_unreachable(true);

        let err = QueryBuilder::new(store)
            .build(&params(LeaderboardKind::Overall, 10), now())
            .await
            .unwrap_err();

        assert!(matches!(err, LeaderboardError::StoreUnavailable(_)));
    }
}
