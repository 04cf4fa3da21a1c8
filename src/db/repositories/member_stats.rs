use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::db::models::member::MemberStat;
use crate::db::repositories::{StatQuery, StatsStore, StoreResult};

pub mod sql_fragment {
    pub const STATS_TABLE: &str = "member_stats";
    pub const MEMBERS_TABLE: &str = "members";
}

/// Postgres-backed statistics store. Display names come from a left join on the members table,
/// so orphaned stats rows surface with a `NULL` name. Only named rows count towards `LIMIT`.
#[derive(Debug, Clone)]
pub struct MemberStatsRepository {
    pool: PgPool,
}

impl MemberStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn select_sql(query: &StatQuery) -> String {
        format!(
            r#"
            WITH totals AS (
                SELECT
                    ms.user_id AS user_id,
                    m.display_name AS display_name,
                    SUM(ms.total_points)::BIGINT AS total_points,
                    MAX(ms.current_streak)::BIGINT AS current_streak,
                    MAX(ms.activity_date) AS activity_date
                FROM {stats} ms
                LEFT JOIN {members} m ON ms.user_id = m.id
                WHERE ($1::TIMESTAMPTZ IS NULL OR ms.activity_date >= $1)
                GROUP BY ms.user_id, m.display_name
            ),
            ordered AS (
                SELECT
                    totals.*,
                    COUNT(display_name) OVER (
                        ORDER BY {metric} DESC, user_id ASC
                        ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
                    ) AS named_seen
                FROM totals
            )
            SELECT user_id, display_name, total_points, current_streak, activity_date
            FROM ordered
            WHERE (display_name IS NOT NULL AND named_seen <= $2)
               OR (display_name IS NULL AND named_seen < $2)
            ORDER BY {metric} DESC, user_id ASC
            "#,
            stats = sql_fragment::STATS_TABLE,
            members = sql_fragment::MEMBERS_TABLE,
            metric = query.metric.column(),
        )
    }
}

#[async_trait]
impl StatsStore for MemberStatsRepository {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self), fields(backend = self.backend_tag()))]
    async fn fetch(&self, query: &StatQuery) -> StoreResult<Vec<MemberStat>> {
        match sqlx::query_as::<_, MemberStat>(&Self::select_sql(query))
            .bind(query.since)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => {
                tracing::debug!(rows = rows.len(), "fetched member stats");
                Ok(rows)
            }
            Err(e) => {
                tracing::error!(error = ?e, "failure during member stats read");
                Err(e.into())
            }
        }
    }
}
