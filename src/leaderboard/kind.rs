//! Leaderboard types and the policy table that maps each one to a time window and an ordering
//! metric.

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, Utc};
use serde::Serialize;

use crate::db::models::member::MemberStat;
use crate::leaderboard::LeaderboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardKind {
    #[default]
    Overall,
    Weekly,
    Monthly,
    Streaks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMetric {
    TotalPoints,
    CurrentStreak,
}

/// Range of activity a leaderboard considers, counted back from the moment it is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    AllTime,
    TrailingDays(u64),
    TrailingMonths(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub kind: LeaderboardKind,
    pub window: Window,
    pub metric: RankingMetric,
}

/// Indexed by `LeaderboardKind as usize`.
const POLICIES: [Policy; 4] = [
    Policy {
        kind: LeaderboardKind::Overall,
        window: Window::AllTime,
        metric: RankingMetric::TotalPoints,
    },
    Policy {
        kind: LeaderboardKind::Weekly,
        window: Window::TrailingDays(7),
        metric: RankingMetric::TotalPoints,
    },
    Policy {
        kind: LeaderboardKind::Monthly,
        window: Window::TrailingMonths(1),
        metric: RankingMetric::TotalPoints,
    },
    Policy {
        kind: LeaderboardKind::Streaks,
        window: Window::AllTime,
        metric: RankingMetric::CurrentStreak,
    },
];

impl LeaderboardKind {
    pub const ALL: [LeaderboardKind; 4] = [
        LeaderboardKind::Overall,
        LeaderboardKind::Weekly,
        LeaderboardKind::Monthly,
        LeaderboardKind::Streaks,
    ];

    pub fn policy(self) -> &'static Policy {
        &POLICIES[self as usize]
    }

    /// Parses a free-form type name, falling back to [`LeaderboardKind::Overall`] when the value
    /// isn't recognised.
    pub fn parse_or_default(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        trimmed.parse().unwrap_or_else(|e: LeaderboardError| {
            tracing::warn!(error = %e, "falling back to overall leaderboard");
            Self::default()
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overall => "overall",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Streaks => "streaks",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Overall => "Overall Leaderboard",
            Self::Weekly => "Weekly Leaderboard",
            Self::Monthly => "Monthly Leaderboard",
            Self::Streaks => "Streaks Leaderboard",
        }
    }

    pub fn score_label(&self) -> &'static str {
        self.policy().metric.label()
    }
}

impl FromStr for LeaderboardKind {
    type Err = LeaderboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        LeaderboardKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| LeaderboardError::InvalidLeaderboardType(s.to_owned()))
    }
}

impl fmt::Display for LeaderboardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RankingMetric {
    /// Output column of the aggregated stats query this metric orders by.
    pub fn column(&self) -> &'static str {
        match self {
            Self::TotalPoints => "total_points",
            Self::CurrentStreak => "current_streak",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TotalPoints => "Points",
            Self::CurrentStreak => "Days",
        }
    }

    pub fn score(&self, stat: &MemberStat) -> i64 {
        match self {
            Self::TotalPoints => stat.total_points,
            Self::CurrentStreak => stat.current_streak,
        }
    }
}

impl Window {
    /// Earliest qualifying activity timestamp, inclusive. `None` means no lower bound.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Window::AllTime => None,
            Window::TrailingDays(days) => Some(
                now.checked_sub_days(Days::new(days))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
            Window::TrailingMonths(months) => Some(
                now.checked_sub_months(Months::new(months))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
        }
    }
}
