use core::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MemberId(pub i64);

/// Statistics for a single member as read from the stats table, joined to the member's display
/// name.
///
/// A `None` display name means the join found no member row for `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MemberStat {
    pub user_id: MemberId,
    pub display_name: Option<String>,
    pub total_points: i64,
    pub current_streak: i64,
    pub activity_date: DateTime<Utc>,
}

impl MemberStat {
    /// Folds another row for the same member into this one: points are summed (saturating), the
    /// longest streak and most recent activity win.
    pub fn absorb(&mut self, other: &MemberStat) {
        self.total_points = self.total_points.saturating_add(other.total_points);
        self.current_streak = self.current_streak.max(other.current_streak);
        self.activity_date = self.activity_date.max(other.activity_date);
        if self.display_name.is_none() {
            self.display_name = other.display_name.clone();
        }
    }
}

impl From<i64> for MemberId {
    fn from(value: i64) -> Self {
        MemberId(value)
    }
}

impl FromStr for MemberId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(MemberId)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_absorb_saturates_points() {
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
        let row = |points| MemberStat {
            user_id: MemberId(4),
            display_name: Some(String::from("Rehema")),
            total_points: points,
            current_streak: 0,
            activity_date: at,
        };

        let mut stat = row(i64::MAX - 5);
        stat.absorb(&row(10));
        assert_eq!(stat.total_points, i64::MAX);
    }

    #[test]
    fn test_absorb_merges_rows() {
        let early = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 10, 9, 8, 0, 0).unwrap();

        let mut stat = MemberStat {
            user_id: MemberId(4),
            display_name: None,
            total_points: 40,
            current_streak: 3,
            activity_date: early,
        };

        stat.absorb(&MemberStat {
            user_id: MemberId(4),
            display_name: Some("Wanjiru".into()),
            total_points: 15,
            current_streak: 1,
            activity_date: late,
        });

        assert_eq!(stat.total_points, 55);
        assert_eq!(stat.current_streak, 3);
        assert_eq!(stat.activity_date, late);
        assert_eq!(stat.display_name.as_deref(), Some("Wanjiru"));
    }

    #[test]
    fn test_member_id_parse() {
        assert_eq!(" 42 ".parse::<MemberId>().unwrap(), MemberId(42));
        assert!("forty-two".parse::<MemberId>().is_err());
    }
}
