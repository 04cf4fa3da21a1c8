use serde::{Deserialize, Serialize};

use crate::db::models::member::{MemberId, MemberStat};

/// The member a leaderboard is requested on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    Member(MemberId),
}

impl Viewer {
    pub fn is(&self, id: MemberId) -> bool {
        matches!(self, Viewer::Member(viewer) if *viewer == id)
    }
}

impl From<Option<MemberId>> for Viewer {
    fn from(value: Option<MemberId>) -> Self {
        value.map_or(Viewer::Anonymous, Viewer::Member)
    }
}

/// A member stat whose identity has been resolved, carrying the metric it was ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub user_id: MemberId,
    pub display_name: String,
    pub total_points: i64,
    pub ranking_score: i64,
}

impl ScoredMember {
    pub fn new(stat: MemberStat, display_name: String, ranking_score: i64) -> Self {
        Self {
            user_id: stat.user_id,
            display_name,
            total_points: stat.total_points,
            ranking_score,
        }
    }

    pub fn into_leaderboard_entry(self, rank: u32, viewer: Viewer) -> LeaderboardEntry {
        LeaderboardEntry {
            rank,
            is_current_user: viewer.is(self.user_id),
            user_id: self.user_id,
            display_name: self.display_name,
            ranking_score: self.ranking_score,
            total_points: self.total_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: MemberId,
    pub display_name: String,
    pub ranking_score: i64,
    pub total_points: i64,
    pub is_current_user: bool,
}
