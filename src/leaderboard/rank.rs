use crate::db::prelude::{LeaderboardEntry, ScoredMember, Viewer};

/// Numbers an already-ordered sequence from 1 and flags the viewer's own row. The input order is
/// kept as-is.
pub fn assign(ordered: Vec<ScoredMember>, viewer: Viewer) -> Vec<LeaderboardEntry> {
    ordered
        .into_iter()
        .zip(1u32..)
        .map(|(member, rank)| member.into_leaderboard_entry(rank, viewer))
        .collect()
}
