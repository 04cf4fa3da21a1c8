pub mod leaderboard;
pub mod member;
