use std::fmt;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::db::prelude::LeaderboardEntry;
use crate::leaderboard::kind::LeaderboardKind;

/// A ranked board plus the labels a presentation layer needs to show it.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardView {
    #[serde(rename = "type")]
    pub kind: LeaderboardKind,
    pub title: &'static str,
    pub score_label: &'static str,
    pub entries: Vec<LeaderboardEntry>,
}

impl LeaderboardView {
    pub fn new(kind: LeaderboardKind, entries: Vec<LeaderboardEntry>) -> Self {
        Self {
            kind,
            title: kind.title(),
            score_label: kind.score_label(),
            entries,
        }
    }
}

/// Turns a ranked board into a response body. Swappable so the same handlers can serve
/// different front ends.
pub trait RenderLeaderboard: Send + Sync + fmt::Debug {
    fn render(&self, view: LeaderboardView) -> Response;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl RenderLeaderboard for JsonRenderer {
    fn render(&self, view: LeaderboardView) -> Response {
        Json(view).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::prelude::MemberId;

    #[test]
    fn test_view_labels() {
        let view = LeaderboardView::new(
            LeaderboardKind::Streaks,
            vec![LeaderboardEntry {
                rank: 1,
                user_id: MemberId(4),
                display_name: String::from("Baraka"),
                ranking_score: 12,
                total_points: 40,
                is_current_user: false,
            }],
        );

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "streaks");
        assert_eq!(json["title"], "Streaks Leaderboard");
        assert_eq!(json["score_label"], "Days");
        assert_eq!(json["entries"][0]["display_name"], "Baraka");
    }
}
