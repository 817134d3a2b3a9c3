//! Leaderboard ranking engine
//!
//! A [`Board`] is the ordered list of best scores for one leaderboard key.
//! It is always:
//!
//! - sorted by `sort_value` descending (higher is better; ties keep the
//!   earlier achiever ahead)
//! - unique by `user_id`
//! - capped at [`MAX_BOARD_ENTRIES`]
//!
//! The engine is pure: it never touches storage or the transport. The local
//! simulator loads a board, applies one operation, and writes it back.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SdkError;

/// Board used when the caller doesn't name one
pub const DEFAULT_LEADERBOARD: &str = "default";

/// Entries kept per board
pub const MAX_BOARD_ENTRIES: usize = 1000;

/// Entries returned by a rank window
pub const WINDOW_SIZE: usize = 50;

/// Upper bound of `getTop`'s limit
pub const MAX_TOP_LIMIT: usize = 100;

/// Max characters in player names and display values
pub const MAX_NAME_CHARS: usize = 50;

/// A stored score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub player_name: String,
    pub display_value: String,
    pub sort_value: f64,
    /// Unix milliseconds of the submission that set this score
    pub submitted_at: i64,
}

/// A score submission, also the `leaderboard:submit` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub player_name: String,
    pub display_value: String,
    pub sort_value: f64,
}

impl Submission {
    pub fn new(
        player_name: impl Into<String>,
        display_value: impl Into<String>,
        sort_value: f64,
    ) -> Self {
        Self {
            key: None,
            player_name: player_name.into(),
            display_value: display_value.into(),
            sort_value,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Reject empty or oversized names and non-finite scores.
    pub fn validate(&self) -> Result<(), SdkError> {
        validate_label("playerName", &self.player_name)?;
        validate_label("displayValue", &self.display_value)?;
        if !self.sort_value.is_finite() {
            return Err(SdkError::invalid_input("sortValue must be a finite number"));
        }
        Ok(())
    }
}

fn validate_label(field: &str, value: &str) -> Result<(), SdkError> {
    if value.trim().is_empty() {
        return Err(SdkError::invalid_input(format!("{} must not be empty", field)));
    }
    if value.chars().count() > MAX_NAME_CHARS {
        return Err(SdkError::invalid_input(format!(
            "{} must be at most {} characters",
            field, MAX_NAME_CHARS
        )));
    }
    Ok(())
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub success: bool,
    /// 1-based rank, `None` when the score fell off the capped board
    pub rank: Option<usize>,
    pub is_new_best: bool,
    pub on_leaderboard: bool,
}

/// One row of a leaderboard view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub rank: usize,
    pub player_name: String,
    pub display_value: String,
    pub is_current_user: bool,
}

/// Rank window returned by `leaderboard:get`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPage {
    pub entries: Vec<RankedEntry>,
    #[serde(default)]
    pub user_rank: Option<usize>,
    #[serde(default)]
    pub total: usize,
}

/// Clamp a caller-supplied `getTop` limit to `[1, MAX_TOP_LIMIT]`.
pub fn clamp_limit(limit: i64) -> usize {
    limit.clamp(1, MAX_TOP_LIMIT as i64) as usize
}

/// Ordered, capped, unique-by-user list of scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    entries: Vec<LeaderboardEntry>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from stored entries, restoring every invariant.
    ///
    /// Non-finite scores are dropped; for duplicate users the best score wins.
    pub fn from_entries(mut entries: Vec<LeaderboardEntry>) -> Self {
        entries.retain(|e| e.sort_value.is_finite());
        sort_descending(&mut entries);

        let mut seen = HashSet::new();
        entries.retain(|e| seen.insert(e.user_id.clone()));
        entries.truncate(MAX_BOARD_ENTRIES);

        Self { entries }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 1-based rank of `user_id`, if on the board.
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.user_id == user_id)
            .map(|i| i + 1)
    }

    pub fn entry_for(&self, user_id: &str) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|e| e.user_id == user_id)
    }

    /// Record a score for `user_id`. The submission must already be validated.
    ///
    /// An existing entry is replaced only by a strictly greater score.
    pub fn submit(&mut self, user_id: &str, submission: &Submission, now_ms: i64) -> SubmitOutcome {
        let is_new_best = match self.entries.iter().position(|e| e.user_id == user_id) {
            None => {
                self.entries.push(LeaderboardEntry {
                    user_id: user_id.to_string(),
                    player_name: submission.player_name.clone(),
                    display_value: submission.display_value.clone(),
                    sort_value: submission.sort_value,
                    submitted_at: now_ms,
                });
                true
            }
            Some(i) if submission.sort_value > self.entries[i].sort_value => {
                let entry = &mut self.entries[i];
                entry.player_name = submission.player_name.clone();
                entry.display_value = submission.display_value.clone();
                entry.sort_value = submission.sort_value;
                entry.submitted_at = now_ms;
                true
            }
            Some(_) => false,
        };

        sort_descending(&mut self.entries);
        self.entries.truncate(MAX_BOARD_ENTRIES);

        let rank = self.rank_of(user_id);
        SubmitOutcome {
            success: true,
            rank,
            is_new_best,
            on_leaderboard: rank.is_some(),
        }
    }

    /// Up to [`WINDOW_SIZE`] entries around the caller's rank.
    ///
    /// Ranked callers get `[rank-25, rank+25)`, shifted to stay inside the
    /// board and to stay full whenever the board holds enough entries.
    /// Unranked callers (anonymous, or off the board) get the top entries.
    pub fn window(&self, user_id: Option<&str>) -> LeaderboardPage {
        let user_rank = user_id.and_then(|id| self.rank_of(id));
        let len = self.entries.len();

        let (start, end) = match user_rank {
            Some(rank) => {
                let start = (rank - 1).saturating_sub(WINDOW_SIZE / 2);
                let end = (start + WINDOW_SIZE).min(len);
                (end.saturating_sub(WINDOW_SIZE), end)
            }
            None => (0, WINDOW_SIZE.min(len)),
        };

        LeaderboardPage {
            entries: self.ranked(start, end, user_id),
            user_rank,
            total: len,
        }
    }

    /// The first `limit` entries (clamped to `[1, MAX_TOP_LIMIT]`).
    pub fn top(&self, limit: i64, user_id: Option<&str>) -> Vec<RankedEntry> {
        let end = clamp_limit(limit).min(self.entries.len());
        self.ranked(0, end, user_id)
    }

    fn ranked(&self, start: usize, end: usize, user_id: Option<&str>) -> Vec<RankedEntry> {
        self.entries[start..end]
            .iter()
            .enumerate()
            .map(|(offset, e)| RankedEntry {
                rank: start + offset + 1,
                player_name: e.player_name.clone(),
                display_value: e.display_value.clone(),
                is_current_user: user_id == Some(e.user_id.as_str()),
            })
            .collect()
    }
}

// Stable: equal scores keep their existing order.
fn sort_descending(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| b.sort_value.total_cmp(&a.sort_value));
}
