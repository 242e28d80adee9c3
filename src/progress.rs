#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Summaries over stored attempts: a user's history, how many challenges they
//! solved, and the ranking across users.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use serde::Deserialize;

use crate::{
    grade::LineKind,
    store::AttemptRecord,
    types::{Challenge, ChallengeId, UserId},
};

/// One row of a user's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Challenge the attempt was for.
    pub challenge_id: ChallengeId,
    /// When storage recorded it, if known.
    pub created_at:   Option<String>,
    /// Whether it solved the challenge.
    pub solved:       bool,
    /// Number of passing result lines.
    pub passed:       usize,
    /// Number of result lines.
    pub total:        usize,
}

/// Lists `user`'s attempts, newest first. `records` must be oldest first.
pub fn history(records: &[AttemptRecord], user: &UserId) -> Vec<HistoryEntry> {
    records
        .iter()
        .rev()
        .filter(|r| &r.user_id == user)
        .map(|r| {
            let lines = r.lines.as_deref().unwrap_or_default();
            HistoryEntry {
                challenge_id: r.challenge_id.clone(),
                created_at:   r.created_at.clone(),
                solved:       r.is_solved(),
                passed:       lines
                    .iter()
                    .filter(|l| LineKind::classify(l) == LineKind::Pass)
                    .count(),
                total:        lines.len(),
            }
        })
        .collect()
}

/// Distinct challenges `user` has solved at least once.
pub fn solved_challenges(records: &[AttemptRecord], user: &UserId) -> BTreeSet<ChallengeId> {
    records
        .iter()
        .filter(|r| &r.user_id == user && r.is_solved())
        .map(|r| r.challenge_id.clone())
        .collect()
}

/// How far a user is through the available challenges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserProgress {
    /// Challenges solved that still exist.
    pub solved: usize,
    /// Challenges available.
    pub total:  usize,
}

impl UserProgress {
    /// Solved share as a percentage; zero when there is nothing to solve.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.solved as f64 * 100.0 / self.total as f64
        }
    }
}

/// Computes `user`'s progress through `challenges`.
pub fn progress(records: &[AttemptRecord], user: &UserId, challenges: &[Challenge]) -> UserProgress {
    let solved = solved_challenges(records, user);
    UserProgress {
        solved: challenges.iter().filter(|c| solved.contains(&c.id)).count(),
        total:  challenges.len(),
    }
}

/// One row of the ranking, shaped like the rows of the `get_ranking` RPC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RankingEntry {
    /// The ranked user.
    pub user_id:        UserId,
    /// Contact address, when the ranking source exposes one.
    #[serde(default)]
    pub email:          Option<String>,
    /// Distinct challenges solved.
    #[serde(rename = "completados")]
    pub completed:      usize,
    /// When storage recorded the user's most recent solving attempt.
    #[serde(rename = "ultimo_envio", default)]
    pub last_solved_at: Option<String>,
}

impl RankingEntry {
    /// Name shown in public listings: the email with its local part cut to
    /// three characters, or the user id when there is no email.
    pub fn display_name(&self) -> String {
        let Some(email) = self.email.as_deref() else {
            return self.user_id.to_string();
        };
        match email.find('@') {
            Some(at) if email[..at].chars().count() > 3 => {
                let head = email.chars().take(3).collect::<String>();
                format!("{head}***{}", &email[at..])
            }
            _ => email.to_string(),
        }
    }
}

/// Running tally for one user while building the ranking.
#[derive(Default)]
struct Tally {
    /// Challenges solved so far.
    solved:         BTreeSet<ChallengeId>,
    /// Position of the latest solving attempt in the record list.
    last_position:  usize,
    /// Timestamp of the latest solving attempt.
    last_solved_at: Option<String>,
}

/// Ranks users by distinct challenges solved, most first. Ties go to whoever
/// reached their count earlier, then by user id. `records` must be oldest
/// first; users without a solved challenge are left out.
pub fn ranking(records: &[AttemptRecord]) -> Vec<RankingEntry> {
    let mut tallies: HashMap<&UserId, Tally> = HashMap::new();

    for (position, record) in records.iter().enumerate() {
        if !record.is_solved() {
            continue;
        }
        let tally = tallies.entry(&record.user_id).or_default();
        if tally.solved.insert(record.challenge_id.clone()) {
            tally.last_position = position;
            tally.last_solved_at = record.created_at.clone();
        }
    }

    tallies
        .into_iter()
        .sorted_by(|(a_user, a), (b_user, b)| {
            b.solved
                .len()
                .cmp(&a.solved.len())
                .then(a.last_position.cmp(&b.last_position))
                .then(a_user.cmp(b_user))
        })
        .map(|(user, tally)| RankingEntry {
            user_id:        user.clone(),
            email:          None,
            completed:      tally.solved.len(),
            last_solved_at: tally.last_solved_at,
        })
        .collect()
}
