use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use uuid::Uuid;

use super::{AttemptRecord, AttemptStore, NewAttempt, StoreError};
use crate::types::{Challenge, ChallengeId, UserId};

/// Contents of a [`MemoryStore`].
#[derive(Default)]
struct Tables {
    /// Challenges, in insertion order.
    challenges: Vec<Challenge>,
    /// Attempts, oldest first.
    attempts:   Vec<AttemptRecord>,
}

/// An append-only store that lives as long as the process.
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Shared tables.
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `challenges`.
    pub fn with_challenges(challenges: impl IntoIterator<Item = Challenge>) -> Self {
        let store = Self::new();
        for challenge in challenges {
            store.add_challenge(challenge);
        }
        store
    }

    /// Adds or replaces a challenge.
    pub fn add_challenge(&self, challenge: Challenge) {
        let mut tables = self.lock();
        match tables.challenges.iter_mut().find(|c| c.id == challenge.id) {
            Some(existing) => *existing = challenge,
            None => tables.challenges.push(challenge),
        }
    }

    /// Returns every attempt recorded so far, oldest first.
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.lock().attempts.clone()
    }

    /// Locks the tables, recovering from a poisoned lock since every write
    /// leaves them consistent.
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AttemptStore for MemoryStore {
    async fn fetch_challenge(&self, id: &ChallengeId) -> Result<Challenge, StoreError> {
        self.lock()
            .challenges
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list_challenges(&self) -> Result<Vec<Challenge>, StoreError> {
        Ok(self.lock().challenges.clone())
    }

    async fn fetch_latest_attempt(
        &self,
        user: &UserId,
        challenge: &ChallengeId,
    ) -> Result<Option<AttemptRecord>, StoreError> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .rev()
            .find(|a| &a.user_id == user && &a.challenge_id == challenge)
            .cloned())
    }

    async fn persist_attempt(&self, attempt: &NewAttempt) -> Result<(), StoreError> {
        let record = AttemptRecord {
            id:           Some(Value::String(Uuid::new_v4().to_string())),
            user_id:      attempt.user_id.clone(),
            challenge_id: attempt.challenge_id.clone(),
            source:       attempt.source.clone(),
            lines:        Some(attempt.lines.clone()),
            solved:       Some(attempt.solved),
            created_at:   None,
        };
        self.lock().attempts.push(record);
        Ok(())
    }

    async fn list_attempts(&self, user: Option<&UserId>) -> Result<Vec<AttemptRecord>, StoreError> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .filter(|a| user.is_none_or(|u| &a.user_id == u))
            .cloned()
            .collect())
    }
}
