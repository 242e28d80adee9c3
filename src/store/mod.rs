#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Where challenges come from and where graded attempts go.
//!
//! The grader only needs a handful of operations from storage. They are
//! collected in [`AttemptStore`]; [`MemoryStore`] keeps everything in process
//! and [`SupabaseStore`] talks to a PostgREST endpoint.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    grade::all_lines_pass,
    progress::{self, RankingEntry},
    types::{Challenge, ChallengeId, UserId},
};

/// In-process store.
pub mod memory;
/// Supabase/PostgREST store.
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

/// Errors raised by a record store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// No challenge has the requested id.
    #[error("No challenge matches id `{0}`")]
    NotFound(ChallengeId),
    /// The store could not be reached.
    #[error("Could not reach the record store: {0}")]
    Connectivity(String),
    /// The store answered with a non-success status.
    #[error("The record store rejected the request ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body:   String,
    },
    /// The store answered with something that could not be decoded.
    #[error("Could not decode the record store response: {0}")]
    Decode(String),
}

/// A graded attempt as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Storage-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id:           Option<Value>,
    /// Who submitted the attempt.
    pub user_id:      UserId,
    /// Which challenge it was for.
    pub challenge_id: ChallengeId,
    /// Source text as it was graded.
    #[serde(rename = "codigo")]
    pub source:       String,
    /// Marker-encoded result lines.
    #[serde(rename = "resultado", default)]
    pub lines:        Option<Vec<String>>,
    /// Solved flag, when the store recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved:       Option<bool>,
    /// Creation timestamp assigned by storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at:   Option<String>,
}

impl AttemptRecord {
    /// Whether this attempt solved its challenge. Rows written without a
    /// solved flag fall back to checking that every result line passed.
    pub fn is_solved(&self) -> bool {
        self.solved
            .unwrap_or_else(|| self.lines.as_deref().is_some_and(all_lines_pass))
    }
}

/// A graded attempt about to be appended to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
#[builder(on(String, into))]
pub struct NewAttempt {
    /// Who submitted the attempt.
    pub user_id:      UserId,
    /// Which challenge it was for.
    pub challenge_id: ChallengeId,
    /// Source text as it was graded.
    #[serde(rename = "codigo")]
    pub source:       String,
    /// Marker-encoded result lines.
    #[serde(rename = "resultado")]
    pub lines:        Vec<String>,
    /// Whether every case passed. Not sent to storage: the `submissions`
    /// table holds only the result lines, and readers recover the flag from
    /// them.
    #[serde(skip_serializing)]
    pub solved:       bool,
}

/// Operations the grader needs from storage.
///
/// Attempts are append-only: [`AttemptStore::persist_attempt`] always creates
/// a new record, even when an identical one already exists.
#[allow(async_fn_in_trait)]
pub trait AttemptStore {
    /// Looks up a challenge by id.
    async fn fetch_challenge(&self, id: &ChallengeId) -> Result<Challenge, StoreError>;

    /// Lists every challenge.
    async fn list_challenges(&self) -> Result<Vec<Challenge>, StoreError>;

    /// Returns the most recent attempt of `user` at `challenge`, if any.
    async fn fetch_latest_attempt(
        &self,
        user: &UserId,
        challenge: &ChallengeId,
    ) -> Result<Option<AttemptRecord>, StoreError>;

    /// Appends a graded attempt.
    async fn persist_attempt(&self, attempt: &NewAttempt) -> Result<(), StoreError>;

    /// Lists attempts oldest first, optionally only those of `user`.
    async fn list_attempts(&self, user: Option<&UserId>) -> Result<Vec<AttemptRecord>, StoreError>;

    /// Ranks users by distinct challenges solved. By default the ranking is
    /// tallied from every attempt this store can list.
    async fn fetch_ranking(&self) -> Result<Vec<RankingEntry>, StoreError> {
        Ok(progress::ranking(&self.list_attempts(None).await?))
    }
}

/// A store chosen at runtime.
#[derive(Clone)]
pub enum Backend {
    /// Keep everything in process.
    Memory(MemoryStore),
    /// Talk to Supabase.
    Supabase(SupabaseStore),
}

impl AttemptStore for Backend {
    async fn fetch_challenge(&self, id: &ChallengeId) -> Result<Challenge, StoreError> {
        match self {
            Backend::Memory(store) => store.fetch_challenge(id).await,
            Backend::Supabase(store) => store.fetch_challenge(id).await,
        }
    }

    async fn list_challenges(&self) -> Result<Vec<Challenge>, StoreError> {
        match self {
            Backend::Memory(store) => store.list_challenges().await,
            Backend::Supabase(store) => store.list_challenges().await,
        }
    }

    async fn fetch_latest_attempt(
        &self,
        user: &UserId,
        challenge: &ChallengeId,
    ) -> Result<Option<AttemptRecord>, StoreError> {
        match self {
            Backend::Memory(store) => store.fetch_latest_attempt(user, challenge).await,
            Backend::Supabase(store) => store.fetch_latest_attempt(user, challenge).await,
        }
    }

    async fn persist_attempt(&self, attempt: &NewAttempt) -> Result<(), StoreError> {
        match self {
            Backend::Memory(store) => store.persist_attempt(attempt).await,
            Backend::Supabase(store) => store.persist_attempt(attempt).await,
        }
    }

    async fn list_attempts(&self, user: Option<&UserId>) -> Result<Vec<AttemptRecord>, StoreError> {
        match self {
            Backend::Memory(store) => store.list_attempts(user).await,
            Backend::Supabase(store) => store.list_attempts(user).await,
        }
    }

    async fn fetch_ranking(&self) -> Result<Vec<RankingEntry>, StoreError> {
        match self {
            Backend::Memory(store) => store.fetch_ranking().await,
            Backend::Supabase(store) => store.fetch_ranking().await,
        }
    }
}
