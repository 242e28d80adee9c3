#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use super::{grader::Grader, results::GradeResult};
use crate::{
    scripting::{RhaiSynthesizer, Synthesizer},
    store::{AttemptStore, NewAttempt, StoreError},
    types::{Challenge, ChallengeId, UserId},
};

/// Where an attempt is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The source can be edited and run.
    Editable,
    /// A run is in progress; edits and further runs are refused.
    Running,
    /// Every case passed. Terminal for this session.
    Solved,
}

/// Reasons a session refuses an edit or a run.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The attempt already solved the challenge and is read-only.
    #[error("This challenge is already solved; the attempt is read-only.")]
    Solved,
    /// Another run of this attempt has not finished yet.
    #[error("A run of this attempt is still in progress.")]
    AlreadyRunning,
}

/// Resets the phase to [`Phase::Editable`] if a run is abandoned before it
/// finishes, e.g. when its future is dropped while persisting.
struct RunGuard<'a> {
    /// Phase of the owning session.
    phase: &'a mut Phase,
    /// Set once the run settled on its next phase.
    done:  bool,
}

impl<'a> RunGuard<'a> {
    /// Marks the session as running.
    fn start(phase: &'a mut Phase) -> Self {
        *phase = Phase::Running;
        Self { phase, done: false }
    }

    /// Moves the session to `next` and disarms the guard.
    fn finish(mut self, next: Phase) {
        *self.phase = next;
        self.done = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.phase = Phase::Editable;
        }
    }
}

/// One user's attempt at one challenge, for the lifetime of an editing
/// session.
///
/// The session owns the editable source and enforces the attempt lifecycle:
/// runs are single-flight, and once a run solves the challenge the attempt
/// latches read-only.
pub struct ChallengeSession<St, S = RhaiSynthesizer> {
    /// Where attempts are read from and appended to.
    store:     St,
    /// Grades the current source.
    grader:    Grader<S>,
    /// Who is attempting.
    user:      UserId,
    /// What is being attempted.
    challenge: Challenge,
    /// Current source text.
    source:    String,
    /// Lifecycle phase.
    phase:     Phase,
    /// Result of the most recent run in this session.
    last:      Option<GradeResult>,
}

impl<St: AttemptStore, S: Synthesizer> ChallengeSession<St, S> {
    /// Fetches challenge `id` and opens a session on it.
    pub async fn load(
        store: St,
        grader: Grader<S>,
        user: UserId,
        id: &ChallengeId,
    ) -> Result<Self, StoreError> {
        let challenge = store.fetch_challenge(id).await?;
        Ok(Self::open(store, grader, user, challenge).await)
    }

    /// Opens a session on `challenge`.
    ///
    /// If the user's latest stored attempt solved the challenge, its source is
    /// shown and the session starts latched. Otherwise the template is shown.
    /// Failing to read previous attempts is logged and treated as having none.
    pub async fn open(store: St, grader: Grader<S>, user: UserId, challenge: Challenge) -> Self {
        let previous = match store.fetch_latest_attempt(&user, &challenge.id).await {
            Ok(previous) => previous,
            Err(err) => {
                tracing::warn!("Could not load previous attempts at {}: {err}", challenge.id);
                None
            }
        };

        let (source, phase) = match previous {
            Some(record) if record.is_solved() => (record.source, Phase::Solved),
            _ => (challenge.source_template.clone(), Phase::Editable),
        };

        Self {
            store,
            grader,
            user,
            challenge,
            source,
            phase,
            last: None,
        }
    }

    /// The challenge being attempted.
    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    /// The user attempting it.
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// The current source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the attempt has latched as solved.
    pub fn is_solved(&self) -> bool {
        self.phase == Phase::Solved
    }

    /// Whether a run may be started now.
    pub fn can_run(&self) -> bool {
        self.phase == Phase::Editable
    }

    /// The result of the most recent run in this session.
    pub fn last_result(&self) -> Option<&GradeResult> {
        self.last.as_ref()
    }

    /// The store this session writes to.
    pub fn store(&self) -> &St {
        &self.store
    }

    /// Replaces the source text.
    pub fn edit(&mut self, source: impl Into<String>) -> Result<(), SessionError> {
        match self.phase {
            Phase::Solved => Err(SessionError::Solved),
            Phase::Running => Err(SessionError::AlreadyRunning),
            Phase::Editable => {
                self.source = source.into();
                Ok(())
            }
        }
    }

    /// Grades the current source, appends the outcome to the store and
    /// latches the session if every case passed.
    ///
    /// A store failure does not fail the run: it is attached to the result as
    /// a warning and the verdicts are returned as usual.
    pub async fn run(&mut self) -> Result<GradeResult, SessionError> {
        match self.phase {
            Phase::Solved => return Err(SessionError::Solved),
            Phase::Running => return Err(SessionError::AlreadyRunning),
            Phase::Editable => {}
        }

        let guard = RunGuard::start(&mut self.phase);

        let mut result = self.grader.grade(&self.challenge, &self.source);
        let solved = result.solved();

        let attempt = NewAttempt::builder()
            .user_id(self.user.clone())
            .challenge_id(self.challenge.id.clone())
            .source(self.source.clone())
            .lines(result.lines())
            .solved(solved)
            .build();

        if let Err(err) = self.store.persist_attempt(&attempt).await {
            tracing::warn!("Could not save attempt at {}: {err}", self.challenge.id);
            result.push_warning(format!("Your attempt could not be saved: {err}"));
        }

        tracing::info!(
            "Graded challenge {} for {}: {}/{} cases passed",
            self.challenge.id,
            self.user,
            result.verdicts().iter().filter(|v| v.outcome.is_pass()).count(),
            self.challenge.test_cases.len()
        );

        guard.finish(if solved { Phase::Solved } else { Phase::Editable });
        self.last = Some(result.clone());
        Ok(result)
    }
}
