//! # retos
//!
//! Grades small coding challenges ("retos"): the submitted source is turned
//! into a callable once, run against every test case of the challenge, and
//! the verdicts are stored as a new attempt.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Environment-driven configuration shared across the crate
pub mod config;
/// The grading engine and the attempt lifecycle
pub mod grade;
/// History, progress and ranking summaries over stored attempts
pub mod progress;
/// Synthesizing callables from submitted source text
pub mod scripting;
/// Record stores for challenges and attempts
pub mod store;
/// Challenge and identifier types
pub mod types;

pub use grade::{ChallengeSession, GradeResult, Grader, Outcome, Phase, SessionError, Verdict};
pub use scripting::{RhaiSynthesizer, SynthesisError, Synthesizer};
pub use store::{AttemptStore, Backend, MemoryStore, StoreError, SupabaseStore};
pub use types::{Challenge, ChallengeId, TestCase, UserId};
