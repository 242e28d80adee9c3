#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// The per-case evaluation loop.
pub mod grader;
/// Grade result types.
pub mod results;
/// Attempt lifecycle for one editing session.
pub mod session;
/// Verdicts, their text encoding and structural comparison.
pub mod verdict;

pub use grader::Grader;
pub use results::{GradeResult, Report};
pub use session::{ChallengeSession, Phase, SessionError};
pub use verdict::{LineKind, Outcome, Verdict, all_lines_pass, canonical};
