#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use super::verdict::{Verdict, synthesis_failure_line};
use crate::scripting::SynthesisError;

/// What a grading run produced before any persistence happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// The source never became callable; no case was run.
    SynthesisFailed(SynthesisError),
    /// One verdict per test case, in test case order.
    Graded(Vec<Verdict>),
}

/// The result of grading one source text against one challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeResult {
    /// Per-case verdicts, or the run-wide synthesis failure.
    report:   Report,
    /// Non-blocking problems noticed after grading, such as a failed save.
    warnings: Vec<String>,
}

impl GradeResult {
    /// Wraps a report with no warnings.
    pub fn new(report: Report) -> Self {
        Self {
            report,
            warnings: Vec::new(),
        }
    }

    /// Returns the underlying report.
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Returns the per-case verdicts; empty when synthesis failed.
    pub fn verdicts(&self) -> &[Verdict] {
        match &self.report {
            Report::Graded(verdicts) => verdicts,
            Report::SynthesisFailed(_) => &[],
        }
    }

    /// Returns the synthesis failure, if the run stopped there.
    pub fn synthesis_error(&self) -> Option<&SynthesisError> {
        match &self.report {
            Report::SynthesisFailed(err) => Some(err),
            Report::Graded(_) => None,
        }
    }

    /// True iff synthesis succeeded and every verdict is a pass. A challenge
    /// without test cases is vacuously solved.
    pub fn solved(&self) -> bool {
        match &self.report {
            Report::SynthesisFailed(_) => false,
            Report::Graded(verdicts) => verdicts.iter().all(|v| v.outcome.is_pass()),
        }
    }

    /// Renders the marker-encoded lines stored with an attempt.
    pub fn lines(&self) -> Vec<String> {
        match &self.report {
            Report::SynthesisFailed(err) => vec![synthesis_failure_line(err)],
            Report::Graded(verdicts) => verdicts.iter().map(Verdict::marked_line).collect(),
        }
    }

    /// Returns the warnings attached after grading.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Attaches a non-blocking warning.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}
