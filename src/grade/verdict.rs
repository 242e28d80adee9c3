#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use serde_json::Value;

use crate::scripting::SynthesisError;

/// Marker carried by a passing line in the stored text encoding.
pub const PASS_MARKER: &str = "✅";
/// Marker carried by a mismatching line.
pub const FAIL_MARKER: &str = "❌";
/// Marker carried by lines reporting an error raised by the submitted code.
pub const ERROR_MARKER: &str = "⚠️";
/// Marker carried by lines reporting a badly authored test case.
pub const MALFORMED_MARKER: &str = "⛔";

/// Classified result of running one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The candidate returned the expected value.
    Pass,
    /// The candidate returned something else. Both sides are canonical JSON.
    Fail {
        /// Expected value, canonical JSON.
        expected: String,
        /// Returned value, canonical JSON.
        actual:   String,
    },
    /// The candidate raised an error for this input.
    RuntimeError(String),
    /// The test case itself could not be evaluated.
    MalformedCase(String),
}

impl Outcome {
    /// Whether this outcome counts towards solving the challenge.
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

/// The outcome of one test case, labelled with its 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// 1-based position of the case in the challenge.
    pub case_index: usize,
    /// What happened.
    pub outcome:    Outcome,
}

impl Verdict {
    /// Creates a verdict for the case at 1-based `case_index`.
    pub fn new(case_index: usize, outcome: Outcome) -> Self {
        Self {
            case_index,
            outcome,
        }
    }

    /// Renders the line stored alongside an attempt. Each outcome kind carries
    /// a fixed marker so consumers holding only the text can classify it.
    pub fn marked_line(&self) -> String {
        let n = self.case_index;
        match &self.outcome {
            Outcome::Pass => format!("Case {n}: {PASS_MARKER} Pass"),
            Outcome::Fail { expected, actual } => {
                format!("Case {n}: {FAIL_MARKER} Fail (expected {expected}, got {actual})")
            }
            Outcome::RuntimeError(message) => {
                format!("Case {n}: {ERROR_MARKER} Runtime error ({message})")
            }
            Outcome::MalformedCase(reason) => {
                format!("Case {n}: {MALFORMED_MARKER} Malformed case ({reason})")
            }
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = self.case_index;
        match &self.outcome {
            Outcome::Pass => write!(f, "Case {n}: Pass"),
            Outcome::Fail { expected, actual } => {
                write!(f, "Case {n}: Fail (expected {expected}, got {actual})")
            }
            Outcome::RuntimeError(message) => write!(f, "Case {n}: Runtime error ({message})"),
            Outcome::MalformedCase(reason) => write!(f, "Case {n}: Malformed case ({reason})"),
        }
    }
}

/// Renders the single stored line for a run whose source never became
/// callable.
pub fn synthesis_failure_line(err: &SynthesisError) -> String {
    format!("{ERROR_MARKER} Error running the code: {err}")
}

/// Kind of a stored result line, recovered from its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A passing case.
    Pass,
    /// A mismatching case.
    Fail,
    /// A case whose invocation raised an error.
    RuntimeError,
    /// A case that could not be evaluated.
    MalformedCase,
    /// The run-wide synthesis failure.
    SynthesisFailure,
    /// Text without any known marker.
    Unknown,
}

impl LineKind {
    /// Classifies a stored result line by the marker at its fixed position:
    /// right after the `Case N: ` (or `Caso N: `) label, or at the very start
    /// of an unlabelled line. Markers appearing later in the line are part of
    /// user-supplied text and never count.
    pub fn classify(line: &str) -> Self {
        match case_body(line) {
            Some(body) => {
                if body.starts_with(PASS_MARKER) {
                    LineKind::Pass
                } else if body.starts_with(FAIL_MARKER) {
                    LineKind::Fail
                } else if body.starts_with(MALFORMED_MARKER) {
                    LineKind::MalformedCase
                } else if body.starts_with(ERROR_MARKER) {
                    LineKind::RuntimeError
                } else {
                    LineKind::Unknown
                }
            }
            None if line.starts_with(ERROR_MARKER) => LineKind::SynthesisFailure,
            None if line.starts_with(PASS_MARKER) => LineKind::Pass,
            None if line.starts_with(FAIL_MARKER) => LineKind::Fail,
            None => LineKind::Unknown,
        }
    }
}

/// Returns what follows the `Case N: ` or `Caso N: ` label of `line`.
fn case_body(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("Case ")
        .or_else(|| line.strip_prefix("Caso "))?;
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    rest[digits..].strip_prefix(": ")
}

/// Whether every stored line reports a pass. Zero lines count as solved.
pub fn all_lines_pass<S: AsRef<str>>(lines: &[S]) -> bool {
    lines
        .iter()
        .all(|line| LineKind::classify(line.as_ref()) == LineKind::Pass)
}

/// Serializes `value` with object keys sorted at every level, so that two
/// values are structurally equal iff their canonical strings are equal.
pub fn canonical(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Appends the canonical form of `value` to `out`.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
