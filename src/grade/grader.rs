#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;

use super::{
    results::{GradeResult, Report},
    verdict::{Outcome, Verdict, canonical},
};
use crate::{
    scripting::{Candidate, RhaiSynthesizer, SynthesisError, Synthesizer},
    types::{Challenge, TestCase},
};

/// Runs a source text against every test case of a challenge.
///
/// Grading is synchronous and sequential: cases run one after the other in
/// challenge order, and nothing inside [`Grader::grade`] escapes as an error
/// or panic.
pub struct Grader<S = RhaiSynthesizer> {
    /// Turns source text into a callable once per run.
    synthesizer: S,
}

impl<S: Synthesizer> Grader<S> {
    /// Creates a grader backed by `synthesizer`.
    pub fn new(synthesizer: S) -> Self {
        Self { synthesizer }
    }

    /// Returns the synthesizer in use.
    pub fn synthesizer(&self) -> &S {
        &self.synthesizer
    }

    /// Grades `source` against `challenge`.
    ///
    /// The source is synthesized exactly once. If that fails, no case runs and
    /// the result carries only the synthesis failure. Otherwise every case
    /// gets a verdict, in order, and malformed cases or runtime errors do not
    /// stop the remaining cases.
    pub fn grade(&self, challenge: &Challenge, source: &str) -> GradeResult {
        if !challenge.language.is_empty()
            && !challenge
                .language
                .eq_ignore_ascii_case(self.synthesizer.language())
        {
            tracing::warn!(
                "Challenge {} is written for `{}` but submissions are evaluated as `{}`",
                challenge.id,
                challenge.language,
                self.synthesizer.language()
            );
        }

        let synthesized = catch_unwind(AssertUnwindSafe(|| self.synthesizer.synthesize(source)))
            .unwrap_or_else(|payload| {
                Err(SynthesisError::Evaluation(panic_message(payload.as_ref())))
            });

        let candidate = match synthesized {
            Ok(candidate) => candidate,
            Err(err) => {
                tracing::debug!("Synthesis failed for challenge {}: {err}", challenge.id);
                return GradeResult::new(Report::SynthesisFailed(err));
            }
        };

        let verdicts = challenge
            .test_cases
            .iter()
            .enumerate()
            .map(|(i, case)| Verdict::new(i + 1, evaluate(candidate.as_ref(), case)))
            .collect();

        GradeResult::new(Report::Graded(verdicts))
    }
}

/// Classifies a single test case against `candidate`.
fn evaluate(candidate: &dyn Candidate, case: &TestCase) -> Outcome {
    if let Some(problem) = case.problem() {
        return Outcome::MalformedCase(problem.to_string());
    }

    let (Value::Array(args), Some(expected)) = (&case.input, &case.expected) else {
        return Outcome::MalformedCase("test case has an unexpected shape".to_string());
    };

    let returned = match catch_unwind(AssertUnwindSafe(|| candidate.invoke(args))) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => return Outcome::RuntimeError(err.to_string()),
        Err(payload) => return Outcome::RuntimeError(panic_message(payload.as_ref())),
    };

    let expected = canonical(expected);
    let actual = canonical(&returned);
    if expected == actual {
        Outcome::Pass
    } else {
        Outcome::Fail { expected, actual }
    }
}

/// Extracts a printable message from a caught panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("the evaluator panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("the evaluator panicked: {message}")
    } else {
        "the evaluator panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::scripting::InvocationError;

    /// Candidate whose behaviour is fixed by the test.
    struct Scripted(fn(&[Value]) -> Result<Value, InvocationError>);

    impl Candidate for Scripted {
        fn invoke(&self, args: &[Value]) -> Result<Value, InvocationError> {
            (self.0)(args)
        }
    }

    /// Synthesizer that ignores the source and hands out a fixed candidate.
    struct Fixed(fn(&[Value]) -> Result<Value, InvocationError>);

    impl Synthesizer for Fixed {
        fn language(&self) -> &'static str {
            "fixed"
        }

        fn synthesize<'a>(
            &'a self,
            _source: &str,
        ) -> Result<Box<dyn Candidate + 'a>, SynthesisError> {
            Ok(Box::new(Scripted(self.0)))
        }
    }

    fn challenge(cases: Vec<TestCase>) -> Challenge {
        Challenge::builder().id(1_i64).test_cases(cases).build()
    }

    #[test]
    fn panicking_candidate_is_contained() {
        let grader = Grader::new(Fixed(|_| panic!("kaboom")));
        let result = grader.grade(&challenge(vec![TestCase::new(vec![], json!(1))]), "");

        assert_eq!(
            result.verdicts()[0].outcome,
            Outcome::RuntimeError("the evaluator panicked: kaboom".to_string())
        );
        assert!(!result.solved());
    }

    /// Synthesizer whose runtime panics before producing a candidate.
    struct Exploding;

    impl Synthesizer for Exploding {
        fn language(&self) -> &'static str {
            "exploding"
        }

        fn synthesize<'a>(
            &'a self,
            _source: &str,
        ) -> Result<Box<dyn Candidate + 'a>, SynthesisError> {
            panic!("parser blew up")
        }
    }

    #[test]
    fn panicking_synthesis_is_a_synthesis_failure() {
        let grader = Grader::new(Exploding);
        let result = grader.grade(&challenge(vec![TestCase::new(vec![], json!(1))]), "");

        assert_eq!(
            result.synthesis_error(),
            Some(&SynthesisError::Evaluation(
                "the evaluator panicked: parser blew up".to_string()
            ))
        );
        assert!(result.verdicts().is_empty());
        assert!(!result.solved());
    }

    #[test]
    fn zero_cases_grade_as_solved() {
        let grader = Grader::new(Fixed(|_| Ok(Value::Null)));
        let result = grader.grade(&challenge(vec![]), "");

        assert!(result.verdicts().is_empty());
        assert!(result.solved());
        assert!(result.lines().is_empty());
    }

    #[test]
    fn null_expected_output_compares_against_unit() {
        let grader = Grader::new(RhaiSynthesizer::default());
        let result = grader.grade(&challenge(vec![TestCase::new(vec![], Value::Null)]), "|| ()");
        assert_eq!(result.verdicts()[0].outcome, Outcome::Pass);
    }

    #[test]
    fn mismatch_records_both_canonical_values() {
        let grader = Grader::new(Fixed(|_| Ok(json!({"b": 2, "a": 1}))));
        let result = grader.grade(&challenge(vec![TestCase::new(vec![], json!({"a": 1}))]), "");

        assert_eq!(
            result.verdicts()[0].outcome,
            Outcome::Fail {
                expected: r#"{"a":1}"#.to_string(),
                actual:   r#"{"a":1,"b":2}"#.to_string(),
            }
        );
    }
}
