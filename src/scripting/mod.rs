//! Turning submitted source text into something that can be called.
//!
//! The grader never talks to a scripting runtime directly. It asks a
//! [`Synthesizer`] for a [`Candidate`] and feeds it JSON arguments; which
//! runtime sits behind the trait is a configuration choice.

use serde_json::Value;

/// Rhai-backed synthesizer.
pub mod rhai_engine;

pub use rhai_engine::RhaiSynthesizer;

/// Reasons a source text could not be turned into a callable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The source text does not parse.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// The source text parsed but threw while being evaluated.
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    /// The source text evaluated to something that cannot be invoked.
    #[error("the code evaluated to a value of type `{type_name}`, which is not a function")]
    NotCallable {
        /// Runtime type name of the value produced.
        type_name: String,
    },
}

/// A failure raised while invoking a candidate with one set of arguments.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvocationError(pub String);

/// A callable synthesized from source text.
pub trait Candidate {
    /// Calls the candidate with `args` as positional arguments.
    fn invoke(&self, args: &[Value]) -> Result<Value, InvocationError>;
}

/// Converts source text into a [`Candidate`].
pub trait Synthesizer {
    /// Short identifier of the embedded language ("rhai", ...).
    fn language(&self) -> &'static str;

    /// Evaluates `source` exactly once and returns the callable it produces.
    fn synthesize<'a>(&'a self, source: &str) -> Result<Box<dyn Candidate + 'a>, SynthesisError>;
}
