use rhai::{AST, Dynamic, Engine, EvalAltResult, FnPtr};
use serde_json::Value;

use super::{Candidate, InvocationError, Synthesizer, SynthesisError};

/// Synthesizes candidates by evaluating source text with an embedded Rhai
/// engine.
///
/// The source is compiled as a script whose final value must be a function
/// pointer, usually a closure such as `|a, b| a + b`.
pub struct RhaiSynthesizer {
    /// Engine shared by every candidate this synthesizer produces.
    engine: Engine,
}

impl Default for RhaiSynthesizer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RhaiSynthesizer {
    /// Creates a synthesizer. `max_operations` caps the work a single
    /// evaluation or call may do; `None` leaves it unbounded.
    pub fn new(max_operations: Option<u64>) -> Self {
        let mut engine = Engine::new();
        if let Some(limit) = max_operations {
            engine.set_max_operations(limit);
        }
        Self { engine }
    }

    /// Creates a synthesizer using the operation limit from the global
    /// configuration.
    pub fn from_config() -> Self {
        Self::new(crate::config::max_operations())
    }
}

impl Synthesizer for RhaiSynthesizer {
    fn language(&self) -> &'static str {
        "rhai"
    }

    fn synthesize<'a>(&'a self, source: &str) -> Result<Box<dyn Candidate + 'a>, SynthesisError> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| SynthesisError::Syntax(e.to_string()))?;

        let value = self
            .engine
            .eval_ast::<Dynamic>(&ast)
            .map_err(|e| SynthesisError::Evaluation(describe(&e)))?;

        let type_name = value.type_name().to_string();
        let fn_ptr = value
            .try_cast::<FnPtr>()
            .ok_or(SynthesisError::NotCallable { type_name })?;

        Ok(Box::new(RhaiCandidate {
            engine: &self.engine,
            ast,
            fn_ptr,
        }))
    }
}

/// A Rhai function pointer together with the script it was defined in.
struct RhaiCandidate<'a> {
    /// Engine used for every call.
    engine: &'a Engine,
    /// Compiled script; closures resolve their bodies against it.
    ast:    AST,
    /// The function value the script evaluated to.
    fn_ptr: FnPtr,
}

impl Candidate for RhaiCandidate<'_> {
    fn invoke(&self, args: &[Value]) -> Result<Value, InvocationError> {
        let args = args
            .iter()
            .map(|arg| {
                rhai::serde::to_dynamic(arg)
                    .map_err(|e| InvocationError(format!("could not pass argument: {}", describe(&e))))
            })
            .collect::<Result<Vec<Dynamic>, _>>()?;

        let returned = self
            .fn_ptr
            .call::<Dynamic>(self.engine, &self.ast, args)
            .map_err(|e| InvocationError(describe(&e)))?;

        rhai::serde::from_dynamic::<Value>(&returned).map_err(|_| {
            InvocationError(format!(
                "returned a value of type `{}` that cannot be compared",
                returned.type_name()
            ))
        })
    }
}

/// Renders a Rhai error for users, unwrapping function-call wrappers and
/// showing thrown values without the `Runtime error:` prefix.
fn describe(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => describe(inner),
        EvalAltResult::ErrorRuntime(value, _) if !value.is_unit() => value.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn closure_source_becomes_callable() {
        let synth = RhaiSynthesizer::default();
        let candidate = synth.synthesize("|a, b| a + b").expect("synthesize");
        assert_eq!(candidate.invoke(&[json!(1), json!(2)]), Ok(json!(3)));
    }

    #[test]
    fn named_function_pointer_is_callable() {
        let synth = RhaiSynthesizer::default();
        let candidate = synth
            .synthesize("fn twice(x) { x * 2 }\nFn(\"twice\")")
            .expect("synthesize");
        assert_eq!(candidate.invoke(&[json!(21)]), Ok(json!(42)));
    }

    #[test]
    fn unbalanced_brace_is_a_syntax_error() {
        let synth = RhaiSynthesizer::default();
        let err = synth.synthesize("{").err().expect("must fail");
        assert!(matches!(err, SynthesisError::Syntax(_)));
    }

    #[test]
    fn throwing_during_evaluation_is_reported() {
        let synth = RhaiSynthesizer::default();
        let err = synth.synthesize("throw \"nope\"").err().expect("must fail");
        assert_eq!(err, SynthesisError::Evaluation("nope".to_string()));
    }

    #[test]
    fn non_callable_value_is_rejected() {
        let synth = RhaiSynthesizer::default();
        let err = synth.synthesize("40 + 2").err().expect("must fail");
        assert!(matches!(err, SynthesisError::NotCallable { .. }));
    }

    #[test]
    fn thrown_value_surfaces_as_invocation_error() {
        let synth = RhaiSynthesizer::default();
        let candidate = synth
            .synthesize("|x| { if x < 0 { throw \"negative\"; } x }")
            .expect("synthesize");
        assert_eq!(candidate.invoke(&[json!(-1)]), Err(InvocationError("negative".to_string())));
    }

    #[test]
    fn structured_values_cross_the_boundary() {
        let synth = RhaiSynthesizer::default();
        let candidate = synth
            .synthesize("|xs| { let out = []; for x in xs { out.push(x * x); } out }")
            .expect("synthesize");
        assert_eq!(candidate.invoke(&[json!([1, 2, 3])]), Ok(json!([1, 4, 9])));
    }

    #[test]
    fn operation_limit_stops_runaway_loops() {
        let synth = RhaiSynthesizer::new(Some(10_000));
        let candidate = synth.synthesize("|| { loop { } }").expect("synthesize");
        assert!(candidate.invoke(&[]).is_err());
    }
}
