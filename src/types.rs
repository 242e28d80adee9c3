#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Opaque identifier of a challenge.
///
/// Storage hands these out either as integers (database sequences) or as
/// strings; the grader only ever compares and echoes them back, so both forms
/// are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChallengeId {
    /// Numeric identifier, serialized as a JSON number.
    Int(i64),
    /// Textual identifier, serialized as a JSON string.
    Text(String),
}

impl Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeId::Int(id) => write!(f, "{id}"),
            ChallengeId::Text(id) => write!(f, "{id}"),
        }
    }
}

impl ChallengeId {
    /// Ids a user-typed `token` may refer to, in lookup order: the token as
    /// text first, then as an integer when it is written the way an integer
    /// id prints (so `"007"` never turns into `7`).
    pub fn lookup_candidates(token: &str) -> Vec<ChallengeId> {
        let mut candidates = vec![ChallengeId::Text(token.to_string())];
        match token.parse::<i64>() {
            Ok(n) if n.to_string() == token => candidates.push(ChallengeId::Int(n)),
            _ => {}
        }
        candidates
    }
}

impl From<i64> for ChallengeId {
    fn from(value: i64) -> Self {
        ChallengeId::Int(value)
    }
}

impl From<&str> for ChallengeId {
    fn from(value: &str) -> Self {
        ChallengeId::Text(value.to_string())
    }
}

impl From<String> for ChallengeId {
    fn from(value: String) -> Self {
        ChallengeId::Text(value)
    }
}

/// Opaque identifier of a user, as issued by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps an identifier issued by the authentication provider.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keeps an explicit JSON `null` as `Some(Value::Null)`; only a missing key
/// (handled by `#[serde(default)]`) becomes `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// One input/output pair of a challenge.
///
/// Both fields are kept as raw JSON so that a badly authored case still loads
/// and can be reported on its own instead of failing the whole challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct TestCase {
    /// Positional arguments for the candidate callable. Expected to be an
    /// array.
    #[serde(default)]
    #[builder(default)]
    pub input:    Value,
    /// Value the candidate must return. `None` when the key is absent.
    #[serde(
        rename = "output",
        alias = "expectedOutput",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected: Option<Value>,
}

impl TestCase {
    /// Creates a well-formed case from an argument list and expected value.
    pub fn new(input: Vec<Value>, expected: Value) -> Self {
        Self {
            input:    Value::Array(input),
            expected: Some(expected),
        }
    }

    /// Returns why this case cannot be evaluated, if it cannot.
    pub fn problem(&self) -> Option<&'static str> {
        if !self.input.is_array() {
            Some("input is not a list of arguments")
        } else if self.expected.is_none() {
            Some("expected output is missing")
        } else {
            None
        }
    }
}

/// A coding exercise: a starter template and an ordered list of test cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct Challenge {
    /// Stable identifier assigned by storage.
    #[builder(into)]
    pub id:              ChallengeId,
    /// Short title shown in listings.
    #[serde(rename = "titulo", default)]
    #[builder(default)]
    pub title:           String,
    /// Longer statement of the exercise.
    #[serde(rename = "descripcion", default)]
    #[builder(default)]
    pub description:     String,
    /// Language the template is written in.
    #[serde(rename = "lenguaje", default)]
    #[builder(default)]
    pub language:        String,
    /// Starter source shown to users who have not solved the challenge yet.
    #[serde(rename = "codigo_base", default)]
    #[builder(default)]
    pub source_template: String,
    /// Ordered test cases; the order defines the `Case N` labels.
    #[serde(default, deserialize_with = "nullable_cases")]
    #[builder(default)]
    pub test_cases:      Vec<TestCase>,
}

/// Treats a `null` test case column like an empty one.
fn nullable_cases<'de, D>(deserializer: D) -> Result<Vec<TestCase>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<TestCase>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Challenge {
    /// Lists the 1-based indices of cases that cannot be evaluated, with the
    /// reason for each.
    pub fn problems(&self) -> Vec<(usize, &'static str)> {
        self.test_cases
            .iter()
            .enumerate()
            .filter_map(|(i, case)| case.problem().map(|p| (i + 1, p)))
            .collect()
    }
}
