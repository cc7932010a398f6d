//! The LLM oracle capability.
//!
//! The engine and the training builder never speak HTTP; they consume the
//! [`LLMOracle`] trait, a small set of typed judgment operations. From the
//! caller's perspective the oracle is pure and stateless: each call takes
//! everything it needs (the question, the candidates, the dialog log) and
//! returns a typed verdict.
//!
//! Two failure regimes are kept strictly apart:
//!
//! - **Transport failure** (timeout, connection refused, HTTP error) is
//!   [`OracleError::Unavailable`]. Callers recover per behavior — retry,
//!   deterministic fallback, or failure transition.
//! - **Malformed replies** are *not* errors. A reply that cannot be parsed
//!   into the typed schema normalizes to [`YesNo::Unsure`] / `None`, because
//!   a confused model is evidence of nothing.
//!
//! [`openai`] implements the trait over an OpenAI-compatible chat endpoint;
//! [`cache`] adds memoization for the judgments that are stable per input.

pub mod cache;
pub mod openai;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::message::Message;

pub use cache::CachedOracle;
pub use openai::OpenAiOracle;

/// A grounded three-valued verdict.
///
/// `Unsure` means the dialog carries no decisive evidence; absence of
/// evidence is never treated as negation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
    Unsure,
}

impl YesNo {
    /// Collapses the verdict to a bool, mapping `Unsure` to `false`.
    #[must_use]
    pub fn is_yes(&self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

/// Coarse label assigned to one training line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineClass {
    /// An observable symptom or check ("the robot won't boot").
    Feature,
    /// A latent cause that cannot be observed directly ("battery depleted").
    Problem,
    /// A concrete corrective action ("charge the battery manually").
    Solution,
    /// Anything else; ignored by the builder.
    Other,
}

impl LineClass {
    /// Parses a label token leniently; anything unrecognized is `Other`.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "feature" => LineClass::Feature,
            "problem" => LineClass::Problem,
            "solution" => LineClass::Solution,
            _ => LineClass::Other,
        }
    }
}

/// Errors from the oracle transport.
#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    /// The endpoint did not produce a reply within the deadline.
    #[error("oracle unavailable: {detail}")]
    #[diagnostic(
        code(faultgraph::oracle::unavailable),
        help("check the endpoint, credentials and network; the call already retried once")
    )]
    Unavailable { detail: String },

    /// A required environment variable is missing.
    #[error("missing oracle configuration: {var}")]
    #[diagnostic(
        code(faultgraph::oracle::missing_config),
        help("set {var} in the environment or a .env file")
    )]
    MissingConfig { var: &'static str },
}

/// Typed LLM judgments consumed by the engine and the training builder.
///
/// Candidate lists are passed as `"id:description"` strings; implementations
/// match on the description only and return the index into the original list.
#[async_trait]
pub trait LLMOracle: Send + Sync {
    /// Labels one training line as feature / problem / solution / other.
    async fn classify(&self, line: &str) -> Result<LineClass, OracleError>;

    /// Rewrites a noisy line into a stable, searchable problem statement.
    async fn canonicalize_problem(&self, text: &str) -> Result<String, OracleError>;

    /// Strict same-fact equivalence: true only when `a` and `b` state the
    /// same fact and differ by rephrasing alone. Containment, shared
    /// platform words and symptom-vs-cause pairs are all non-equivalent.
    async fn equivalent(&self, a: &str, b: &str) -> Result<bool, OracleError>;

    /// Picks the candidate semantically equivalent to `query`, if any.
    async fn choose_best(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Option<usize>, OracleError>;

    /// Answers `question` strictly from the dialog log.
    async fn yes_no(&self, question: &str, dialog: &[Message]) -> Result<YesNo, OracleError>;

    /// Routes among sibling features: given the current node's description
    /// and the dialog, picks the follow-up check to descend into. May ask
    /// the user one disambiguation question through the injected
    /// interaction when several candidates stay plausible.
    async fn pick_child(
        &self,
        current_description: &str,
        candidates: &[String],
        dialog: &[Message],
    ) -> Result<Option<usize>, OracleError>;

    /// Whether `solution` directly addresses `problem`.
    async fn solution_solves_problem(
        &self,
        solution: &str,
        problem: &str,
    ) -> Result<YesNo, OracleError>;

    /// Infers the latent problem statement a solution was written for.
    async fn infer_problem_from_solution(&self, solution: &str) -> Result<String, OracleError>;

    /// Picks the candidate problem a solution belongs under, if any.
    async fn pick_problem_for_solution(
        &self,
        solution: &str,
        candidates: &[String],
    ) -> Result<Option<usize>, OracleError>;
}

/// Strips a leading `id:` prefix from a candidate label, leaving the
/// description that participates in semantic matching.
#[must_use]
pub fn candidate_description(candidate: &str) -> &str {
    match candidate.split_once(':') {
        Some((_, description)) => description.trim(),
        None => candidate.trim(),
    }
}

/// Normalizes a free-text reply into a three-valued verdict.
///
/// Recognizes the usual yes/no tokens and falls back to keyword scanning;
/// anything ambiguous is `Unsure`.
#[must_use]
pub fn normalize_yes_no(text: &str) -> YesNo {
    let cleaned = text
        .trim()
        .trim_matches(|c: char| "'\"`.,!?;:".contains(c))
        .to_ascii_lowercase();

    match cleaned.as_str() {
        "yes" | "y" | "true" | "t" | "1" => return YesNo::Yes,
        "no" | "n" | "false" | "f" | "0" => return YesNo::No,
        _ => {}
    }

    let words: Vec<&str> = cleaned
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| "'\"`.,!?;:".contains(c)))
        .collect();
    let positive = words.iter().any(|w| matches!(*w, "yes" | "true"));
    let negative = words
        .iter()
        .any(|w| matches!(*w, "no" | "not" | "false" | "never"));
    match (positive, negative) {
        (true, false) => YesNo::Yes,
        (false, true) => YesNo::No,
        _ => YesNo::Unsure,
    }
}
