//! Oracle implementation over an OpenAI-compatible chat-completions endpoint.
//!
//! Configuration comes from the environment (a `.env` file is honored):
//!
//! - `OPENAI_API_KEY` — required
//! - `OPENAI_API_BASE_URL` — default `https://api.openai.com/v1`
//! - `LLM_MODEL` — default `gpt-4o-mini`
//! - `ORACLE_TIMEOUT_SECS` — per-call deadline, default 60
//!
//! Every call carries the bounded deadline; a miss surfaces as
//! [`OracleError::Unavailable`] after one retry with a short randomized
//! delay. Reply parsing is layered: strict JSON first, then a bare
//! number / keyword scan, then (for equivalence selection) a
//! normalized-text exact match. A reply that defeats every layer is a
//! non-answer, never an error.

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{LLMOracle, LineClass, OracleError, YesNo, candidate_description, normalize_yes_no};
use crate::interact::Interaction;
use crate::message::{Message, render_dialog};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const CLASSIFY_SYS: &str = "You label one sentence from a fault-diagnosis chain with exactly one \
of four tags:\n\
- feature: an observable symptom or directly checkable condition (e.g. \"the robot won't boot\")\n\
- problem: a latent, not directly observable cause or condition (e.g. \"the battery is dead\")\n\
- solution: a concrete corrective action or procedure\n\
- other: anything else\n\
Output only the lowercase tag, nothing else.";

const CANONICALIZE_SYS: &str = "Rewrite the input as one concise, reusable problem statement. \
It must be searchable and action-oriented, carry no surrounding context, and be a declarative \
sentence. Output the sentence only.";

const EQUIVALENT_SYS: &str = "You are a strict equivalence judge. Answer yes only when the two \
statements state the same fact, phenomenon or step and differ by rephrasing alone (synonyms, \
word order, punctuation). Never equivalent: statements sharing a platform or device word but \
describing different information; containment or subset relations; different objects, parts, \
metrics, states or actions; a symptom versus its cause; a plan versus its steps. If in doubt, \
answer no. Output only yes or no.";

const SELECT_SYS: &str = "You are a strict synonym matcher. From the numbered candidates, find \
the one semantically equivalent to the query: same fact, same phenomenon or same step, differing \
by rephrasing alone. Sharing a platform word is not equivalence; containment is not equivalence; \
a symptom is not its cause; if unsure, there is no match. Output strict JSON only: \
{\"index\": <number or null>}.";

const YES_NO_SYS: &str = "You are a strict binary judge. Decide the answer to question Q using \
only the dialog R.\nHard rules:\n1) Base the verdict on explicit textual evidence in R; never \
extrapolate or use world knowledge.\n2) If R does not mention it or no firm conclusion follows, \
return unsure (\"not mentioned\" is not \"no\").\nOutput strict JSON only: \
{\"answer\":\"yes\"|\"no\"|\"unsure\"}.";

const PICK_CHILD_SYS: &str = "A troubleshooting session is at the checkpoint described by C. \
The numbered candidates are follow-up checks. Using only the dialog R, return the candidates \
that are plausible next checks (consistent with what the user has said, not ruled out). Output \
strict JSON only: {\"indices\": [<numbers>]} — an empty array when none fit.";

const SOLVES_SYS: &str = "Decide whether solution S directly addresses problem P. Strict rules: \
a symptom is not its cause; containment or overlap is not a match; different modules or fields \
never match. Output strict JSON only: {\"match\": true|false|null}.";

const INFER_PROBLEM_SYS: &str = "You are given a corrective action. Infer the latent problem it \
was written to fix. The problem must be a non-observable cause or fault condition, not an \
action, phrased as one concise declarative sentence. Output the sentence only.";

const PICK_PROBLEM_SYS: &str = "Given solution S and numbered candidate problems, a candidate \
matches only when S directly fixes it. Strict rules: a symptom is not its cause; containment is \
not a match; never match on loose association. Candidates may look like \"ID:description\"; \
judge the description only. Output strict JSON only: {\"index\": <number or null>}.";

/// Few-shot exchanges for the equivalence selector, mirroring the judgment
/// style the training corpus needs: strict, and biased toward "no match".
fn select_few_shots() -> Vec<Message> {
    vec![
        Message::user("Query: the robot cannot power on\nCandidates:\n0. robot won't boot\nJSON only."),
        Message::assistant("{\"index\": 0}"),
        Message::user("Query: console confirms the AP is offline\nCandidates:\n0. console shows an error code\nJSON only."),
        Message::assistant("{\"index\": null}"),
        Message::user("Query: check whether the battery cable is loose\nCandidates:\n0. reseat the battery cable\nJSON only."),
        Message::assistant("{\"index\": null}"),
        Message::user("Query: the AP is offline in the console\nCandidates:\n0. console shows an error code\n1. AP offline in the console\nJSON only."),
        Message::assistant("{\"index\": 1}"),
    ]
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// OpenAI-compatible chat-completions oracle.
pub struct OpenAiOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    interaction: Arc<dyn Interaction>,
}

impl OpenAiOracle {
    /// Builds an oracle with explicit credentials and default endpoint,
    /// model and deadline.
    #[must_use]
    pub fn new(api_key: impl Into<String>, interaction: Arc<dyn Interaction>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            interaction,
        }
    }

    /// Builds an oracle from the environment (reads `.env` when present).
    pub fn from_env(interaction: Arc<dyn Interaction>) -> Result<Self, OracleError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(OracleError::MissingConfig {
                var: "OPENAI_API_KEY",
            })?;

        let mut oracle = Self::new(api_key, interaction);
        if let Ok(base) = std::env::var("OPENAI_API_BASE_URL") {
            oracle.base_url = base.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            oracle.model = model;
        }
        if let Some(secs) = std::env::var("ORACLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            oracle.timeout = Duration::from_secs(secs);
        }
        Ok(oracle)
    }

    /// Overrides the endpoint; used to point at self-hosted gateways.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// One chat-completions round trip with the configured deadline and a
    /// single retry on transport failure.
    async fn chat(&self, messages: &[Message], temperature: f32) -> Result<String, OracleError> {
        let mut last: Option<OracleError> = None;
        for attempt in 0..2u8 {
            if attempt > 0 {
                let jitter_ms: u64 = rand::rng().random_range(150..=450);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            }
            match self.send(messages, temperature).await {
                Ok(content) => return Ok(content),
                Err(error) => {
                    warn!(%error, attempt, "oracle call failed");
                    last = Some(error);
                }
            }
        }
        Err(last.unwrap_or(OracleError::Unavailable {
            detail: "no attempt was made".to_string(),
        }))
    }

    async fn send(&self, messages: &[Message], temperature: f32) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "n": 1,
            "stream": false,
        });

        let unavailable = |detail: String| OracleError::Unavailable { detail };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("reply envelope: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| unavailable("reply carried no choices".to_string()))
    }
}

#[async_trait]
impl LLMOracle for OpenAiOracle {
    async fn classify(&self, line: &str) -> Result<LineClass, OracleError> {
        let messages = [
            Message::system(CLASSIFY_SYS),
            Message::user(&format!("Sentence: {line}")),
        ];
        let raw = self.chat(&messages, 0.0).await?;
        let token = raw.split_whitespace().next().unwrap_or_default();
        Ok(LineClass::parse(token))
    }

    async fn canonicalize_problem(&self, text: &str) -> Result<String, OracleError> {
        let messages = [
            Message::system(CANONICALIZE_SYS),
            Message::user(&format!("Input: {text}")),
        ];
        let raw = self.chat(&messages, 0.2).await?;
        let line = first_line(&raw);
        Ok(if line.is_empty() {
            text.trim().to_string()
        } else {
            line
        })
    }

    async fn equivalent(&self, a: &str, b: &str) -> Result<bool, OracleError> {
        let messages = [
            Message::system(EQUIVALENT_SYS),
            Message::user(&format!("A: {a}\nB: {b}\nSame fact?")),
        ];
        let raw = self.chat(&messages, 0.0).await?;
        Ok(normalize_yes_no(&first_line(&raw)).is_yes())
    }

    async fn choose_best(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Option<usize>, OracleError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let descriptions: Vec<&str> = candidates
            .iter()
            .map(|c| candidate_description(c))
            .collect();
        let numbered = numbered_list(&descriptions);

        let mut messages = vec![Message::system(SELECT_SYS)];
        messages.extend(select_few_shots());
        messages.push(Message::user(&format!(
            "Query: {query}\nCandidates:\n{numbered}\nJSON only."
        )));

        let raw = self.chat(&messages, 0.0).await?;
        if let Some(index) = parse_index_reply(&raw, candidates.len()) {
            return Ok(Some(index));
        }

        // Last layer: normalized-text exact match.
        let wanted = squash(query);
        Ok(descriptions.iter().position(|d| squash(d) == wanted))
    }

    async fn yes_no(&self, question: &str, dialog: &[Message]) -> Result<YesNo, OracleError> {
        let messages = [
            Message::system(YES_NO_SYS),
            Message::user(&format!("Q: {question}\nR:\n{}", render_dialog(dialog))),
        ];
        let raw = self.chat(&messages, 0.0).await?;
        Ok(parse_answer_reply(&raw))
    }

    async fn pick_child(
        &self,
        current_description: &str,
        candidates: &[String],
        dialog: &[Message],
    ) -> Result<Option<usize>, OracleError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let descriptions: Vec<&str> = candidates
            .iter()
            .map(|c| candidate_description(c))
            .collect();
        let numbered = numbered_list(&descriptions);
        let messages = [
            Message::system(PICK_CHILD_SYS),
            Message::user(&format!(
                "C: {current_description}\nR:\n{}\nCandidates:\n{numbered}\nJSON only.",
                render_dialog(dialog)
            )),
        ];
        let raw = self.chat(&messages, 0.0).await?;
        let plausible = parse_indices_reply(&raw, candidates.len());

        match plausible.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            several => {
                debug!(count = several.len(), "disambiguating among plausible checks");
                Ok(Some(
                    self.disambiguate(&descriptions, several).await,
                ))
            }
        }
    }

    async fn solution_solves_problem(
        &self,
        solution: &str,
        problem: &str,
    ) -> Result<YesNo, OracleError> {
        let messages = [
            Message::system(SOLVES_SYS),
            Message::user(&format!("P: {problem}\nS: {solution}\nJSON only.")),
        ];
        let raw = self.chat(&messages, 0.0).await?;
        Ok(parse_match_reply(&raw))
    }

    async fn infer_problem_from_solution(&self, solution: &str) -> Result<String, OracleError> {
        let messages = [
            Message::system(INFER_PROBLEM_SYS),
            Message::user(&format!("Corrective action: {solution}")),
        ];
        let raw = self.chat(&messages, 0.0).await?;
        let line = first_line(&raw);
        Ok(if line.is_empty() {
            format!("unresolved condition addressed by: {solution}")
        } else {
            line
        })
    }

    async fn pick_problem_for_solution(
        &self,
        solution: &str,
        candidates: &[String],
    ) -> Result<Option<usize>, OracleError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let display: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let numbered = numbered_list(&display);
        let messages = [
            Message::system(PICK_PROBLEM_SYS),
            Message::user(&format!("S: {solution}\nCandidates:\n{numbered}\nJSON only.")),
        ];
        let raw = self.chat(&messages, 0.0).await?;
        if let Some(index) = parse_index_reply(&raw, candidates.len()) {
            return Ok(Some(index));
        }

        // Fall back to pairwise judgment, taking the first strict yes.
        for (i, candidate) in candidates.iter().enumerate() {
            let verdict = self
                .solution_solves_problem(solution, candidate_description(candidate))
                .await?;
            if verdict == YesNo::Yes {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

impl OpenAiOracle {
    /// Asks the user to pick among the plausible checks. Any unparseable
    /// answer falls back to the first plausible candidate.
    async fn disambiguate(&self, descriptions: &[&str], plausible: &[usize]) -> usize {
        let mut question =
            String::from("Several checks could apply. Which one matches your situation?\n");
        for (display, &idx) in plausible.iter().enumerate() {
            question.push_str(&format!("{}. {}\n", display + 1, descriptions[idx]));
        }
        question.push_str("Answer with a number.");

        let first = plausible[0];
        let Ok(reply) = self.interaction.ask(&question).await else {
            return first;
        };

        if let Some(choice) = first_integer(&reply) {
            if choice >= 1 && choice <= plausible.len() {
                return plausible[choice - 1];
            }
        }
        let lowered = reply.to_ascii_lowercase();
        plausible
            .iter()
            .copied()
            .find(|&idx| lowered.contains(&descriptions[idx].to_ascii_lowercase()))
            .unwrap_or(first)
    }
}

// ----------------------------------------------------------------------
// reply parsing
// ----------------------------------------------------------------------

fn first_line(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Extracts the outermost `{...}` span so fenced or chatty replies still
/// parse as JSON.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn first_integer(raw: &str) -> Option<usize> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Parses `{"index": n | null}` replies, tolerating bare numbers and the
/// words none/null. Out-of-range indices are dropped.
fn parse_index_reply(raw: &str, len: usize) -> Option<usize> {
    if let Some(json) = extract_json(raw) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(json) {
            return match value.get("index") {
                Some(serde_json::Value::Number(n)) => n
                    .as_u64()
                    .map(|n| n as usize)
                    .filter(|&n| n < len),
                _ => None,
            };
        }
    }
    let lowered = raw.to_ascii_lowercase();
    if lowered.contains("none") || lowered.contains("null") {
        return None;
    }
    first_integer(raw).filter(|&n| n < len)
}

/// Parses `{"indices": [..]}` replies; falls back to a single-index parse.
/// Out-of-range entries are dropped, duplicates collapsed, order kept.
fn parse_indices_reply(raw: &str, len: usize) -> Vec<usize> {
    if let Some(json) = extract_json(raw) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(json) {
            if let Some(list) = value.get("indices").and_then(|v| v.as_array()) {
                let mut out: Vec<usize> = Vec::new();
                for item in list {
                    if let Some(n) = item.as_u64().map(|n| n as usize).filter(|&n| n < len) {
                        if !out.contains(&n) {
                            out.push(n);
                        }
                    }
                }
                return out;
            }
        }
    }
    parse_index_reply(raw, len).into_iter().collect()
}

/// Parses `{"answer": "yes"|"no"|"unsure"}` replies with a keyword fallback.
fn parse_answer_reply(raw: &str) -> YesNo {
    if let Some(json) = extract_json(raw) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(json) {
            if let Some(answer) = value.get("answer").and_then(|v| v.as_str()) {
                return match answer.to_ascii_lowercase().as_str() {
                    "yes" => YesNo::Yes,
                    "no" => YesNo::No,
                    _ => YesNo::Unsure,
                };
            }
        }
    }
    normalize_yes_no(&first_line(raw))
}

/// Parses `{"match": true|false|null}` replies with a keyword fallback.
fn parse_match_reply(raw: &str) -> YesNo {
    if let Some(json) = extract_json(raw) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(json) {
            return match value.get("match") {
                Some(serde_json::Value::Bool(true)) => YesNo::Yes,
                Some(serde_json::Value::Bool(false)) => YesNo::No,
                Some(serde_json::Value::Null) => YesNo::Unsure,
                _ => YesNo::Unsure,
            };
        }
    }
    normalize_yes_no(&first_line(raw))
}

fn numbered_list(items: &[&str]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{i}. {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lowercases and strips whitespace and common punctuation, for the
/// exact-match fallback of the equivalence selector.
fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !",.;:!?\"'`".contains(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
