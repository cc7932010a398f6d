#![allow(dead_code)]

//! Deterministic oracle doubles for engine and training tests.

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use faultgraph::message::{Message, render_dialog};
use faultgraph::oracle::{LLMOracle, LineClass, OracleError, YesNo, candidate_description};

/// One yes/no rule: fires when the question contains `question_contains`
/// and the rendered dialog contains `dialog_contains` (empty = any dialog).
#[derive(Clone)]
pub struct YesNoRule {
    pub question_contains: String,
    pub dialog_contains: String,
    pub verdict: YesNo,
}

/// One solution-vs-problem rule, matched on substrings of both sides.
#[derive(Clone)]
pub struct SolvesRule {
    pub solution_contains: String,
    pub problem_contains: String,
    pub verdict: YesNo,
}

/// A fully scripted oracle: every judgment is table-driven, so tests are
/// deterministic and repeated runs produce identical graphs.
#[derive(Default)]
pub struct ScriptedOracle {
    classifications: FxHashMap<String, LineClass>,
    canonical: FxHashMap<String, String>,
    equivalences: Vec<(String, String)>,
    yes_rules: Vec<YesNoRule>,
    solves_rules: Vec<SolvesRule>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify_as(mut self, line: &str, class: LineClass) -> Self {
        self.classifications.insert(line.to_string(), class);
        self
    }

    pub fn canonicalize_to(mut self, line: &str, canonical: &str) -> Self {
        self.canonical.insert(line.to_string(), canonical.to_string());
        self
    }

    pub fn equivalent_pair(mut self, a: &str, b: &str) -> Self {
        self.equivalences.push((a.to_string(), b.to_string()));
        self
    }

    pub fn yes_rule(mut self, question_contains: &str, dialog_contains: &str, verdict: YesNo) -> Self {
        self.yes_rules.push(YesNoRule {
            question_contains: question_contains.to_string(),
            dialog_contains: dialog_contains.to_string(),
            verdict,
        });
        self
    }

    pub fn solves_rule(mut self, solution_contains: &str, problem_contains: &str, verdict: YesNo) -> Self {
        self.solves_rules.push(SolvesRule {
            solution_contains: solution_contains.to_string(),
            problem_contains: problem_contains.to_string(),
            verdict,
        });
        self
    }

    fn are_equivalent(&self, a: &str, b: &str) -> bool {
        a == b
            || self
                .equivalences
                .iter()
                .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}

#[async_trait]
impl LLMOracle for ScriptedOracle {
    async fn classify(&self, line: &str) -> Result<LineClass, OracleError> {
        Ok(self
            .classifications
            .get(line)
            .copied()
            .unwrap_or(LineClass::Other))
    }

    async fn canonicalize_problem(&self, text: &str) -> Result<String, OracleError> {
        Ok(self
            .canonical
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }

    async fn equivalent(&self, a: &str, b: &str) -> Result<bool, OracleError> {
        Ok(self.are_equivalent(a, b))
    }

    async fn choose_best(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Option<usize>, OracleError> {
        Ok(candidates
            .iter()
            .position(|c| self.are_equivalent(candidate_description(c), query)))
    }

    async fn yes_no(&self, question: &str, dialog: &[Message]) -> Result<YesNo, OracleError> {
        let rendered = render_dialog(dialog);
        for rule in &self.yes_rules {
            if question.contains(&rule.question_contains)
                && (rule.dialog_contains.is_empty() || rendered.contains(&rule.dialog_contains))
            {
                return Ok(rule.verdict);
            }
        }
        Ok(YesNo::Unsure)
    }

    async fn pick_child(
        &self,
        _current_description: &str,
        _candidates: &[String],
        _dialog: &[Message],
    ) -> Result<Option<usize>, OracleError> {
        Ok(None)
    }

    async fn solution_solves_problem(
        &self,
        solution: &str,
        problem: &str,
    ) -> Result<YesNo, OracleError> {
        for rule in &self.solves_rules {
            if solution.contains(&rule.solution_contains)
                && problem.contains(&rule.problem_contains)
            {
                return Ok(rule.verdict);
            }
        }
        Ok(YesNo::Unsure)
    }

    async fn infer_problem_from_solution(&self, solution: &str) -> Result<String, OracleError> {
        Ok(format!("underlying condition for: {solution}"))
    }

    async fn pick_problem_for_solution(
        &self,
        solution: &str,
        candidates: &[String],
    ) -> Result<Option<usize>, OracleError> {
        for (i, candidate) in candidates.iter().enumerate() {
            let problem = candidate_description(candidate);
            for rule in &self.solves_rules {
                if rule.verdict == YesNo::Yes
                    && solution.contains(&rule.solution_contains)
                    && problem.contains(&rule.problem_contains)
                {
                    return Ok(Some(i));
                }
            }
        }
        Ok(None)
    }
}

/// An oracle whose transport is down: every call errors.
pub struct UnavailableOracle;

fn down() -> OracleError {
    OracleError::Unavailable {
        detail: "scripted outage".to_string(),
    }
}

#[async_trait]
impl LLMOracle for UnavailableOracle {
    async fn classify(&self, _line: &str) -> Result<LineClass, OracleError> {
        Err(down())
    }
    async fn canonicalize_problem(&self, _text: &str) -> Result<String, OracleError> {
        Err(down())
    }
    async fn equivalent(&self, _a: &str, _b: &str) -> Result<bool, OracleError> {
        Err(down())
    }
    async fn choose_best(
        &self,
        _query: &str,
        _candidates: &[String],
    ) -> Result<Option<usize>, OracleError> {
        Err(down())
    }
    async fn yes_no(&self, _q: &str, _d: &[Message]) -> Result<YesNo, OracleError> {
        Err(down())
    }
    async fn pick_child(
        &self,
        _c: &str,
        _cands: &[String],
        _d: &[Message],
    ) -> Result<Option<usize>, OracleError> {
        Err(down())
    }
    async fn solution_solves_problem(&self, _s: &str, _p: &str) -> Result<YesNo, OracleError> {
        Err(down())
    }
    async fn infer_problem_from_solution(&self, _s: &str) -> Result<String, OracleError> {
        Err(down())
    }
    async fn pick_problem_for_solution(
        &self,
        _s: &str,
        _c: &[String],
    ) -> Result<Option<usize>, OracleError> {
        Err(down())
    }
}
