//! Memoizing oracle wrapper.
//!
//! Three judgments are stable per input and worth caching across a training
//! run: line classification, strict equivalence, and problem
//! canonicalization. Everything that depends on the dialog log or on a
//! mutable candidate list passes straight through.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::{PoisonError, RwLock};

use super::{LLMOracle, LineClass, OracleError, YesNo};
use crate::message::Message;

/// Wraps any oracle and memoizes its input-stable judgments.
///
/// Re-running the builder over the same corpus with a `CachedOracle` repeats
/// the same verdicts, which is what makes training stable.
pub struct CachedOracle<O> {
    inner: O,
    classify: RwLock<FxHashMap<String, LineClass>>,
    equivalent: RwLock<FxHashMap<(String, String), bool>>,
    canonical: RwLock<FxHashMap<String, String>>,
}

impl<O> CachedOracle<O> {
    #[must_use]
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            classify: RwLock::new(FxHashMap::default()),
            equivalent: RwLock::new(FxHashMap::default()),
            canonical: RwLock::new(FxHashMap::default()),
        }
    }
}

#[async_trait]
impl<O: LLMOracle> LLMOracle for CachedOracle<O> {
    async fn classify(&self, line: &str) -> Result<LineClass, OracleError> {
        if let Some(hit) = self
            .classify
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(line)
        {
            return Ok(*hit);
        }
        let verdict = self.inner.classify(line).await?;
        self.classify
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(line.to_string(), verdict);
        Ok(verdict)
    }

    async fn canonicalize_problem(&self, text: &str) -> Result<String, OracleError> {
        if let Some(hit) = self
            .canonical
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
        {
            return Ok(hit.clone());
        }
        let canonical = self.inner.canonicalize_problem(text).await?;
        self.canonical
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(text.to_string(), canonical.clone());
        Ok(canonical)
    }

    async fn equivalent(&self, a: &str, b: &str) -> Result<bool, OracleError> {
        let key = (a.to_string(), b.to_string());
        if let Some(hit) = self
            .equivalent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(*hit);
        }
        let verdict = self.inner.equivalent(a, b).await?;
        self.equivalent
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, verdict);
        Ok(verdict)
    }

    async fn choose_best(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Option<usize>, OracleError> {
        self.inner.choose_best(query, candidates).await
    }

    async fn yes_no(&self, question: &str, dialog: &[Message]) -> Result<YesNo, OracleError> {
        self.inner.yes_no(question, dialog).await
    }

    async fn pick_child(
        &self,
        current_description: &str,
        candidates: &[String],
        dialog: &[Message],
    ) -> Result<Option<usize>, OracleError> {
        self.inner
            .pick_child(current_description, candidates, dialog)
            .await
    }

    async fn solution_solves_problem(
        &self,
        solution: &str,
        problem: &str,
    ) -> Result<YesNo, OracleError> {
        self.inner.solution_solves_problem(solution, problem).await
    }

    async fn infer_problem_from_solution(&self, solution: &str) -> Result<String, OracleError> {
        self.inner.infer_problem_from_solution(solution).await
    }

    async fn pick_problem_for_solution(
        &self,
        solution: &str,
        candidates: &[String],
    ) -> Result<Option<usize>, OracleError> {
        self.inner
            .pick_problem_for_solution(solution, candidates)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls so the tests can observe cache hits.
    struct CountingOracle {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMOracle for CountingOracle {
        async fn classify(&self, _line: &str) -> Result<LineClass, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LineClass::Feature)
        }
        async fn canonicalize_problem(&self, text: &str) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_uppercase())
        }
        async fn equivalent(&self, _a: &str, _b: &str) -> Result<bool, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
        async fn choose_best(
            &self,
            _query: &str,
            _candidates: &[String],
        ) -> Result<Option<usize>, OracleError> {
            Ok(None)
        }
        async fn yes_no(&self, _q: &str, _d: &[Message]) -> Result<YesNo, OracleError> {
            Ok(YesNo::Unsure)
        }
        async fn pick_child(
            &self,
            _c: &str,
            _cands: &[String],
            _d: &[Message],
        ) -> Result<Option<usize>, OracleError> {
            Ok(None)
        }
        async fn solution_solves_problem(
            &self,
            _s: &str,
            _p: &str,
        ) -> Result<YesNo, OracleError> {
            Ok(YesNo::Unsure)
        }
        async fn infer_problem_from_solution(&self, s: &str) -> Result<String, OracleError> {
            Ok(s.to_string())
        }
        async fn pick_problem_for_solution(
            &self,
            _s: &str,
            _c: &[String],
        ) -> Result<Option<usize>, OracleError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn repeated_judgments_hit_the_cache() {
        let oracle = CachedOracle::new(CountingOracle {
            calls: AtomicUsize::new(0),
        });

        oracle.classify("the robot won't boot").await.unwrap();
        oracle.classify("the robot won't boot").await.unwrap();
        oracle.equivalent("a", "b").await.unwrap();
        oracle.equivalent("a", "b").await.unwrap();
        oracle.canonicalize_problem("battery?").await.unwrap();
        oracle.canonicalize_problem("battery?").await.unwrap();

        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn distinct_pairs_are_distinct_entries() {
        let oracle = CachedOracle::new(CountingOracle {
            calls: AtomicUsize::new(0),
        });
        oracle.equivalent("a", "b").await.unwrap();
        oracle.equivalent("b", "a").await.unwrap();
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 2);
    }
}
