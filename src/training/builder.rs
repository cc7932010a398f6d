//! The incremental training builder.
//!
//! The builder walks each segment line by line, classifies every line, and
//! splices nodes and edges into the graph while preserving its invariants.
//! Matching is local-first: an existing child of the cursor wins over a
//! global match, and a global match is only reused after the strict
//! equivalence judge confirms it. Everything else becomes a new node.
//!
//! Training is monotone and greedy: nodes and edges are only ever added,
//! duplicate connections are skipped idempotently, and the graph is
//! checkpointed every ~5% of segments so a long run can crash without
//! losing the morning's work.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::corpus::split_segments;
use crate::codec::{CodecError, GraphCodec};
use crate::graph::{ConnectOptions, Graph, GraphError, Node};
use crate::oracle::{LLMOracle, LineClass, OracleError, YesNo};
use crate::types::{NodeId, NodeKind};

/// Errors that abort a training run.
///
/// Oracle transport failures are unrecoverable here by design: the client
/// already retried, and silently guessing labels would corrupt the graph's
/// semantics far more durably than a failed run does.
#[derive(Debug, Error, Diagnostic)]
pub enum TrainError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

/// Summary of one training run.
#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub segments: usize,
    pub lines: usize,
    pub ignored_lines: usize,
    pub features_created: usize,
    pub features_reused: usize,
    pub problems_created: usize,
    pub problems_reused: usize,
    pub solutions_created: usize,
    pub solutions_reused: usize,
    pub checkpoints: usize,
}

impl Default for TrainingReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingReport {
    /// An empty report stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            segments: 0,
            lines: 0,
            ignored_lines: 0,
            features_created: 0,
            features_reused: 0,
            problems_created: 0,
            problems_reused: 0,
            solutions_created: 0,
            solutions_reused: 0,
            checkpoints: 0,
        }
    }
}

/// Cursor state threaded through one segment.
struct SegmentCursor {
    at: NodeId,
    last_problem: Option<NodeId>,
}

/// Grows a graph from line-oriented fault-diagnosis chains.
pub struct TrainingBuilder {
    oracle: Arc<dyn LLMOracle>,
}

impl TrainingBuilder {
    #[must_use]
    pub fn new(oracle: Arc<dyn LLMOracle>) -> Self {
        Self { oracle }
    }

    /// Trains on a whole corpus, checkpointing to `save_path` every
    /// `max(1, 5%)` of segments and once at the end.
    pub async fn train_corpus(
        &self,
        graph: &mut Graph,
        text: &str,
        save_path: &Path,
    ) -> Result<TrainingReport, TrainError> {
        let segments = split_segments(text);
        let total = segments.len();
        let checkpoint_every = std::cmp::max(1, total / 20);
        let mut report = TrainingReport::new();

        info!(segments = total, "training started");
        for (index, segment) in segments.iter().enumerate() {
            debug!(segment = index + 1, total, first_line = %segment[0], "processing segment");
            self.train_segment(graph, segment, &mut report).await?;
            report.segments += 1;

            let done = index + 1;
            if done % checkpoint_every == 0 || done == total {
                GraphCodec::save(graph, save_path)?;
                report.checkpoints += 1;
                let progress = format!("{done}/{total}");
                info!(progress = %progress, nodes = graph.len(), "checkpoint saved");
            }
        }
        if total == 0 {
            // An empty corpus still persists the (possibly empty) graph.
            GraphCodec::save(graph, save_path)?;
            report.checkpoints += 1;
        }

        report.finished_at = Utc::now();
        info!(
            segments = report.segments,
            nodes = graph.len(),
            checkpoints = report.checkpoints,
            "training finished"
        );
        Ok(report)
    }

    /// Trains on one segment: a cursor starts at the root, every line moves
    /// or grows the graph, and the cursor resets when the segment ends.
    pub async fn train_segment(
        &self,
        graph: &mut Graph,
        lines: &[String],
        report: &mut TrainingReport,
    ) -> Result<(), TrainError> {
        let mut cursor = SegmentCursor {
            at: graph.root_id().clone(),
            last_problem: None,
        };

        let mut first_nonempty = true;
        for raw in lines {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            report.lines += 1;

            // The opening line of a chain is the reported symptom; it is a
            // feature no matter how the classifier would read it in isolation.
            let class = if first_nonempty {
                first_nonempty = false;
                LineClass::Feature
            } else {
                self.oracle.classify(line).await?
            };
            debug!(%line, ?class, cursor = %cursor.at, "training line");

            match class {
                LineClass::Feature => {
                    self.ingest_feature(graph, &mut cursor, line, report).await?;
                }
                LineClass::Problem => {
                    self.ingest_problem(graph, &mut cursor, line, report).await?;
                }
                LineClass::Solution => {
                    self.ingest_solution(graph, &mut cursor, line, report).await?;
                }
                LineClass::Other => {
                    report.ignored_lines += 1;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // feature lines
    // ------------------------------------------------------------------

    async fn ingest_feature(
        &self,
        graph: &mut Graph,
        cursor: &mut SegmentCursor,
        line: &str,
        report: &mut TrainingReport,
    ) -> Result<(), TrainError> {
        // Local reuse: an existing child feature of the cursor.
        let local = child_features_of(graph, &cursor.at);
        if !local.is_empty() {
            let labels = candidate_labels(graph, &local);
            if let Some(index) = self.oracle.choose_best(line, &labels).await? {
                if let Some(chosen) = local.get(index) {
                    debug!(feature = %chosen, "reusing local child feature");
                    cursor.at = chosen.clone();
                    cursor.last_problem = None;
                    report.features_reused += 1;
                    return Ok(());
                }
            }
        }

        // Global reuse: any feature in the graph, but only after the strict
        // equivalence judge confirms the selector's pick.
        let all: Vec<(NodeId, String)> = graph
            .all_of_kind(NodeKind::Feature)
            .into_iter()
            .map(|n| (n.id.clone(), n.description.clone()))
            .collect();
        if !all.is_empty() {
            let labels: Vec<String> = all
                .iter()
                .map(|(id, desc)| format!("{id}:{desc}"))
                .collect();
            if let Some(index) = self.oracle.choose_best(line, &labels).await? {
                if let Some((id, desc)) = all.get(index) {
                    if self.oracle.equivalent(desc, line).await? {
                        match graph.connect(&cursor.at, id, ConnectOptions::default()) {
                            Ok(_) => debug!(feature = %id, under = %cursor.at, "linked existing feature"),
                            Err(error) => {
                                debug!(%error, feature = %id, "could not link existing feature, keeping structure");
                            }
                        }
                        cursor.at = id.clone();
                        cursor.last_problem = None;
                        report.features_reused += 1;
                        return Ok(());
                    }
                }
            }
        }

        // New feature under the cursor, falling back to the root when the
        // cursor cannot legally parent a feature.
        let id = fresh_id(graph, NodeKind::Feature);
        graph.insert(Node::feature(id.clone(), line))?;
        if graph
            .connect(&cursor.at, &id, ConnectOptions::default())
            .is_err()
        {
            let root = graph.root_id().clone();
            graph.connect(&root, &id, ConnectOptions::default())?;
            debug!(feature = %id, "new feature attached to root as fallback");
        } else {
            debug!(feature = %id, under = %cursor.at, "new feature");
        }
        cursor.at = id;
        cursor.last_problem = None;
        report.features_created += 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // problem lines
    // ------------------------------------------------------------------

    async fn ingest_problem(
        &self,
        graph: &mut Graph,
        cursor: &mut SegmentCursor,
        line: &str,
        report: &mut TrainingReport,
    ) -> Result<(), TrainError> {
        self.rewind_to_feature(graph, cursor, "grouping condition derived from training", report)
            .await?;

        let canonical = self.oracle.canonicalize_problem(line).await?;

        // Local reuse among the feature's own problems.
        let local: Vec<NodeId> = graph
            .get(&cursor.at)
            .map(|n| n.child_problems().iter().map(|l| l.problem.clone()).collect())
            .unwrap_or_default();
        if !local.is_empty() {
            let labels = candidate_labels(graph, &local);
            if let Some(index) = self.oracle.choose_best(&canonical, &labels).await? {
                if let Some(chosen) = local.get(index) {
                    debug!(problem = %chosen, "reusing local child problem");
                    cursor.at = chosen.clone();
                    cursor.last_problem = Some(chosen.clone());
                    report.problems_reused += 1;
                    return Ok(());
                }
            }
        }

        // Global reuse, strict-equivalence gated; shared problems link soft.
        let all: Vec<(NodeId, String)> = graph
            .all_of_kind(NodeKind::Problem)
            .into_iter()
            .map(|n| (n.id.clone(), n.description.clone()))
            .collect();
        if !all.is_empty() {
            let labels: Vec<String> = all
                .iter()
                .map(|(id, desc)| format!("{id}:{desc}"))
                .collect();
            if let Some(index) = self.oracle.choose_best(&canonical, &labels).await? {
                if let Some((id, desc)) = all.get(index) {
                    if self.oracle.equivalent(desc, &canonical).await? {
                        if let Err(error) = graph.connect(&cursor.at, id, ConnectOptions::soft()) {
                            debug!(%error, problem = %id, "could not link existing problem");
                        }
                        cursor.at = id.clone();
                        cursor.last_problem = Some(id.clone());
                        report.problems_reused += 1;
                        return Ok(());
                    }
                }
            }
        }

        // New problem; the link-mode policy promotes a feature's first
        // problem to hard regardless of the soft request.
        let id = fresh_id(graph, NodeKind::Problem);
        graph.insert(Node::problem(id.clone(), canonical))?;
        let feature = cursor.at.clone();
        graph.connect(&feature, &id, ConnectOptions::soft())?;
        debug!(problem = %id, under = %feature, "new problem");
        cursor.at = id.clone();
        cursor.last_problem = Some(id);
        report.problems_created += 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // solution lines
    // ------------------------------------------------------------------

    async fn ingest_solution(
        &self,
        graph: &mut Graph,
        cursor: &mut SegmentCursor,
        line: &str,
        report: &mut TrainingReport,
    ) -> Result<(), TrainError> {
        let target = self.solution_target(graph, cursor, line, report).await?;

        // Reuse an equivalent existing solution under the target problem.
        let existing: Vec<NodeId> = graph
            .get(&target)
            .map(|n| n.solutions().to_vec())
            .unwrap_or_default();
        if !existing.is_empty() {
            let labels = candidate_labels(graph, &existing);
            if let Some(index) = self.oracle.choose_best(line, &labels).await? {
                if let Some(chosen) = existing.get(index) {
                    if graph.repair_solution_success(chosen)? {
                        debug!(solution = %chosen, "repaired stale success binding");
                    }
                    debug!(solution = %chosen, "reusing existing solution");
                    cursor.at = chosen.clone();
                    report.solutions_reused += 1;
                    return Ok(());
                }
            }
        }

        let id = fresh_id(graph, NodeKind::Solution);
        let success = graph.success_id().clone();
        graph.insert(Node::solution(id.clone(), line, success))?;
        graph.connect(&target, &id, ConnectOptions::default())?;
        debug!(solution = %id, under = %target, "new solution");
        cursor.at = id;
        report.solutions_created += 1;
        Ok(())
    }

    /// Resolves which problem a solution line belongs to: the cursor's
    /// problem when the match judge does not veto it, else the segment's
    /// last problem on a strict yes, else a pick (or synthesis) inside the
    /// surrounding feature context.
    async fn solution_target(
        &self,
        graph: &mut Graph,
        cursor: &mut SegmentCursor,
        line: &str,
        report: &mut TrainingReport,
    ) -> Result<NodeId, TrainError> {
        if kind_of(graph, &cursor.at) == Some(NodeKind::Problem) {
            let description = description_of(graph, &cursor.at);
            let verdict = self.oracle.solution_solves_problem(line, &description).await?;
            if verdict != YesNo::No {
                debug!(problem = %cursor.at, "attaching solution to current problem");
                return Ok(cursor.at.clone());
            }
        }

        if let Some(last) = cursor.last_problem.clone() {
            if graph.contains(&last) {
                let description = description_of(graph, &last);
                let verdict = self.oracle.solution_solves_problem(line, &description).await?;
                if verdict == YesNo::Yes {
                    debug!(problem = %last, "attaching solution to the segment's last problem");
                    return Ok(last);
                }
            }
        }

        // Surrounding feature context.
        let mut context = cursor.at.clone();
        if kind_of(graph, &context) == Some(NodeKind::Problem) {
            if let Some(parent) = graph.get(&context).and_then(Node::parent) {
                context = parent.clone();
            }
        }
        if kind_of(graph, &context) != Some(NodeKind::Feature) {
            let root = graph.root_id().clone();
            context = match child_features_of(graph, &root).first() {
                Some(first) => first.clone(),
                None => {
                    let id = fresh_id(graph, NodeKind::Feature);
                    graph.insert(Node::feature(id.clone(), "context derived from training"))?;
                    graph.connect(&root, &id, ConnectOptions::default())?;
                    report.features_created += 1;
                    id
                }
            };
        }

        let problems: Vec<NodeId> = graph
            .get(&context)
            .map(|n| n.child_problems().iter().map(|l| l.problem.clone()).collect())
            .unwrap_or_default();
        if !problems.is_empty() {
            let labels = candidate_labels(graph, &problems);
            if let Some(index) = self.oracle.pick_problem_for_solution(line, &labels).await? {
                if let Some(chosen) = problems.get(index) {
                    debug!(problem = %chosen, "picked existing problem for solution");
                    return Ok(chosen.clone());
                }
            }
        }

        // No problem fits; synthesize one from the solution itself.
        let inferred = self.oracle.infer_problem_from_solution(line).await?;
        let id = fresh_id(graph, NodeKind::Problem);
        graph.insert(Node::problem(id.clone(), inferred))?;
        graph.connect(&context, &id, ConnectOptions::soft())?;
        debug!(problem = %id, under = %context, "synthesized problem for solution");
        report.problems_created += 1;
        Ok(id)
    }

    /// Moves the cursor to a feature context before a problem line lands:
    /// a problem cursor rewinds to its parent feature; anything else takes
    /// its first child feature or synthesizes one.
    async fn rewind_to_feature(
        &self,
        graph: &mut Graph,
        cursor: &mut SegmentCursor,
        synthesized_description: &str,
        report: &mut TrainingReport,
    ) -> Result<(), TrainError> {
        if kind_of(graph, &cursor.at) == Some(NodeKind::Problem) {
            if let Some(parent) = graph.get(&cursor.at).and_then(Node::parent) {
                cursor.at = parent.clone();
            }
        }
        if kind_of(graph, &cursor.at) == Some(NodeKind::Feature) {
            return Ok(());
        }

        if let Some(first) = child_features_of(graph, &cursor.at).first() {
            cursor.at = first.clone();
            return Ok(());
        }

        let id = fresh_id(graph, NodeKind::Feature);
        graph.insert(Node::feature(id.clone(), synthesized_description))?;
        if graph
            .connect(&cursor.at, &id, ConnectOptions::default())
            .is_err()
        {
            let root = graph.root_id().clone();
            graph.connect(&root, &id, ConnectOptions::default())?;
        }
        debug!(feature = %id, "synthesized feature context");
        cursor.at = id;
        report.features_created += 1;
        Ok(())
    }
}

// ----------------------------------------------------------------------
// helpers
// ----------------------------------------------------------------------

fn fresh_id(graph: &Graph, kind: NodeKind) -> NodeId {
    loop {
        let id = NodeId::fresh(kind);
        if !graph.contains(&id) {
            return id;
        }
    }
}

fn kind_of(graph: &Graph, id: &NodeId) -> Option<NodeKind> {
    graph.get(id).map(Node::kind)
}

fn description_of(graph: &Graph, id: &NodeId) -> String {
    graph
        .get(id)
        .map(|n| n.description.clone())
        .unwrap_or_default()
}

fn child_features_of(graph: &Graph, id: &NodeId) -> Vec<NodeId> {
    graph
        .get(id)
        .map(|n| n.child_features().to_vec())
        .unwrap_or_default()
}

fn candidate_labels(graph: &Graph, ids: &[NodeId]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| graph.get(id))
        .map(Node::candidate_label)
        .collect()
}
