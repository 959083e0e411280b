//! Step catalog, artifact dependencies, and backward resolution.
//!
//! Uses `petgraph` to model producer -> consumer edges between steps.
//! Topological sort detects cycles at construction. Rollback targets are
//! resolved by walking required artifacts backward to the earliest step whose
//! own inputs are all present.

use std::collections::{HashMap, HashSet};

use paperforge_types::pipeline::{Artifact, Step};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use thiserror::Error;

use super::store::ArtifactStore;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Structural problems in a step catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("step '{step}' requires '{artifact}', which no step produces")]
    UnknownProducer { step: Step, artifact: Artifact },

    #[error("artifact '{artifact}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer {
        artifact: Artifact,
        first: Step,
        second: Step,
    },

    #[error("step '{consumer}' requires '{artifact}' but its producer '{producer}' is declared later")]
    ProducerAfterConsumer {
        artifact: Artifact,
        producer: Step,
        consumer: Step,
    },

    #[error("cycle detected involving step '{0}'")]
    CycleDetected(Step),

    #[error("step '{0}' is declared more than once")]
    DuplicateStep(Step),

    #[error("the last declared step must be the terminal step")]
    MissingTerminal,
}

// ---------------------------------------------------------------------------
// Step specification
// ---------------------------------------------------------------------------

/// How the engine treats a step's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Output is judged by the validator before it is committed.
    Validated,
    /// Output is committed without validation.
    Unvalidated,
    /// Final step: output is committed, persisted, and the run ends.
    Terminal,
}

/// One row of the step catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub step: Step,
    pub requires: Vec<Artifact>,
    pub produces: Vec<Artifact>,
    pub gate: Gate,
}

impl StepSpec {
    pub fn new(step: Step, requires: &[Artifact], produces: &[Artifact], gate: Gate) -> Self {
        Self {
            step,
            requires: requires.to_vec(),
            produces: produces.to_vec(),
            gate,
        }
    }
}

// ---------------------------------------------------------------------------
// Dependency graph
// ---------------------------------------------------------------------------

/// Static mapping from steps to required artifacts, plus the inverse
/// artifact -> producing step.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    specs: Vec<StepSpec>,
    producers: HashMap<Artifact, Step>,
}

impl DependencyGraph {
    /// Build a graph from an ordered catalog without validating it.
    ///
    /// When two steps claim the same artifact the first one wins here;
    /// [`DependencyGraph::validate`] reports the conflict.
    pub fn new(specs: Vec<StepSpec>) -> Self {
        let mut producers = HashMap::new();
        for spec in &specs {
            for artifact in &spec.produces {
                producers.entry(*artifact).or_insert(spec.step);
            }
        }
        Self { specs, producers }
    }

    /// The paper pipeline's catalog.
    pub fn standard() -> Self {
        use Artifact as A;
        use Gate::*;

        Self::new(vec![
            StepSpec::new(Step::QueryAnalysis, &[], &[A::Query], Validated),
            StepSpec::new(Step::RagSearch, &[A::Query], &[A::RagResults], Validated),
            StepSpec::new(Step::GoogleScholarSearch, &[A::Query], &[A::ScholarResults], Validated),
            StepSpec::new(
                Step::IdeaGeneration,
                &[A::RagResults, A::ScholarResults],
                &[A::Idea],
                Validated,
            ),
            StepSpec::new(Step::NoveltyCheck, &[A::Idea, A::Query], &[A::Novelty], Validated),
            StepSpec::new(Step::MethodDesign, &[A::Idea], &[A::MethodDesign], Validated),
            StepSpec::new(Step::CodeGeneration, &[A::MethodDesign], &[A::Code], Validated),
            StepSpec::new(Step::Experiment, &[A::MethodDesign], &[A::Experiment], Validated),
            StepSpec::new(
                Step::ExperimentEvaluation,
                &[A::Experiment],
                &[A::ExperimentEvaluation],
                Validated,
            ),
            StepSpec::new(
                Step::RelatedWorkWriting,
                &[A::RagResults, A::ScholarResults],
                &[A::RelatedWork],
                Validated,
            ),
            StepSpec::new(
                Step::PaperWriting,
                &[A::MethodDesign, A::Experiment],
                &[A::MethodsSection, A::ExperimentsSection],
                Unvalidated,
            ),
            StepSpec::new(
                Step::PaperAssembly,
                &[A::MethodsSection, A::ExperimentsSection, A::RelatedWork],
                &[A::Paper],
                Terminal,
            ),
        ])
    }

    /// Check the structural invariants of the catalog.
    ///
    /// Every required artifact has exactly one producer, declared strictly
    /// earlier than each consumer; the producer -> consumer graph is acyclic;
    /// the last step is the only terminal one.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut positions: HashMap<Step, usize> = HashMap::new();
        for (idx, spec) in self.specs.iter().enumerate() {
            if positions.insert(spec.step, idx).is_some() {
                return Err(GraphError::DuplicateStep(spec.step));
            }
        }

        let mut seen: HashMap<Artifact, Step> = HashMap::new();
        for spec in &self.specs {
            for artifact in &spec.produces {
                if let Some(first) = seen.insert(*artifact, spec.step) {
                    return Err(GraphError::DuplicateProducer {
                        artifact: *artifact,
                        first,
                        second: spec.step,
                    });
                }
            }
        }

        // Build directed graph: edge from producer -> consumer
        let mut graph = DiGraph::<Step, Artifact>::new();
        let nodes: HashMap<Step, _> = self
            .specs
            .iter()
            .map(|spec| (spec.step, graph.add_node(spec.step)))
            .collect();

        for spec in &self.specs {
            for artifact in &spec.requires {
                let producer = self.producers.get(artifact).copied().ok_or(
                    GraphError::UnknownProducer {
                        step: spec.step,
                        artifact: *artifact,
                    },
                )?;
                graph.add_edge(nodes[&producer], nodes[&spec.step], *artifact);
            }
        }

        // Topological sort -- detects cycles
        toposort(&graph, None).map_err(|cycle| GraphError::CycleDetected(graph[cycle.node_id()]))?;

        for spec in &self.specs {
            for artifact in &spec.requires {
                let producer = self.producers[artifact];
                if positions[&producer] >= positions[&spec.step] {
                    return Err(GraphError::ProducerAfterConsumer {
                        artifact: *artifact,
                        producer,
                        consumer: spec.step,
                    });
                }
            }
        }

        let terminal_count = self.specs.iter().filter(|s| s.gate == Gate::Terminal).count();
        match self.specs.last() {
            Some(last) if last.gate == Gate::Terminal && terminal_count == 1 => Ok(()),
            _ => Err(GraphError::MissingTerminal),
        }
    }

    /// Steps in declared order.
    pub fn order(&self) -> Vec<Step> {
        self.specs.iter().map(|s| s.step).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// The step at a declared position.
    pub fn step_at(&self, position: usize) -> Option<Step> {
        self.specs.get(position).map(|s| s.step)
    }

    /// Declared position of a step, if it is in the catalog.
    pub fn position(&self, step: Step) -> Option<usize> {
        self.specs.iter().position(|s| s.step == step)
    }

    fn spec(&self, step: Step) -> Option<&StepSpec> {
        self.specs.iter().find(|s| s.step == step)
    }

    pub fn requires(&self, step: Step) -> &[Artifact] {
        self.spec(step).map(|s| s.requires.as_slice()).unwrap_or(&[])
    }

    pub fn produces(&self, step: Step) -> &[Artifact] {
        self.spec(step).map(|s| s.produces.as_slice()).unwrap_or(&[])
    }

    /// Gate of a step. Steps outside the catalog are treated as validated.
    pub fn gate(&self, step: Step) -> Gate {
        self.spec(step).map(|s| s.gate).unwrap_or(Gate::Validated)
    }

    pub fn producer_of(&self, artifact: Artifact) -> Option<Step> {
        self.producers.get(&artifact).copied()
    }

    /// Walk required artifacts backward from `step` to the earliest step that
    /// can actually run against `store`.
    ///
    /// For each artifact `step` requires, in declared order, the first absent
    /// one sends the walk to its producer. A step seen twice ends the walk at
    /// that step. An absent artifact with no producer makes the current step
    /// the floor. A step whose inputs are all present is returned as-is.
    pub fn find_earliest_unmet_producer(&self, step: Step, store: &ArtifactStore) -> Step {
        let mut visited = HashSet::new();
        let mut current = step;

        loop {
            if !visited.insert(current) {
                return current;
            }

            let missing = self
                .requires(current)
                .iter()
                .copied()
                .find(|artifact| !store.contains(*artifact));

            let Some(artifact) = missing else {
                return current;
            };

            match self.producer_of(artifact) {
                Some(producer) => current = producer,
                None => return current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Store holding every artifact produced by the first `n` declared steps.
    fn store_after(graph: &DependencyGraph, n: usize) -> ArtifactStore {
        let mut store = ArtifactStore::new();
        for step in graph.order().into_iter().take(n) {
            for artifact in graph.produces(step) {
                store.put(*artifact, json!(format!("{artifact} value")));
            }
        }
        store
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_standard_graph_is_valid() {
        let graph = DependencyGraph::standard();
        assert!(graph.validate().is_ok());
        assert_eq!(graph.order(), Step::ALL.to_vec());
        assert_eq!(graph.gate(Step::PaperWriting), Gate::Unvalidated);
        assert_eq!(graph.gate(Step::PaperAssembly), Gate::Terminal);
        assert_eq!(graph.producer_of(Artifact::ExperimentsSection), Some(Step::PaperWriting));
    }

    #[test]
    fn test_unknown_producer_rejected() {
        let graph = DependencyGraph::new(vec![
            StepSpec::new(Step::QueryAnalysis, &[], &[Artifact::Query], Gate::Validated),
            StepSpec::new(Step::IdeaGeneration, &[Artifact::RagResults], &[Artifact::Idea], Gate::Terminal),
        ]);
        assert_eq!(
            graph.validate(),
            Err(GraphError::UnknownProducer {
                step: Step::IdeaGeneration,
                artifact: Artifact::RagResults,
            })
        );
    }

    #[test]
    fn test_duplicate_producer_rejected() {
        let graph = DependencyGraph::new(vec![
            StepSpec::new(Step::QueryAnalysis, &[], &[Artifact::Query], Gate::Validated),
            StepSpec::new(Step::RagSearch, &[], &[Artifact::Query], Gate::Terminal),
        ]);
        assert!(matches!(
            graph.validate(),
            Err(GraphError::DuplicateProducer { artifact: Artifact::Query, .. })
        ));
    }

    #[test]
    fn test_producer_after_consumer_rejected() {
        let graph = DependencyGraph::new(vec![
            StepSpec::new(Step::RagSearch, &[Artifact::Query], &[Artifact::RagResults], Gate::Validated),
            StepSpec::new(Step::QueryAnalysis, &[], &[Artifact::Query], Gate::Terminal),
        ]);
        assert!(matches!(
            graph.validate(),
            Err(GraphError::ProducerAfterConsumer { producer: Step::QueryAnalysis, .. })
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let graph = cyclic_graph();
        assert!(matches!(graph.validate(), Err(GraphError::CycleDetected(_))));
    }

    #[test]
    fn test_missing_terminal_rejected() {
        let graph = DependencyGraph::new(vec![StepSpec::new(
            Step::QueryAnalysis,
            &[],
            &[Artifact::Query],
            Gate::Validated,
        )]);
        assert_eq!(graph.validate(), Err(GraphError::MissingTerminal));
    }

    // -----------------------------------------------------------------------
    // Backward resolution
    // -----------------------------------------------------------------------

    fn cyclic_graph() -> DependencyGraph {
        DependencyGraph::new(vec![
            StepSpec::new(Step::QueryAnalysis, &[Artifact::Idea], &[Artifact::Query], Gate::Validated),
            StepSpec::new(Step::IdeaGeneration, &[Artifact::Query], &[Artifact::Idea], Gate::Terminal),
        ])
    }

    #[test]
    fn test_all_inputs_present_returns_step_itself() {
        let graph = DependencyGraph::standard();
        let store = store_after(&graph, graph.len());
        for step in Step::ALL {
            assert_eq!(graph.find_earliest_unmet_producer(step, &store), step);
        }
    }

    #[test]
    fn test_resolution_lands_on_runnable_earlier_step() {
        let graph = DependencyGraph::standard();
        for committed in 0..graph.len() {
            let store = store_after(&graph, committed);
            for step in Step::ALL {
                let resolved = graph.find_earliest_unmet_producer(step, &store);
                let inputs_present = graph.requires(step).iter().all(|a| store.contains(*a));

                if inputs_present {
                    assert_eq!(resolved, step);
                } else {
                    assert!(
                        resolved.position() < step.position(),
                        "{step} with {committed} committed resolved to {resolved}"
                    );
                }
                assert!(
                    graph.requires(resolved).iter().all(|a| store.contains(*a)),
                    "{resolved} cannot run with {committed} steps committed"
                );
            }
        }
    }

    #[test]
    fn test_rag_search_rejection_resolves_to_rag_search() {
        let graph = DependencyGraph::standard();
        let store = store_after(&graph, 1);
        assert_eq!(
            graph.find_earliest_unmet_producer(Step::IdeaGeneration, &store),
            Step::RagSearch
        );
    }

    #[test]
    fn test_empty_store_resolves_to_query_analysis() {
        let graph = DependencyGraph::standard();
        let store = ArtifactStore::new();
        assert_eq!(
            graph.find_earliest_unmet_producer(Step::PaperAssembly, &store),
            Step::QueryAnalysis
        );
    }

    #[test]
    fn test_cycle_terminates_inside_cycle() {
        let graph = cyclic_graph();
        let store = ArtifactStore::new();
        let resolved = graph.find_earliest_unmet_producer(Step::QueryAnalysis, &store);
        assert!(matches!(resolved, Step::QueryAnalysis | Step::IdeaGeneration));
    }

    #[test]
    fn test_missing_artifact_without_producer_is_floor() {
        let graph = DependencyGraph::new(vec![StepSpec::new(
            Step::IdeaGeneration,
            &[Artifact::RagResults],
            &[Artifact::Idea],
            Gate::Terminal,
        )]);
        let store = ArtifactStore::new();
        assert_eq!(
            graph.find_earliest_unmet_producer(Step::IdeaGeneration, &store),
            Step::IdeaGeneration
        );
    }
}
