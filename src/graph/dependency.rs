//! Dependency graph built from declared step artifacts.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::debug;

use crate::config::StepDeclaration;
use crate::error::{FlowError, Result};
use crate::steps::{Step, StepStatus};

static NO_LINKS: BTreeSet<String> = BTreeSet::new();

/// Predecessor and successor names of one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Links {
    pub(crate) prev: BTreeSet<String>,
    pub(crate) next: BTreeSet<String>,
}

/// The steps of a flow and the producer/consumer edges between them.
///
/// The graph owns every [`Step`] by name and keeps adjacency in a separate
/// name-keyed table. Edges are derived from artifacts: whenever an output of
/// one step is an input of another, the producer precedes the consumer.
/// Edges added with [`Graph::add_dependency`] are kept alongside and
/// replayed after every rebuild.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub(crate) steps: BTreeMap<String, Step>,
    pub(crate) links: BTreeMap<String, Links>,
    pub(crate) authored: BTreeSet<(String, String)>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from steps.
    ///
    /// Steps sharing a name are folded together by unioning their artifacts.
    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        let mut graph = Self::new();
        graph.build(steps);
        graph
    }

    /// Build a graph from parsed dependency declarations.
    pub fn from_declarations(declarations: impl IntoIterator<Item = StepDeclaration>) -> Self {
        Self::from_steps(declarations.into_iter().map(StepDeclaration::into_step))
    }

    /// Replace the step set and regenerate every edge.
    pub fn build(&mut self, steps: impl IntoIterator<Item = Step>) -> &mut Self {
        self.steps.clear();
        self.authored.clear();
        for step in steps {
            self.insert_merging(step);
        }
        self.rebuild();
        self
    }

    /// Regenerate the adjacency table from scratch.
    ///
    /// Every producer of an artifact is linked to every consumer of it, so
    /// the result does not depend on declaration order.
    pub fn rebuild(&mut self) -> &mut Self {
        self.links = self
            .steps
            .keys()
            .map(|name| (name.clone(), Links::default()))
            .collect();

        let mut producers: HashMap<&str, Vec<&str>> = HashMap::new();
        for step in self.steps.values() {
            for output in step.outputs() {
                producers.entry(output.as_str()).or_default().push(step.name());
            }
        }

        let mut edges: Vec<(String, String)> = Vec::new();
        for consumer in self.steps.values() {
            for input in consumer.inputs() {
                for producer in producers.get(input.as_str()).into_iter().flatten() {
                    if *producer != consumer.name() {
                        edges.push((producer.to_string(), consumer.name().to_string()));
                    }
                }
            }
        }

        edges.extend(
            self.authored
                .iter()
                .filter(|(from, to)| self.steps.contains_key(from) && self.steps.contains_key(to))
                .cloned(),
        );

        for (from, to) in edges {
            self.link(&from, &to);
        }

        debug!(steps = self.steps.len(), edges = self.edge_count(), "Rebuilt dependency graph");
        self
    }

    fn link(&mut self, from: &str, to: &str) {
        if let Some(links) = self.links.get_mut(from) {
            links.next.insert(to.to_string());
        }
        if let Some(links) = self.links.get_mut(to) {
            links.prev.insert(from.to_string());
        }
    }

    fn insert_merging(&mut self, step: Step) {
        match self.steps.get_mut(step.name()) {
            Some(existing) => existing.merge_artifacts(&step),
            None => {
                self.steps.insert(step.name().to_string(), step);
            }
        }
    }

    /// Add a single step, replacing any step with the same name.
    pub fn add_step(&mut self, step: Step) -> &mut Self {
        self.steps.insert(step.name().to_string(), step);
        self.rebuild()
    }

    /// Add several steps, replacing same-named ones, and rebuild once.
    pub fn add_steps(&mut self, steps: impl IntoIterator<Item = Step>) -> &mut Self {
        for step in steps {
            self.steps.insert(step.name().to_string(), step);
        }
        self.rebuild()
    }

    /// Add an explicit edge `from -> to`.
    ///
    /// Idempotent. Fails if either step is unknown.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<&mut Self> {
        for name in [from, to] {
            if !self.steps.contains_key(name) {
                return Err(FlowError::StepNotFound {
                    name: name.to_string(),
                });
            }
        }

        self.authored.insert((from.to_string(), to.to_string()));
        self.link(from, to);
        Ok(self)
    }

    /// Merge another graph into this one.
    ///
    /// New steps are copied in. On a name collision the artifact sets are
    /// unioned and the status is taken from `other`. Edges are regenerated
    /// afterwards.
    pub fn merge(&mut self, other: &Graph) -> &mut Self {
        for (name, step) in &other.steps {
            match self.steps.get_mut(name) {
                Some(existing) => {
                    existing.merge_artifacts(step);
                    existing.set_status(step.status());
                }
                None => {
                    self.steps.insert(name.clone(), step.clone());
                }
            }
        }
        self.authored.extend(other.authored.iter().cloned());
        self.rebuild()
    }

    /// Get a step by name.
    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.get(name)
    }

    /// Get a step by name for a status change.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Step> {
        self.steps.get_mut(name)
    }

    /// Check if a step exists in the graph.
    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Get the number of steps in the graph.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All step names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }

    /// All steps, sorted by name.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }

    /// Direct predecessors of a step (empty if the step is unknown).
    pub fn predecessors(&self, name: &str) -> &BTreeSet<String> {
        self.links.get(name).map_or(&NO_LINKS, |l| &l.prev)
    }

    /// Direct successors of a step (empty if the step is unknown).
    pub fn successors(&self, name: &str) -> &BTreeSet<String> {
        self.links.get(name).map_or(&NO_LINKS, |l| &l.next)
    }

    /// Every edge as `(producer, consumer)`, sorted.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.links
            .iter()
            .flat_map(|(from, links)| links.next.iter().map(move |to| (from.clone(), to.clone())))
            .collect()
    }

    fn edge_count(&self) -> usize {
        self.links.values().map(|l| l.next.len()).sum()
    }

    /// Steps without predecessors.
    pub fn roots(&self) -> Vec<&str> {
        self.names()
            .filter(|name| self.predecessors(name).is_empty())
            .collect()
    }

    /// Steps without successors.
    pub fn leaves(&self) -> Vec<&str> {
        self.names()
            .filter(|name| self.successors(name).is_empty())
            .collect()
    }

    /// Whether every predecessor of `name` lets it run.
    ///
    /// Predecessors must be finished or skipped; with `ignore_failed`,
    /// failed ones count as well.
    pub fn can_run(&self, name: &str, ignore_failed: bool) -> Result<bool> {
        if !self.contains(name) {
            return Err(FlowError::StepNotFound {
                name: name.to_string(),
            });
        }

        Ok(self.predecessors(name).iter().all(|prev| {
            self.steps
                .get(prev)
                .is_some_and(|step| step.status().satisfies_dependency(ignore_failed))
        }))
    }

    /// Steps that have not run and whose predecessors are all done.
    pub fn ready(&self) -> Vec<&str> {
        self.ready_with(false)
    }

    /// Like [`Graph::ready`], optionally treating failed predecessors as done.
    pub fn ready_with(&self, ignore_failed: bool) -> Vec<&str> {
        self.steps
            .values()
            .filter(|step| step.status() == StepStatus::Init)
            .filter(|step| self.can_run(step.name(), ignore_failed).unwrap_or(false))
            .map(Step::name)
            .collect()
    }

    /// Returns steps in topological order (producers before consumers).
    ///
    /// Returns an error if a cycle is detected.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .names()
            .map(|name| (name, self.predecessors(name).len()))
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut result = Vec::with_capacity(self.steps.len());

        while let Some(name) = queue.pop_front() {
            result.push(name.to_string());

            for next in self.successors(name) {
                if let Some(degree) = in_degree.get_mut(next.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next.as_str());
                    }
                }
            }
        }

        if result.len() != self.steps.len() {
            let steps = match self.find_cycle() {
                Some(cycle) => cycle.join(" -> "),
                None => in_degree
                    .iter()
                    .filter(|(_, &d)| d > 0)
                    .map(|(s, _)| *s)
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            return Err(FlowError::CycleDetected { steps });
        }

        Ok(result)
    }

    /// Find a cycle in the graph, returning the path if one exists.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        fn dfs<'a>(
            node: &'a str,
            graph: &'a Graph,
            state: &mut HashMap<&'a str, State>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            state.insert(node, State::Visiting);
            path.push(node);

            for next in graph.successors(node) {
                match state.get(next.as_str()) {
                    Some(State::Visiting) => {
                        let start = path.iter().position(|s| *s == next.as_str())?;
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(next.clone());
                        return Some(cycle);
                    }
                    Some(State::Unvisited) | None => {
                        if let Some(cycle) = dfs(next, graph, state, path) {
                            return Some(cycle);
                        }
                    }
                    Some(State::Visited) => {}
                }
            }

            path.pop();
            state.insert(node, State::Visited);
            None
        }

        let mut state: HashMap<&str, State> =
            self.names().map(|s| (s, State::Unvisited)).collect();
        let mut path = Vec::new();

        for name in self.names() {
            if state.get(name) == Some(&State::Unvisited) {
                if let Some(cycle) = dfs(name, self, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Returns groups of steps that can execute in parallel.
    ///
    /// Each group contains steps whose predecessors all sit in earlier
    /// groups. This is the wave plan a clean run follows.
    pub fn waves(&self) -> Result<Vec<Vec<String>>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(FlowError::CycleDetected {
                steps: cycle.join(" -> "),
            });
        }

        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut placed: BTreeSet<&str> = BTreeSet::new();

        while placed.len() < self.steps.len() {
            let ready: Vec<&str> = self
                .names()
                .filter(|name| !placed.contains(name))
                .filter(|name| {
                    self.predecessors(name)
                        .iter()
                        .all(|p| placed.contains(p.as_str()))
                })
                .collect();

            if ready.is_empty() {
                break;
            }

            placed.extend(ready.iter().copied());
            groups.push(ready.into_iter().map(String::from).collect());
        }

        Ok(groups)
    }

    /// All steps reachable by following successor edges from `name`.
    pub fn transitive_successors(&self, name: &str) -> BTreeSet<String> {
        self.walk(name, |graph, current| graph.successors(current))
    }

    /// All steps reachable by following predecessor edges from `name`.
    pub fn transitive_predecessors(&self, name: &str) -> BTreeSet<String> {
        self.walk(name, |graph, current| graph.predecessors(current))
    }

    fn walk<'a>(
        &'a self,
        start: &str,
        neighbours: impl Fn(&'a Graph, &str) -> &'a BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut to_visit = vec![start.to_string()];

        while let Some(current) = to_visit.pop() {
            for next in neighbours(self, &current) {
                if result.insert(next.clone()) {
                    to_visit.push(next.clone());
                }
            }
        }

        result
    }

    /// Set the status of a single step.
    pub fn set_status(&mut self, name: &str, status: StepStatus) -> Result<()> {
        let step = self
            .steps
            .get_mut(name)
            .ok_or_else(|| FlowError::StepNotFound {
                name: name.to_string(),
            })?;
        step.set_status(status);
        Ok(())
    }

    /// Reset every step to `Init`.
    pub fn reset_all(&mut self) -> &mut Self {
        for step in self.steps.values_mut() {
            step.reset();
        }
        self
    }

    /// Number of steps in each status, including zero counts.
    pub fn status_summary(&self) -> BTreeMap<StepStatus, usize> {
        let mut summary: BTreeMap<StepStatus, usize> =
            StepStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for step in self.steps.values() {
            *summary.entry(step.status()).or_default() += 1;
        }
        summary
    }

    /// Names of steps currently in `status`.
    pub fn with_status(&self, status: StepStatus) -> Vec<&str> {
        self.steps
            .values()
            .filter(|s| s.status() == status)
            .map(Step::name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, inputs: &[&str], outputs: &[&str]) -> Step {
        Step::new(name)
            .with_cmd(format!("{name}.tcl"))
            .with_inputs(inputs.iter().copied())
            .with_outputs(outputs.iter().copied())
    }

    /// step1 -> step2 -> step3, step1 -> step4, {step2, step4} -> step5
    fn sample_graph() -> Graph {
        Graph::from_steps([
            step("step1", &["input1"], &["output1"]),
            step("step2", &["output1"], &["output2"]),
            step("step3", &["output2"], &["output3"]),
            step("step4", &["output1"], &["output4"]),
            step("step5", &["output4", "output2"], &["output5"]),
        ])
    }

    #[test]
    fn empty_graph() {
        let graph = Graph::new();
        assert!(graph.is_empty());
        assert!(graph.topological_order().unwrap().is_empty());
        assert!(graph.roots().is_empty());
    }

    #[test]
    fn derives_edges_from_artifacts() {
        let graph = sample_graph();

        assert_eq!(graph.len(), 5);
        assert!(graph.successors("step1").contains("step2"));
        assert!(graph.successors("step1").contains("step4"));
        assert!(graph.predecessors("step5").contains("step2"));
        assert!(graph.predecessors("step5").contains("step4"));
        assert_eq!(graph.edges().len(), 5);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let graph = sample_graph();
        for (from, to) in graph.edges() {
            assert!(graph.predecessors(&to).contains(&from));
        }
    }

    #[test]
    fn self_produced_artifact_is_not_an_edge() {
        let graph = Graph::from_steps([step("loop", &["db"], &["db"])]);
        assert!(graph.predecessors("loop").is_empty());
        assert_eq!(graph.topological_order().unwrap(), vec!["loop"]);
    }

    #[test]
    fn every_producer_of_an_artifact_is_linked() {
        let graph = Graph::from_steps([
            step("a", &[], &["netlist"]),
            step("b", &[], &["netlist"]),
            step("c", &["netlist"], &[]),
        ]);
        assert_eq!(graph.predecessors("c").len(), 2);
    }

    #[test]
    fn build_is_independent_of_declaration_order() {
        let forward = sample_graph();
        let reversed = Graph::from_steps([
            step("step5", &["output4", "output2"], &["output5"]),
            step("step4", &["output1"], &["output4"]),
            step("step3", &["output2"], &["output3"]),
            step("step2", &["output1"], &["output2"]),
            step("step1", &["input1"], &["output1"]),
        ]);
        assert_eq!(forward.edges(), reversed.edges());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut graph = sample_graph();
        let before = graph.edges();
        graph.rebuild();
        graph.rebuild();
        assert_eq!(graph.edges(), before);
    }

    #[test]
    fn duplicate_steps_union_artifacts() {
        let graph = Graph::from_steps([
            step("a", &["x"], &["y"]),
            step("a", &["z"], &["w"]),
            step("b", &["w"], &[]),
        ]);
        assert_eq!(graph.len(), 2);
        assert!(graph.get("a").unwrap().inputs().contains("z"));
        assert!(graph.successors("a").contains("b"));
    }

    #[test]
    fn unknown_step_has_no_links() {
        let graph = sample_graph();
        assert!(graph.predecessors("missing").is_empty());
        assert!(graph.successors("missing").is_empty());
    }

    #[test]
    fn roots_and_leaves() {
        let graph = sample_graph();
        assert_eq!(graph.roots(), vec!["step1"]);
        assert_eq!(graph.leaves(), vec!["step3", "step5"]);
    }

    #[test]
    fn add_dependency_requires_both_steps() {
        let mut graph = sample_graph();
        let err = graph.add_dependency("step1", "nope").unwrap_err();
        assert!(matches!(err, FlowError::StepNotFound { name } if name == "nope"));
    }

    #[test]
    fn add_dependency_is_idempotent_and_survives_rebuild() {
        let mut graph = sample_graph();
        graph.add_dependency("step3", "step4").unwrap();
        graph.add_dependency("step3", "step4").unwrap();
        assert_eq!(graph.edges().len(), 6);

        graph.rebuild();
        assert!(graph.successors("step3").contains("step4"));
        assert_eq!(graph.edges().len(), 6);
    }

    #[test]
    fn add_step_links_new_consumer() {
        let mut graph = sample_graph();
        graph.add_step(step("step6", &["output5"], &[]));
        assert!(graph.predecessors("step6").contains("step5"));
    }

    #[test]
    fn merge_unions_steps_and_prefers_other_status() {
        let mut left = Graph::from_steps([step("a", &[], &["x"])]);
        let mut right = Graph::from_steps([step("a", &[], &["y"]), step("b", &["y"], &[])]);
        right.set_status("a", StepStatus::Finished).unwrap();

        left.merge(&right);

        assert_eq!(left.len(), 2);
        let a = left.get("a").unwrap();
        assert!(a.outputs().contains("x"));
        assert!(a.outputs().contains("y"));
        assert_eq!(a.status(), StepStatus::Finished);
        assert!(left.successors("a").contains("b"));
    }

    #[test]
    fn merge_of_disjoint_graphs_keeps_each_ready_set() {
        let left = Graph::from_steps([step("a", &[], &["x"]), step("b", &["x"], &[])]);
        let right = Graph::from_steps([step("c", &[], &["y"]), step("d", &["y"], &[])]);

        let mut merged = left.clone();
        merged.merge(&right);

        let mut expected: Vec<&str> = left.ready();
        expected.extend(right.ready());
        expected.sort();
        assert_eq!(merged.ready(), expected);
    }

    #[test]
    fn ready_requires_finished_or_skipped_predecessors() {
        let mut graph = sample_graph();
        assert_eq!(graph.ready(), vec!["step1"]);

        graph.set_status("step1", StepStatus::Finished).unwrap();
        assert_eq!(graph.ready(), vec!["step2", "step4"]);

        graph.set_status("step2", StepStatus::Skipped).unwrap();
        graph.set_status("step4", StepStatus::Failed).unwrap();
        assert_eq!(graph.ready(), vec!["step3"]);
        assert_eq!(graph.ready_with(true), vec!["step3", "step5"]);
    }

    #[test]
    fn can_run_unknown_step_fails() {
        let graph = sample_graph();
        assert!(graph.can_run("missing", false).is_err());
        assert!(graph.can_run("step1", false).unwrap());
        assert!(!graph.can_run("step2", false).unwrap());
    }

    #[test]
    fn topological_order_respects_every_edge() {
        let graph = sample_graph();
        let order = graph.topological_order().unwrap();
        let index = |name: &str| order.iter().position(|s| s == name).unwrap();

        for (from, to) in graph.edges() {
            assert!(index(&from) < index(&to), "{from} should precede {to}");
        }
    }

    #[test]
    fn topological_order_detects_cycle() {
        let graph = Graph::from_steps([step("a", &["y"], &["x"]), step("b", &["x"], &["y"])]);
        let err = graph.topological_order().unwrap_err();
        assert!(matches!(err, FlowError::CycleDetected { .. }));
    }

    #[test]
    fn find_cycle_returns_closed_path() {
        let graph = Graph::from_steps([
            step("a", &["z"], &["x"]),
            step("b", &["x"], &["y"]),
            step("c", &["y"], &["z"]),
        ]);

        let path = graph.find_cycle().unwrap();
        assert!(path.len() >= 4);
        assert_eq!(path.first(), path.last());
    }

    #[test]
    fn no_cycle_returns_none() {
        assert!(sample_graph().find_cycle().is_none());
    }

    #[test]
    fn waves_follow_dependency_depth() {
        let waves = sample_graph().waves().unwrap();
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["step1"]);
        assert_eq!(waves[1], vec!["step2", "step4"]);
        assert_eq!(waves[2], vec!["step3", "step5"]);
    }

    #[test]
    fn transitive_walks() {
        let graph = sample_graph();
        let after = graph.transitive_successors("step2");
        assert!(after.contains("step3"));
        assert!(after.contains("step5"));
        assert!(!after.contains("step4"));

        let before = graph.transitive_predecessors("step5");
        assert_eq!(before.len(), 3);
    }

    #[test]
    fn status_summary_counts_every_status() {
        let mut graph = sample_graph();
        graph.set_status("step1", StepStatus::Finished).unwrap();
        graph.set_status("step2", StepStatus::Failed).unwrap();

        let summary = graph.status_summary();
        assert_eq!(summary[&StepStatus::Init], 3);
        assert_eq!(summary[&StepStatus::Finished], 1);
        assert_eq!(summary[&StepStatus::Failed], 1);
        assert_eq!(summary[&StepStatus::Running], 0);
    }

    #[test]
    fn reset_all_returns_steps_to_init() {
        let mut graph = sample_graph();
        graph.set_status("step1", StepStatus::Finished).unwrap();
        graph.reset_all();
        assert_eq!(graph.with_status(StepStatus::Init).len(), 5);
    }

    #[test]
    fn set_status_unknown_step_fails() {
        let mut graph = sample_graph();
        assert!(graph.set_status("nope", StepStatus::Skipped).is_err());
    }
}
