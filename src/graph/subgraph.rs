//! Graph algebra: intersection, union and subgraph extraction.
//!
//! Every operation here returns a new, independent [`Graph`] holding copies
//! of the selected steps. Edges in the result are regenerated from the
//! copied artifacts, plus any explicit edges whose ends both survived.

use std::collections::BTreeSet;

use crate::error::{FlowError, Result};

use super::dependency::Graph;

impl Graph {
    /// Copy the named steps into a fresh graph.
    fn extract(&self, names: &BTreeSet<String>) -> Graph {
        let mut graph = Graph::new();
        for name in names {
            if let Some(step) = self.steps.get(name) {
                graph.steps.insert(name.clone(), step.clone());
            }
        }
        graph.authored = self
            .authored
            .iter()
            .filter(|(from, to)| names.contains(from) && names.contains(to))
            .cloned()
            .collect();
        graph.rebuild();
        graph
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(FlowError::StepNotFound {
                name: name.to_string(),
            })
        }
    }

    /// Steps present in both graphs.
    ///
    /// Structure comes from `self`; the status of each kept step is taken
    /// from `other`.
    pub fn intersect(&self, other: &Graph) -> Graph {
        let common: BTreeSet<String> = self
            .names()
            .filter(|name| other.contains(name))
            .map(String::from)
            .collect();

        let mut graph = self.extract(&common);
        for (name, step) in graph.steps.iter_mut() {
            if let Some(theirs) = other.get(name) {
                step.set_status(theirs.status());
            }
        }
        graph
    }

    /// Steps present in either graph.
    ///
    /// Steps only in `other` are copied in; for steps in both, the status is
    /// taken from `other`.
    pub fn union(&self, other: &Graph) -> Graph {
        let mut graph = self.clone();
        for (name, step) in &other.steps {
            match graph.steps.get_mut(name) {
                Some(existing) => existing.set_status(step.status()),
                None => {
                    graph.steps.insert(name.clone(), step.clone());
                }
            }
        }
        graph.authored.extend(other.authored.iter().cloned());
        graph.rebuild();
        graph
    }

    /// `name` and everything downstream of it.
    pub fn subgraph_after(&self, name: &str) -> Result<Graph> {
        self.require(name)?;
        let mut names = self.transitive_successors(name);
        names.insert(name.to_string());
        Ok(self.extract(&names))
    }

    /// `name` and everything upstream of it.
    pub fn subgraph_before(&self, name: &str) -> Result<Graph> {
        self.require(name)?;
        let mut names = self.transitive_predecessors(name);
        names.insert(name.to_string());
        Ok(self.extract(&names))
    }

    /// Steps on some path from `start` to `end`, both included.
    pub fn subgraph_between(&self, start: &str, end: &str) -> Result<Graph> {
        self.require(start)?;
        self.require(end)?;

        let between = self
            .subgraph_before(end)?
            .intersect(&self.subgraph_after(start)?);
        Self::ensure_path(between, start, end)
    }

    /// Like [`Graph::subgraph_after`], but also pulls in side branches.
    ///
    /// Starting from `name`, every successor of an included step is
    /// included. A predecessor of an included step other than the anchor
    /// is pulled in as well when it is a side branch: it is not upstream
    /// of the anchor and does not hang off the anchor's upstream alone.
    /// A step fed only by the anchor's own inputs is never included.
    pub fn subgraph_after_greedy(&self, name: &str) -> Result<Graph> {
        self.require(name)?;

        let upstream = self.transitive_predecessors(name);
        let side_branch = |candidate: &str| {
            if upstream.contains(candidate) {
                return false;
            }
            let ancestors = self.transitive_predecessors(candidate);
            ancestors.is_empty() || !ancestors.is_subset(&upstream)
        };

        let mut included = BTreeSet::from([name.to_string()]);
        let mut frontier = vec![name.to_string()];

        while let Some(current) = frontier.pop() {
            let mut pulled: Vec<&String> = self.successors(&current).iter().collect();
            if current != name {
                pulled.extend(
                    self.predecessors(&current)
                        .iter()
                        .filter(|prev| !included.contains(*prev) && side_branch(prev.as_str())),
                );
            }

            for next in pulled {
                if included.insert(next.clone()) {
                    frontier.push(next.clone());
                }
            }
        }

        Ok(self.extract(&included))
    }

    /// Like [`Graph::subgraph_between`], using the greedy downstream set.
    pub fn subgraph_between_greedy(&self, start: &str, end: &str) -> Result<Graph> {
        self.require(start)?;
        self.require(end)?;

        let between = self
            .subgraph_before(end)?
            .intersect(&self.subgraph_after_greedy(start)?);
        Self::ensure_path(between, start, end)
    }

    fn ensure_path(graph: Graph, start: &str, end: &str) -> Result<Graph> {
        if graph.contains(start) && graph.contains(end) {
            Ok(graph)
        } else {
            Err(FlowError::NoPath {
                from: start.to_string(),
                to: end.to_string(),
            })
        }
    }
}
