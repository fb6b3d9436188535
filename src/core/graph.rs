//! Dependency graph over pipeline task nodes
//!
//! Nodes live in an index-addressed arena; edges come from explicit
//! `runAfter` declarations and from resource producer/consumer linkage
//! (`inputs[].from`). Cycles and dangling references are rejected when the
//! graph is built, never lazily during the scheduling loop.

use std::collections::{HashMap, HashSet};

use crate::core::pipeline::PipelineTask;
use crate::error::{EngineError, EngineResult};

#[derive(Debug)]
struct GraphNode {
    name: String,
    /// Indices of predecessor nodes, deduplicated.
    predecessors: Vec<usize>,
}

/// Immutable scheduling graph for one pipeline.
#[derive(Debug)]
pub struct TaskGraph {
    nodes: Vec<GraphNode>,
}

impl TaskGraph {
    /// Build the graph from the pipeline's task list.
    ///
    /// Fails with a configuration error on duplicate node names, references
    /// to unknown nodes, or cycles.
    pub fn build(tasks: &[PipelineTask]) -> EngineResult<Self> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.name.as_str(), i).is_some() {
                return Err(EngineError::Configuration(format!(
                    "duplicate pipeline task '{}'",
                    task.name
                )));
            }
        }

        let mut nodes = Vec::with_capacity(tasks.len());
        for task in tasks {
            let mut predecessors = Vec::new();
            let mut seen = HashSet::new();
            for pred in task.predecessors() {
                let &pi = index.get(pred).ok_or_else(|| {
                    EngineError::Configuration(format!(
                        "pipeline task '{}' depends on unknown task '{}'",
                        task.name, pred
                    ))
                })?;
                if seen.insert(pi) {
                    predecessors.push(pi);
                }
            }
            nodes.push(GraphNode {
                name: task.name.clone(),
                predecessors,
            });
        }

        let graph = TaskGraph { nodes };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Kahn's algorithm: if a topological peel leaves nodes behind, those
    /// nodes form at least one cycle.
    fn check_acyclic(&self) -> EngineResult<()> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            for &p in &node.predecessors {
                successors[p].push(i);
            }
        }

        let mut queue: Vec<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut peeled = 0;

        while let Some(i) = queue.pop() {
            peeled += 1;
            for &s in &successors[i] {
                in_degree[s] -= 1;
                if in_degree[s] == 0 {
                    queue.push(s);
                }
            }
        }

        if peeled != self.nodes.len() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, &d)| d > 0)
                .map(|(i, _)| self.nodes[i].name.as_str())
                .collect();
            return Err(EngineError::Configuration(format!(
                "dependency cycle involving tasks: {}",
                stuck.join(", ")
            )));
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node names in declaration order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    /// All nodes not yet completed whose full predecessor set is completed,
    /// in declaration order.
    pub fn schedulable(&self, completed: &HashSet<String>) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| !completed.contains(&n.name))
            .filter(|n| {
                n.predecessors
                    .iter()
                    .all(|&p| completed.contains(&self.nodes[p].name))
            })
            .map(|n| n.name.clone())
            .collect()
    }
}
