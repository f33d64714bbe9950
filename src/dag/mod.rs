use crate::error::GraphError;
use crate::types::TaskId;
use parking_lot::RwLock;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::HashMap;

/// Dependency graph over pipeline tasks.
///
/// Edges point from producer to consumer; a task is runnable once every
/// incoming edge's source has completed. The graph is append-only during
/// planning and read-only during execution.
#[derive(Debug, Default)]
pub struct TaskDag {
    inner: RwLock<DiGraphMap<TaskId, ()>>,
}

impl TaskDag {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(DiGraphMap::new()),
        }
    }

    pub fn add_node(&self, task: TaskId) {
        self.inner.write().add_node(task);
    }

    pub fn add_edge(&self, from: TaskId, to: TaskId) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::SelfLoop(from));
        }

        let mut g = self.inner.write();
        if !g.contains_node(from) {
            return Err(GraphError::UnknownTask(from));
        }
        if !g.contains_node(to) {
            return Err(GraphError::UnknownTask(to));
        }
        g.add_edge(from, to, ());

        if petgraph::algo::is_cyclic_directed(&*g) {
            g.remove_edge(from, to);
            return Err(GraphError::CycleDetected);
        }

        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edge_count()
    }

    /// Topological order of all tasks
    pub fn topological_sort(&self) -> Result<Vec<TaskId>, GraphError> {
        let g = self.inner.read();
        toposort(&*g, None).map_err(|_| GraphError::CycleDetected)
    }

    /// Tasks with no predecessors (sources of the pipeline)
    pub fn entry_nodes(&self) -> Vec<TaskId> {
        let g = self.inner.read();
        g.nodes()
            .filter(|n| g.neighbors_directed(*n, Direction::Incoming).next().is_none())
            .collect()
    }

    /// Tasks with no successors (terminal barriers)
    pub fn exit_nodes(&self) -> Vec<TaskId> {
        let g = self.inner.read();
        g.nodes()
            .filter(|n| g.neighbors_directed(*n, Direction::Outgoing).next().is_none())
            .collect()
    }

    /// Direct consumers of a task's outputs
    pub fn successors(&self, task: TaskId) -> Vec<TaskId> {
        let g = self.inner.read();
        g.neighbors_directed(task, Direction::Outgoing).collect()
    }

    /// Count of unfinished producers per task, for wave scheduling
    pub fn indegrees(&self) -> HashMap<TaskId, usize> {
        let g = self.inner.read();
        g.nodes()
            .map(|n| {
                (
                    n,
                    g.neighbors_directed(n, Direction::Incoming).count(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_loop() {
        let dag = TaskDag::new();
        let t = TaskId::new();
        dag.add_node(t);
        assert!(matches!(dag.add_edge(t, t), Err(GraphError::SelfLoop(_))));
    }

    #[test]
    fn rejects_cycle() {
        let dag = TaskDag::new();
        let a = TaskId::new();
        let b = TaskId::new();
        dag.add_node(a);
        dag.add_node(b);
        dag.add_edge(a, b).unwrap();
        assert!(matches!(
            dag.add_edge(b, a),
            Err(GraphError::CycleDetected)
        ));
        // the rejected edge must not linger
        assert_eq!(dag.edge_count(), 1);
    }

    #[test]
    fn rejects_edge_to_unknown_task() {
        let dag = TaskDag::new();
        let a = TaskId::new();
        dag.add_node(a);
        assert!(matches!(
            dag.add_edge(a, TaskId::new()),
            Err(GraphError::UnknownTask(_))
        ));
    }

    #[test]
    fn entry_and_exit_nodes() {
        let dag = TaskDag::new();
        let a = TaskId::new();
        let b = TaskId::new();
        let c = TaskId::new();
        for t in [a, b, c] {
            dag.add_node(t);
        }
        dag.add_edge(a, b).unwrap();
        dag.add_edge(b, c).unwrap();
        assert_eq!(dag.entry_nodes(), vec![a]);
        assert_eq!(dag.exit_nodes(), vec![c]);
        assert_eq!(dag.indegrees()[&b], 1);
    }
}
