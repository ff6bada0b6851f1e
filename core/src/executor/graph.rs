use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::ExecutorError;
use crate::executor::types::TaskLike;

/// Task dependency graph (DAG).
///
/// Built once from the caller's node list, validated eagerly, and then only
/// read during execution.
#[derive(Debug, Clone)]
pub struct TaskGraph<T: TaskLike> {
    /// Task nodes: task_id -> node
    pub nodes: HashMap<String, T>,

    /// Dependency edges: task_id -> ids it depends on
    pub edges: HashMap<String, Vec<String>>,

    /// Reverse edges: task_id -> ids that depend on it
    pub dependents: HashMap<String, Vec<String>>,

    /// Original insertion order (for stable stage output)
    insertion_order: Vec<String>,
}

impl<T: TaskLike> TaskGraph<T> {
    /// Construct the graph from a task list, rejecting duplicate ids.
    pub fn from_tasks(tasks: &[T]) -> Result<Self, ExecutorError> {
        let mut nodes = HashMap::new();
        let mut edges = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut insertion_order = Vec::with_capacity(tasks.len());

        for task in tasks {
            let task_id = task.id().to_string();
            if nodes.contains_key(&task_id) {
                return Err(ExecutorError::DuplicateTaskId(task_id));
            }

            let dependencies = task.dependencies().to_vec();
            for dep in &dependencies {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(task_id.clone());
            }

            edges.insert(task_id.clone(), dependencies);
            insertion_order.push(task_id.clone());
            nodes.insert(task_id, task.clone());
        }

        Ok(Self {
            nodes,
            edges,
            dependents,
            insertion_order,
        })
    }

    /// Validate dependency relationships.
    ///
    /// Checks that every referenced dependency exists and that the relation
    /// is acyclic. Runs before any execution; a violation aborts the run.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        for task_id in &self.insertion_order {
            for dep in &self.edges[task_id] {
                if !self.nodes.contains_key(dep) {
                    return Err(ExecutorError::DependencyNotFound {
                        task_id: task_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.detect_cycle() {
            return Err(ExecutorError::CircularDependency(cycle));
        }

        Ok(())
    }

    /// Partition all nodes into ordered execution stages (Kahn's algorithm).
    ///
    /// Each stage is the maximal set of unplaced nodes whose dependencies are
    /// all already placed, so nodes inside one stage can run in parallel and
    /// a node's stage index strictly exceeds that of every dependency.
    /// O(V + E).
    pub fn topological_sort(&self) -> Result<Vec<Vec<String>>, ExecutorError> {
        // in_degree counts not-yet-satisfied dependencies per node
        let mut in_degree: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .map(|id| (id.as_str(), self.edges[id].len()))
            .collect();

        let mut stages: Vec<Vec<String>> = Vec::new();
        let mut placed: HashSet<String> = HashSet::new();

        while placed.len() < self.nodes.len() {
            // Walk insertion order so intra-stage order is stable
            let stage: Vec<String> = self
                .insertion_order
                .iter()
                .filter(|id| !placed.contains(id.as_str()) && in_degree[id.as_str()] == 0)
                .cloned()
                .collect();

            if stage.is_empty() {
                // Unreachable after validate(); kept as a consistency guard
                return Err(ExecutorError::Internal(
                    "topological sort stalled with unplaced tasks".to_string(),
                ));
            }

            for task_id in &stage {
                placed.insert(task_id.clone());
                if let Some(children) = self.dependents.get(task_id) {
                    for child in children {
                        if let Some(degree) = in_degree.get_mut(child.as_str()) {
                            *degree -= 1;
                        }
                    }
                }
            }

            stages.push(stage);
        }

        Ok(stages)
    }

    /// All transitive dependents of `task_id` (reachability over reverse edges).
    pub fn descendants(&self, task_id: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(task_id);

        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.dependents.get(current) {
                for child in children {
                    if seen.insert(child.clone()) {
                        queue.push_back(child);
                    }
                }
            }
        }

        // Stable output for reproducible skip ordering
        self.insertion_order
            .iter()
            .filter(|id| seen.contains(*id))
            .cloned()
            .collect()
    }

    /// Detect a dependency cycle via DFS with a recursion-stack path.
    ///
    /// Returns the offending path ("a -> b -> a") when one exists.
    fn detect_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        for task_id in &self.insertion_order {
            if !visited.contains(task_id) && self.dfs_cycle(task_id, &mut visited, &mut path) {
                return Some(path.join(" -> "));
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        visited.insert(node.to_string());
        path.push(node.to_string());

        if let Some(dependencies) = self.edges.get(node) {
            for dep in dependencies {
                // An edge back into the current path closes a cycle
                if let Some(pos) = path.iter().position(|id| id == dep) {
                    path.push(dep.clone());
                    path.drain(..pos);
                    return true;
                }

                if !visited.contains(dep) && self.dfs_cycle(dep, visited, path) {
                    return true;
                }
            }
        }

        path.pop();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::TaskNode;

    fn node(id: &str, deps: &[&str]) -> TaskNode {
        TaskNode {
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            ..TaskNode::new(id, "true", Vec::<String>::new())
        }
    }

    #[test]
    fn duplicate_id_rejected_at_construction() {
        let err = TaskGraph::from_tasks(&[node("a", &[]), node("a", &[])]).unwrap_err();
        assert!(matches!(err, ExecutorError::DuplicateTaskId(id) if id == "a"));
    }

    #[test]
    fn dangling_dependency_rejected() {
        let graph = TaskGraph::from_tasks(&[node("a", &["ghost"])]).unwrap();
        let err = graph.validate().unwrap_err();
        match err {
            ExecutorError::DependencyNotFound {
                task_id,
                missing_dep,
            } => {
                assert_eq!(task_id, "a");
                assert_eq!(missing_dep, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn three_node_cycle_reported_with_path() {
        let graph = TaskGraph::from_tasks(&[
            node("a", &["c"]),
            node("b", &["a"]),
            node("c", &["b"]),
        ])
        .unwrap();

        let err = graph.validate().unwrap_err();
        match err {
            ExecutorError::CircularDependency(path) => {
                assert!(path.contains(" -> "), "path should show an edge: {path}");
                // The reported path closes on the node it started from
                let hops: Vec<&str> = path.split(" -> ").collect();
                assert_eq!(hops.first(), hops.last());
                assert_eq!(hops.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = TaskGraph::from_tasks(&[node("a", &["a"])]).unwrap();
        assert!(matches!(
            graph.validate(),
            Err(ExecutorError::CircularDependency(_))
        ));
    }

    #[test]
    fn stages_respect_dependencies_and_are_maximal() {
        let graph = TaskGraph::from_tasks(&[
            node("a", &[]),
            node("b", &[]),
            node("c", &["a"]),
            node("d", &["a", "b"]),
            node("e", &["c", "d"]),
        ])
        .unwrap();

        let stages = graph.topological_sort().unwrap();
        assert_eq!(stages, vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "d".to_string()],
            vec!["e".to_string()],
        ]);

        // Every node lands strictly after each of its dependencies
        let stage_of = |id: &str| stages.iter().position(|s| s.iter().any(|x| x == id)).unwrap();
        for (task_id, deps) in &graph.edges {
            for dep in deps {
                assert!(stage_of(task_id) > stage_of(dep));
            }
        }
    }

    #[test]
    fn layering_is_deterministic() {
        let tasks = [
            node("x", &[]),
            node("y", &["x"]),
            node("z", &["x"]),
        ];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        let first = graph.topological_sort().unwrap();
        let second = graph.topological_sort().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn descendants_are_transitive() {
        let graph = TaskGraph::from_tasks(&[
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["b"]),
            node("d", &[]),
        ])
        .unwrap();

        assert_eq!(graph.descendants("a"), vec!["b".to_string(), "c".to_string()]);
        assert!(graph.descendants("d").is_empty());
        assert!(graph.descendants("c").is_empty());
    }
}
