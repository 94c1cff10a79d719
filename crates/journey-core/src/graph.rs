//! Task Graph
//!
//! Arena of validated tasks plus a `petgraph` adjacency over their indices.
//! Node `i` is the task declared at position `i`; an edge `d -> t` means `t`
//! depends on `d`. Acyclicity is established by the config validator before
//! a graph is ever built and is not rechecked here.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::QueryError;
use crate::progress::UserProgress;
use crate::task::{Importance, Task};

#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<String, NodeIndex>,
    graph: DiGraph<usize, ()>,
    /// Topological order, computed once.
    order: Vec<NodeIndex>,
}

/// Optional criteria for [`TaskGraph::filter`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub city: Option<String>,
    pub time_window: Option<String>,
    pub module: Option<String>,
    pub importance: Option<Importance>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        if !task.visible_in(self.city.as_deref()) {
            return false;
        }
        if self
            .time_window
            .as_deref()
            .is_some_and(|tw| tw != task.time_window)
        {
            return false;
        }
        if self.module.as_deref().is_some_and(|m| m != task.module) {
            return false;
        }
        if self.importance.is_some_and(|i| i != task.importance) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                task.title.to_lowercase().contains(&needle)
                    || task.description.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

impl TaskGraph {
    /// Build from tasks that already passed validation: ids unique, every
    /// dependency resolves, no cycles.
    pub(crate) fn from_validated(tasks: Vec<Task>) -> Self {
        let mut graph = DiGraph::with_capacity(tasks.len(), 0);
        let mut index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            let node = graph.add_node(i);
            index.insert(task.id.clone(), node);
        }
        for (i, task) in tasks.iter().enumerate() {
            for dep in &task.dependencies {
                if let Some(&from) = index.get(dep) {
                    graph.add_edge(from, NodeIndex::new(i), ());
                }
            }
        }
        debug_assert!(!petgraph::algo::is_cyclic_directed(&graph));

        let order = stable_topological_order(&graph);
        Self {
            tasks,
            index,
            graph,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|n| &self.tasks[n.index()])
    }

    pub fn get(&self, id: &str) -> Result<&Task, QueryError> {
        self.task(id)
            .ok_or_else(|| QueryError::UnknownTask(id.to_string()))
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// True when every dependency of `task_id` is in `completed_task_ids`.
    pub fn is_unlocked(&self, task_id: &str, progress: &UserProgress) -> Result<bool, QueryError> {
        let task = self.get(task_id)?;
        Ok(task
            .dependencies
            .iter()
            .all(|d| progress.is_task_completed(d)))
    }

    /// Unmet dependencies of `task_id`, in the order the task lists them.
    pub fn blocked_by<'a>(
        &'a self,
        task_id: &str,
        progress: &UserProgress,
    ) -> Result<Vec<&'a str>, QueryError> {
        let task = self.get(task_id)?;
        Ok(task
            .dependencies
            .iter()
            .filter(|d| !progress.is_task_completed(d))
            .map(String::as_str)
            .collect())
    }

    /// Kahn's algorithm, ties broken by declaration order.
    pub fn topological_order(&self) -> Vec<&Task> {
        self.order
            .iter()
            .map(|n| &self.tasks[n.index()])
            .collect()
    }

    /// Tasks that apply to `city`, in topological order. The city id is not
    /// checked against the catalog here.
    pub fn visible_in(&self, city: &str) -> Vec<&Task> {
        self.order
            .iter()
            .map(|n| &self.tasks[n.index()])
            .filter(|t| t.visible_in(Some(city)))
            .collect()
    }

    pub fn dependencies_of(&self, task_id: &str) -> Result<Vec<&Task>, QueryError> {
        let task = self.get(task_id)?;
        Ok(task
            .dependencies
            .iter()
            .filter_map(|d| self.task(d))
            .collect())
    }

    /// Tasks that list `task_id` as a dependency, in declaration order.
    pub fn dependents_of(&self, task_id: &str) -> Result<Vec<&Task>, QueryError> {
        let node = self
            .index
            .get(task_id)
            .ok_or_else(|| QueryError::UnknownTask(task_id.to_string()))?;
        let mut dependents: Vec<usize> = self
            .graph
            .neighbors_directed(*node, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        dependents.sort_unstable();
        Ok(dependents.into_iter().map(|i| &self.tasks[i]).collect())
    }

    /// Every unlocked task, in topological order.
    pub fn unlocked(&self, progress: &UserProgress) -> Vec<&Task> {
        self.topological_order()
            .into_iter()
            .filter(|t| {
                t.dependencies
                    .iter()
                    .all(|d| progress.is_task_completed(d))
            })
            .collect()
    }

    pub fn filter(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.topological_order()
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect()
    }
}

fn stable_topological_order(graph: &DiGraph<usize, ()>) -> Vec<NodeIndex> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(i)) = ready.pop() {
        let node = NodeIndex::new(i);
        order.push(node);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            let degree = &mut in_degree[next.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(next.index()));
            }
        }
    }
    order
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Find dependency cycles with an iterative depth-first traversal.
///
/// `dependencies[i]` lists the indices task `i` depends on. Each cycle is
/// rotated to start at its earliest-declared member, whatever task led the
/// traversal into it: `A -> B -> C -> A` comes back as `[A, B, C]`.
pub(crate) fn find_cycles(dependencies: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; dependencies.len()];
    let mut cycles = Vec::new();
    // (node, next edge to follow)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..dependencies.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::OnStack;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            if next < dependencies[node].len() {
                top.1 += 1;
                let succ = dependencies[node][next];
                match marks[succ] {
                    Mark::Unvisited => {
                        marks[succ] = Mark::OnStack;
                        stack.push((succ, 0));
                    }
                    Mark::OnStack => {
                        if let Some(start) = stack.iter().position(|(n, _)| *n == succ) {
                            let mut cycle: Vec<usize> =
                                stack[start..].iter().map(|(n, _)| *n).collect();
                            if let Some(earliest) = (0..cycle.len()).min_by_key(|&i| cycle[i]) {
                                cycle.rotate_left(earliest);
                            }
                            cycles.push(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }
    cycles
}
