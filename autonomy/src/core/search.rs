//! Best-first route search over transition graphs.
//!
//! Successors at a new maximum depth go to the back of the frontier; everything
//! else goes to the front. The effect is a depth-biased search that still
//! terminates on cyclic graphs because every node is visited at most once.
//! Routes are guaranteed to exist when reported, not to be shortest.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// A directed graph the search can walk.
pub trait TransitionGraph {
    type Node: Copy + Eq + Hash;
    type Edge: Copy;

    /// Append `(edge, target)` for every outgoing edge of `node`, in edge
    /// insertion order.
    fn successors(&self, node: Self::Node, out: &mut Vec<(Self::Edge, Self::Node)>);
}

/// A found route: `nodes[0]` is the start, `edges[i]` leads from `nodes[i]`
/// to `nodes[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<N, E> {
    pub nodes: Vec<N>,
    pub edges: Vec<E>,
    /// Nodes popped from the frontier and tested before the goal was found.
    pub expanded: usize,
}

impl<N: Copy, E> Route<N, E> {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn destination(&self) -> Option<N> {
        self.nodes.last().copied()
    }
}

#[derive(Debug, Clone)]
struct Entry<N, E> {
    node: N,
    parent: Option<usize>,
    edge: Option<E>,
    range: u32,
}

/// Reusable search state. Buffers are cleared, not freed, between searches.
#[derive(Debug)]
pub struct PathSearch<N, E> {
    entries: Vec<Entry<N, E>>,
    frontier: VecDeque<usize>,
    visited: HashSet<N>,
    successors: Vec<(E, N)>,
}

impl<N, E> Default for PathSearch<N, E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            successors: Vec::new(),
        }
    }
}

impl<N: Copy + Eq + Hash, E: Copy> PathSearch<N, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search from `start` for the first node satisfying `goal`.
    ///
    /// Returns `None` once the frontier is exhausted.
    pub fn find_route<G>(
        &mut self,
        graph: &G,
        start: N,
        mut goal: impl FnMut(N) -> bool,
    ) -> Option<Route<N, E>>
    where
        G: TransitionGraph<Node = N, Edge = E>,
    {
        if goal(start) {
            return Some(Route {
                nodes: vec![start],
                edges: Vec::new(),
                expanded: 0,
            });
        }

        self.entries.clear();
        self.frontier.clear();
        self.visited.clear();

        self.entries.push(Entry {
            node: start,
            parent: None,
            edge: None,
            range: 0,
        });
        self.visited.insert(start);
        self.frontier.push_back(0);
        let mut max_range = 0;
        let mut expanded = 0;

        while let Some(index) = self.frontier.pop_front() {
            let node = self.entries[index].node;
            if goal(node) {
                return Some(self.reconstruct(index, expanded));
            }
            expanded += 1;

            let range = self.entries[index].range + 1;
            self.successors.clear();
            graph.successors(node, &mut self.successors);
            for position in 0..self.successors.len() {
                let (edge, target) = self.successors[position];
                if !self.visited.insert(target) {
                    continue;
                }
                let next = self.entries.len();
                self.entries.push(Entry {
                    node: target,
                    parent: Some(index),
                    edge: Some(edge),
                    range,
                });
                if range > max_range {
                    max_range = range;
                    self.frontier.push_back(next);
                } else {
                    self.frontier.push_front(next);
                }
            }
        }
        None
    }

    fn reconstruct(&self, mut index: usize, expanded: usize) -> Route<N, E> {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        loop {
            let entry = &self.entries[index];
            nodes.push(entry.node);
            if let Some(edge) = entry.edge {
                edges.push(edge);
            }
            match entry.parent {
                Some(parent) => index = parent,
                None => break,
            }
        }
        nodes.reverse();
        edges.reverse();
        Route {
            nodes,
            edges,
            expanded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adjacency list with edge ids equal to `from * 100 + to`.
    struct Grid(Vec<Vec<usize>>);

    impl TransitionGraph for Grid {
        type Node = usize;
        type Edge = usize;

        fn successors(&self, node: usize, out: &mut Vec<(usize, usize)>) {
            for &target in &self.0[node] {
                out.push((node * 100 + target, target));
            }
        }
    }

    #[test]
    fn start_matching_goal_returns_empty_route() {
        let graph = Grid(vec![vec![1], vec![]]);
        let mut search = PathSearch::new();
        let route = search.find_route(&graph, 0, |node| node == 0).expect("route");
        assert!(route.is_empty());
        assert_eq!(route.nodes, vec![0]);
        assert_eq!(route.expanded, 0);
    }

    #[test]
    fn single_edge_route() {
        let graph = Grid(vec![vec![1], vec![]]);
        let mut search = PathSearch::new();
        let route = search.find_route(&graph, 0, |node| node == 1).expect("route");
        assert_eq!(route.nodes, vec![0, 1]);
        assert_eq!(route.edges, vec![1]);
        assert_eq!(route.destination(), Some(1));
    }

    #[test]
    fn two_node_cycle_without_goal_terminates() {
        let graph = Grid(vec![vec![1], vec![0]]);
        let mut search = PathSearch::new();
        assert_eq!(search.find_route(&graph, 0, |node| node == 7), None);
    }

    #[test]
    fn each_node_is_expanded_at_most_once() {
        // Fully connected: every node reachable from every other.
        let graph = Grid((0..6).map(|node| (0..6).filter(|t| *t != node).collect()).collect());
        let mut search = PathSearch::new();
        assert_eq!(search.find_route(&graph, 0, |_| false), None);
        assert_eq!(search.visited.len(), 6);
        assert_eq!(search.entries.len(), 6);
    }

    #[test]
    fn route_edges_chain_consecutive_nodes() {
        let graph = Grid(vec![vec![1, 2], vec![3], vec![3], vec![4], vec![]]);
        let mut search = PathSearch::new();
        let route = search.find_route(&graph, 0, |node| node == 4).expect("route");
        assert_eq!(route.nodes.first(), Some(&0));
        assert_eq!(route.destination(), Some(4));
        for (index, edge) in route.edges.iter().enumerate() {
            assert_eq!(*edge, route.nodes[index] * 100 + route.nodes[index + 1]);
        }
    }

    #[test]
    fn search_state_is_reusable() {
        let graph = Grid(vec![vec![1], vec![2], vec![]]);
        let mut search = PathSearch::new();
        assert!(search.find_route(&graph, 0, |node| node == 2).is_some());
        assert_eq!(search.find_route(&graph, 2, |node| node == 0), None);
        let route = search.find_route(&graph, 1, |node| node == 2).expect("route");
        assert_eq!(route.nodes, vec![1, 2]);
    }
}
