//! Body-pose transition graph.
//!
//! A [`BodySet`] is a named pose with its own animation slots; a transition
//! edge carries the [`Animation`] that moves the body from one set to the next.

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::core::search::{PathSearch, TransitionGraph};

/// Reference to an animation clip; playback lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    pub clip: String,
    #[serde(default)]
    pub looping: bool,
}

impl Animation {
    pub fn once(clip: impl Into<String>) -> Self {
        Self {
            clip: clip.into(),
            looping: false,
        }
    }

    pub fn looping(clip: impl Into<String>) -> Self {
        Self {
            clip: clip.into(),
            looping: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySet {
    pub name: String,
    /// Animations keyed by slot (`idle`, `talk`, ...).
    pub animations: BTreeMap<String, Animation>,
}

impl BodySet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            animations: BTreeMap::new(),
        }
    }

    pub fn with_animation(mut self, slot: impl Into<String>, animation: Animation) -> Self {
        self.animations.insert(slot.into(), animation);
        self
    }
}

/// Directed graph of body sets; edges are transition animations.
#[derive(Debug, Default)]
pub struct BodySetGraph {
    graph: DiGraph<BodySet, Animation>,
    by_name: HashMap<String, NodeIndex>,
    search: PathSearch<NodeIndex, EdgeIndex>,
}

impl TransitionGraph for DiGraph<BodySet, Animation> {
    type Node = NodeIndex;
    type Edge = EdgeIndex;

    fn successors(&self, node: NodeIndex, out: &mut Vec<(EdgeIndex, NodeIndex)>) {
        let start = out.len();
        out.extend(
            self.edges_directed(node, Direction::Outgoing)
                .map(|edge| (edge.id(), edge.target())),
        );
        // petgraph yields the newest edge first.
        out[start..].reverse();
    }
}

impl BodySetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a body set, replacing the animations of an existing one with
    /// the same name.
    pub fn add_body_set(&mut self, body_set: BodySet) -> NodeIndex {
        if let Some(&index) = self.by_name.get(&body_set.name) {
            self.graph[index] = body_set;
            return index;
        }
        let name = body_set.name.clone();
        let index = self.graph.add_node(body_set);
        self.by_name.insert(name, index);
        index
    }

    /// Add a transition `from → to`. Returns `None` if either end is unknown.
    pub fn add_transition(&mut self, from: &str, to: &str, animation: Animation) -> Option<EdgeIndex> {
        let from = self.index(from)?;
        let to = self.index(to)?;
        Some(self.graph.add_edge(from, to, animation))
    }

    pub fn index(&self, name: &str) -> Option<NodeIndex> {
        self.by_name.get(name).copied()
    }

    pub fn body_set(&self, name: &str) -> Option<&BodySet> {
        self.index(name).map(|index| &self.graph[index])
    }

    pub fn body_sets(&self) -> impl Iterator<Item = &BodySet> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn transition_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing `(target, animation)` pairs of `name`, in insertion order.
    pub fn transitions(&self, name: &str) -> Vec<(&str, &Animation)> {
        let Some(index) = self.index(name) else {
            return Vec::new();
        };
        let mut successors = Vec::new();
        TransitionGraph::successors(&self.graph, index, &mut successors);
        successors
            .into_iter()
            .map(|(edge, target)| (self.graph[target].name.as_str(), &self.graph[edge]))
            .collect()
    }

    /// Transition animations leading from `from` to `to`.
    ///
    /// `None` when either body set is unknown or `to` is unreachable; an empty
    /// sequence when `from == to`.
    pub fn find_path(&mut self, from: &str, to: &str) -> Option<Vec<Animation>> {
        let target = self.index(to)?;
        self.find_path_where(from, |_, index| index == target)
    }

    /// Transition animations leading from `from` to the first body set found
    /// that satisfies `goal`.
    pub fn find_path_where(
        &mut self,
        from: &str,
        mut goal: impl FnMut(&BodySet, NodeIndex) -> bool,
    ) -> Option<Vec<Animation>> {
        let start = self.index(from)?;
        let graph = &self.graph;
        let route = self
            .search
            .find_route(graph, start, |index| goal(&graph[index], index))?;
        Some(
            route
                .edges
                .iter()
                .map(|edge| self.graph[*edge].clone())
                .collect(),
        )
    }

    /// Body sets visited (start included) and the transition animations
    /// between them, from a single search.
    pub fn find_route(&mut self, from: &str, to: &str) -> Option<(Vec<String>, Vec<Animation>)> {
        let start = self.index(from)?;
        let target = self.index(to)?;
        let route = self
            .search
            .find_route(&self.graph, start, |index| index == target)?;
        let names = route
            .nodes
            .iter()
            .map(|index| self.graph[*index].name.clone())
            .collect();
        let animations = route
            .edges
            .iter()
            .map(|edge| self.graph[*edge].clone())
            .collect();
        Some((names, animations))
    }

    /// Names of the body sets visited by the route, start included.
    pub fn find_route_names(&mut self, from: &str, to: &str) -> Option<Vec<String>> {
        self.find_route(from, to).map(|(names, _)| names)
    }
}
