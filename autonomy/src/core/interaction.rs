//! Interaction recipes and their dependency graph.
//!
//! An edge `A → B` exists when B's primary or secondary input accepts A's
//! output, so a route through the graph is a sequence of interactions where
//! each step consumes what the previous one produced.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::core::search::{PathSearch, TransitionGraph};

/// Attributes an item must carry and attributes it must not carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRequest {
    pub require: BTreeSet<String>,
    pub forbid: BTreeSet<String>,
}

impl AttributeRequest {
    pub fn new<I, S>(require: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            require: require.into_iter().map(Into::into).collect(),
            forbid: BTreeSet::new(),
        }
    }

    pub fn forbidding<I, S>(mut self, forbid: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbid.extend(forbid.into_iter().map(Into::into));
        self
    }

    /// True if an item carrying exactly `attributes` meets this request.
    pub fn accepts(&self, attributes: &BTreeSet<String>) -> bool {
        self.require.is_subset(attributes) && self.forbid.is_disjoint(attributes)
    }

    /// True if whatever `offered` produces meets this request.
    pub fn is_satisfied_by(&self, offered: &AttributeRequest) -> bool {
        self.accepts(&offered.require)
    }
}

/// A recipe: one or two inputs become one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub name: String,
    pub input: AttributeRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<AttributeRequest>,
    pub output: AttributeRequest,
}

impl Interaction {
    pub fn new(name: impl Into<String>, input: AttributeRequest, output: AttributeRequest) -> Self {
        Self {
            name: name.into(),
            input,
            secondary: None,
            output,
        }
    }

    pub fn with_secondary(mut self, secondary: AttributeRequest) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// True if `producer`'s output can feed either of this interaction's inputs.
    pub fn follows(&self, producer: &Interaction) -> bool {
        self.input.is_satisfied_by(&producer.output)
            || self
                .secondary
                .as_ref()
                .is_some_and(|secondary| secondary.is_satisfied_by(&producer.output))
    }
}

impl TransitionGraph for DiGraph<Interaction, ()> {
    type Node = NodeIndex;
    type Edge = EdgeIndex;

    fn successors(&self, node: NodeIndex, out: &mut Vec<(EdgeIndex, NodeIndex)>) {
        let start = out.len();
        out.extend(
            self.edges_directed(node, Direction::Outgoing)
                .map(|edge| (edge.id(), edge.target())),
        );
        out[start..].reverse();
    }
}

/// Dependency graph over interactions with inferred edges.
#[derive(Debug, Default)]
pub struct InteractionGraph {
    graph: DiGraph<Interaction, ()>,
    by_name: HashMap<String, NodeIndex>,
    search: PathSearch<NodeIndex, EdgeIndex>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an interaction and infer edges to and from every existing one.
    ///
    /// Returns `None` if an interaction with the same name already exists.
    pub fn add_interaction(&mut self, interaction: Interaction) -> Option<NodeIndex> {
        if self.by_name.contains_key(&interaction.name) {
            return None;
        }
        let name = interaction.name.clone();
        let index = self.graph.add_node(interaction);
        let existing: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|other| *other != index)
            .collect();
        for other in existing {
            if self.graph[index].follows(&self.graph[other]) {
                self.graph.add_edge(other, index, ());
            }
            if self.graph[other].follows(&self.graph[index]) {
                self.graph.add_edge(index, other, ());
            }
        }
        self.by_name.insert(name, index);
        Some(index)
    }

    pub fn interaction(&self, name: &str) -> Option<&Interaction> {
        self.by_name.get(name).map(|index| &self.graph[*index])
    }

    pub fn interactions(&self) -> impl Iterator<Item = &Interaction> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Interactions that can consume `name`'s output.
    pub fn next(&self, name: &str) -> Vec<&Interaction> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Interactions whose output `name` can consume.
    pub fn prev(&self, name: &str) -> Vec<&Interaction> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&Interaction> {
        let Some(&index) = self.by_name.get(name) else {
            return Vec::new();
        };
        let mut found: Vec<&Interaction> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|neighbor| &self.graph[neighbor])
            .collect();
        found.reverse();
        found
    }

    /// Interactions to perform, starting with `start` itself, until one
    /// satisfies `goal`.
    pub fn find_path(
        &mut self,
        start: &str,
        mut goal: impl FnMut(&Interaction) -> bool,
    ) -> Option<Vec<Interaction>> {
        let start = *self.by_name.get(start)?;
        let graph = &self.graph;
        let route = self
            .search
            .find_route(graph, start, |index| goal(&graph[index]))?;
        Some(
            route
                .nodes
                .iter()
                .map(|index| self.graph[*index].clone())
                .collect(),
        )
    }

    /// Recipe turning an item carrying `have` into one that meets `want`.
    ///
    /// Every interaction whose primary input accepts `have` is tried as a
    /// starting point, in insertion order; the first route found wins.
    pub fn find_recipe(
        &mut self,
        have: &BTreeSet<String>,
        want: &AttributeRequest,
    ) -> Option<Vec<Interaction>> {
        let starts: Vec<String> = self
            .graph
            .node_weights()
            .filter(|interaction| interaction.input.accepts(have))
            .map(|interaction| interaction.name.clone())
            .collect();
        starts.iter().find_map(|start| {
            self.find_path(start, |interaction| want.is_satisfied_by(&interaction.output))
        })
    }
}
