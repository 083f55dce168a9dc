//! Planning helpers for `autonomy path`, `autonomy craft`, and `autonomy check`.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Result, bail};
use tracing::debug;

use crate::core::body_set::{Animation, BodySetGraph};
use crate::core::interaction::{AttributeRequest, Interaction, InteractionGraph};
use crate::io::graph_store::{load_body_graph, load_recipe_book};

/// Structured outcome of a body set path query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOutcome {
    /// Route found: visited body sets (start included) and the transition
    /// animations between them.
    Found {
        body_sets: Vec<String>,
        animations: Vec<Animation>,
    },
    /// Target is unreachable from the start.
    NoPath,
}

/// Structured outcome of a recipe query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeOutcome {
    /// Interactions to perform, in order.
    Found(Vec<Interaction>),
    /// No chain of interactions produces the requested attributes.
    NoRecipe,
}

/// Summary of a graph document that passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Plan a pose change in an in-memory body graph.
///
/// Unknown body set names are errors rather than [`PathOutcome::NoPath`].
pub fn plan_path(graph: &mut BodySetGraph, from: &str, to: &str) -> Result<PathOutcome> {
    for name in [from, to] {
        if graph.index(name).is_none() {
            bail!("unknown body set '{}'", name);
        }
    }
    let Some((body_sets, animations)) = graph.find_route(from, to) else {
        debug!(from, to, "no body set route");
        return Ok(PathOutcome::NoPath);
    };
    Ok(PathOutcome::Found {
        body_sets,
        animations,
    })
}

/// Load a body graph from disk and plan a pose change.
pub fn plan_path_from_file(graph_path: &Path, from: &str, to: &str) -> Result<PathOutcome> {
    let mut graph = load_body_graph(graph_path)?;
    plan_path(&mut graph, from, to)
}

/// Plan a recipe in an in-memory interaction graph.
pub fn plan_recipe(
    graph: &mut InteractionGraph,
    have: &BTreeSet<String>,
    want: &AttributeRequest,
) -> Result<RecipeOutcome> {
    if want.require.is_empty() && want.forbid.is_empty() {
        bail!("recipe request names no attributes");
    }
    match graph.find_recipe(have, want) {
        Some(steps) => Ok(RecipeOutcome::Found(steps)),
        None => {
            debug!(?have, ?want, "no recipe");
            Ok(RecipeOutcome::NoRecipe)
        }
    }
}

/// Load a recipe book from disk and plan a recipe.
pub fn plan_recipe_from_file(
    recipes_path: &Path,
    have: &BTreeSet<String>,
    want: &AttributeRequest,
) -> Result<RecipeOutcome> {
    let mut graph = load_recipe_book(recipes_path)?;
    plan_recipe(&mut graph, have, want)
}

/// Validate a body graph document (schema + invariants).
pub fn check_body_graph(path: &Path) -> Result<GraphSummary> {
    let graph = load_body_graph(path)?;
    Ok(GraphSummary {
        nodes: graph.len(),
        edges: graph.transition_count(),
    })
}

/// Validate a recipe book document (schema + invariants).
pub fn check_recipe_book(path: &Path) -> Result<GraphSummary> {
    let graph = load_recipe_book(path)?;
    Ok(GraphSummary {
        nodes: graph.len(),
        edges: graph.edge_count(),
    })
}

/// Split a comma-separated attribute list, ignoring blanks.
pub fn parse_attributes(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|attribute| !attribute.is_empty())
        .map(str::to_string)
        .collect()
}
