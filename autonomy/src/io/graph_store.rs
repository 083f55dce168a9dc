//! Graph document loaders with schema + invariant validation.
//!
//! Body graphs and recipe books are JSON documents checked against the
//! bundled v1 schemas before they are turned into searchable graphs.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::body_set::{Animation, BodySet, BodySetGraph};
use crate::core::interaction::{AttributeRequest, Interaction, InteractionGraph};

pub const BODY_GRAPH_SCHEMA: &str = include_str!("../../../schemas/body_graph/v1.schema.json");
pub const RECIPES_SCHEMA: &str = include_str!("../../../schemas/recipes/v1.schema.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyGraphDocument {
    pub body_sets: Vec<BodySetDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodySetDocument {
    pub name: String,
    #[serde(default)]
    pub animations: BTreeMap<String, Animation>,
    /// Target body set name → transition animation.
    #[serde(default)]
    pub transitions: BTreeMap<String, Animation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeBookDocument {
    pub interactions: Vec<Interaction>,
}

/// Load and validate a body graph from disk (schema + invariants).
pub fn load_body_graph(path: &Path) -> Result<BodySetGraph> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read body graph {}", path.display()))?;
    let document =
        parse_body_graph(&raw).with_context(|| format!("load body graph {}", path.display()))?;
    Ok(build_body_graph(&document))
}

/// Load and validate a recipe book from disk (schema + invariants).
pub fn load_recipe_book(path: &Path) -> Result<InteractionGraph> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read recipe book {}", path.display()))?;
    let document =
        parse_recipe_book(&raw).with_context(|| format!("load recipe book {}", path.display()))?;
    Ok(build_interaction_graph(&document))
}

pub fn parse_body_graph(raw: &str) -> Result<BodyGraphDocument> {
    let value: Value = serde_json::from_str(raw).context("parse body graph json")?;
    validate_schema(&value, BODY_GRAPH_SCHEMA)?;
    let document: BodyGraphDocument =
        serde_json::from_value(value).context("parse body graph as v1 struct")?;
    let errors = body_graph_invariants(&document);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(document)
}

pub fn parse_recipe_book(raw: &str) -> Result<RecipeBookDocument> {
    let value: Value = serde_json::from_str(raw).context("parse recipe book json")?;
    validate_schema(&value, RECIPES_SCHEMA)?;
    let document: RecipeBookDocument =
        serde_json::from_value(value).context("parse recipe book as v1 struct")?;
    let errors = recipe_book_invariants(&document);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(document)
}

/// Semantic checks the schema cannot express:
/// - body set names are unique
/// - transitions target a known body set other than their source
pub fn body_graph_invariants(document: &BodyGraphDocument) -> Vec<String> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    for body_set in &document.body_sets {
        if !names.insert(body_set.name.as_str()) {
            errors.push(format!("duplicate body set '{}'", body_set.name));
        }
    }
    for body_set in &document.body_sets {
        for target in body_set.transitions.keys() {
            if target == &body_set.name {
                errors.push(format!("{}: transition to itself", body_set.name));
            } else if !names.contains(target.as_str()) {
                errors.push(format!(
                    "{}: transition to unknown body set '{}'",
                    body_set.name, target
                ));
            }
        }
    }
    errors
}

/// Semantic checks the schema cannot express:
/// - interaction names are unique
/// - no request both requires and forbids the same attribute
pub fn recipe_book_invariants(document: &RecipeBookDocument) -> Vec<String> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    for interaction in &document.interactions {
        if !names.insert(interaction.name.as_str()) {
            errors.push(format!("duplicate interaction '{}'", interaction.name));
        }
        let requests = [
            ("input", Some(&interaction.input)),
            ("secondary", interaction.secondary.as_ref()),
            ("output", Some(&interaction.output)),
        ];
        for (label, request) in requests {
            let Some(request) = request else {
                continue;
            };
            if let Some(attribute) = contradiction(request) {
                errors.push(format!(
                    "{}/{}: attribute '{}' is both required and forbidden",
                    interaction.name, label, attribute
                ));
            }
        }
    }
    errors
}

fn contradiction(request: &AttributeRequest) -> Option<&str> {
    request
        .require
        .intersection(&request.forbid)
        .next()
        .map(String::as_str)
}

pub fn build_body_graph(document: &BodyGraphDocument) -> BodySetGraph {
    let mut graph = BodySetGraph::new();
    for body_set in &document.body_sets {
        graph.add_body_set(BodySet {
            name: body_set.name.clone(),
            animations: body_set.animations.clone(),
        });
    }
    for body_set in &document.body_sets {
        for (target, animation) in &body_set.transitions {
            graph.add_transition(&body_set.name, target, animation.clone());
        }
    }
    debug!(
        body_sets = graph.len(),
        transitions = graph.transition_count(),
        "body graph built"
    );
    graph
}

pub fn build_interaction_graph(document: &RecipeBookDocument) -> InteractionGraph {
    let mut graph = InteractionGraph::new();
    for interaction in &document.interactions {
        graph.add_interaction(interaction.clone());
    }
    debug!(
        interactions = graph.len(),
        edges = graph.edge_count(),
        "interaction graph built"
    );
    graph
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema_raw: &str) -> Result<()> {
    let schema: Value = serde_json::from_str(schema_raw).context("parse schema json")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| anyhow!("invalid schema: {}", err))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
