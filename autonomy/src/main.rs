//! Hierarchical task scheduler and transition planner.
//!
//! Simulates task scenarios frame by frame and plans body set changes and
//! interaction recipes from JSON graph documents.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use autonomy::core::interaction::AttributeRequest;
use autonomy::exit_codes;
use autonomy::io::config::{CONFIG_FILE, load_config};
use autonomy::logging;
use autonomy::plan::{
    PathOutcome, RecipeOutcome, check_body_graph, check_recipe_book, parse_attributes,
    plan_path_from_file, plan_recipe_from_file,
};
use autonomy::simulate::simulate_file;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "autonomy",
    version,
    about = "Hierarchical task scheduler and transition planner"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a TOML scenario and check its expectations.
    Simulate {
        scenario: PathBuf,
        /// Config file (defaults to `autonomy.toml` in the working directory).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print every lifecycle event, not just the summary.
        #[arg(long)]
        transcript: bool,
    },
    /// Find the transition animations between two body sets.
    Path {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Find the interactions turning an item into one with the wanted attributes.
    Craft {
        #[arg(long)]
        recipes: PathBuf,
        /// Comma-separated attributes the item carries now.
        #[arg(long)]
        have: String,
        /// Comma-separated attributes the result must carry.
        #[arg(long)]
        want: String,
        /// Comma-separated attributes the result must not carry.
        #[arg(long)]
        forbid: Option<String>,
    },
    /// Check graph documents against schema and invariants.
    Check {
        #[arg(long)]
        graph: Option<PathBuf>,
        #[arg(long)]
        recipes: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Simulate {
            scenario,
            config,
            transcript,
        } => cmd_simulate(&scenario, config.as_deref(), transcript),
        Command::Path { graph, from, to } => cmd_path(&graph, &from, &to),
        Command::Craft {
            recipes,
            have,
            want,
            forbid,
        } => cmd_craft(&recipes, &have, &want, forbid.as_deref()),
        Command::Check { graph, recipes } => cmd_check(graph.as_deref(), recipes.as_deref()),
    }
}

fn cmd_simulate(scenario: &Path, config: Option<&Path>, transcript: bool) -> Result<i32> {
    let config = load_config(config.unwrap_or(Path::new(CONFIG_FILE)))?;
    let report = simulate_file(scenario, &config)?;
    if transcript || config.log_transcript {
        for entry in &report.transcript {
            println!("{}", entry);
        }
    }
    for task in &report.tasks {
        println!(
            "{}: {} (registered {}x, interrupted {}x)",
            task.name, task.outcome, task.registrations, task.interruptions
        );
    }
    println!("ticks: {}", report.ticks);
    if report.passed() {
        return Ok(exit_codes::OK);
    }
    for problem in report.mismatches.iter().chain(report.violations.iter()) {
        eprintln!("- {}", problem);
    }
    Ok(exit_codes::EXPECTATION_MISMATCH)
}

fn cmd_path(graph: &Path, from: &str, to: &str) -> Result<i32> {
    match plan_path_from_file(graph, from, to)? {
        PathOutcome::Found {
            body_sets,
            animations,
        } => {
            println!("{}", body_sets.join(" -> "));
            for animation in &animations {
                let looping = if animation.looping { " (looping)" } else { "" };
                println!("{}{}", animation.clip, looping);
            }
            Ok(exit_codes::OK)
        }
        PathOutcome::NoPath => {
            eprintln!("no path from '{}' to '{}'", from, to);
            Ok(exit_codes::NO_PATH)
        }
    }
}

fn cmd_craft(recipes: &Path, have: &str, want: &str, forbid: Option<&str>) -> Result<i32> {
    let have = parse_attributes(have);
    let want = AttributeRequest {
        require: parse_attributes(want),
        forbid: forbid.map(parse_attributes).unwrap_or_default(),
    };
    match plan_recipe_from_file(recipes, &have, &want)? {
        RecipeOutcome::Found(steps) => {
            for step in &steps {
                println!("{}", step.name);
            }
            Ok(exit_codes::OK)
        }
        RecipeOutcome::NoRecipe => {
            eprintln!("no recipe reaches the requested attributes");
            Ok(exit_codes::NO_PATH)
        }
    }
}

fn cmd_check(graph: Option<&Path>, recipes: Option<&Path>) -> Result<i32> {
    if graph.is_none() && recipes.is_none() {
        bail!("nothing to check: pass --graph and/or --recipes");
    }
    if let Some(path) = graph {
        let summary = check_body_graph(path)?;
        println!(
            "{}: {} body sets, {} transitions",
            path.display(),
            summary.nodes,
            summary.edges
        );
    }
    if let Some(path) = recipes {
        let summary = check_recipe_book(path)?;
        println!(
            "{}: {} interactions, {} edges",
            path.display(),
            summary.nodes,
            summary.edges
        );
    }
    Ok(exit_codes::OK)
}
