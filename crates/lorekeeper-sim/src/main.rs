//! # Lorekeeper Sim
//!
//! Headless boss encounter simulator.
//!
//! Loads an encounter config (TOML) and quiz sets (RON), runs a scripted
//! player against the boss at a fixed timestep and prints a JSON summary
//! on stdout. Logs go to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lorekeeper_combat::{EncounterConfig, QuizBank, QuizSet};

use crate::scenario::{Scenario, ScenarioOptions};

#[derive(Parser, Debug)]
#[command(name = "lorekeeper-sim")]
#[command(about = "Simulate a boss encounter and print a JSON summary")]
#[command(version)]
struct Args {
    /// Encounter config (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Quiz set file (RON); repeat for several files, built-in sets when omitted
    #[arg(short, long)]
    quiz: Vec<PathBuf>,

    /// Seed for every random roll
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Probability of answering a quiz question correctly (0.0-1.0)
    #[arg(short, long, default_value_t = 0.8, value_parser = parse_finite)]
    accuracy: f32,

    /// Simulated time limit in seconds
    #[arg(long, default_value_t = 300.0, value_parser = parse_duration)]
    max_seconds: f32,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// Main entry point.
fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs)?;

    info!("Lorekeeper sim v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => EncounterConfig::load_from(path),
        None => EncounterConfig::default(),
    };

    let sets = load_quiz_sets(&args.quiz)?;
    let mut rng = fastrand::Rng::with_seed(args.seed);
    let bank = QuizBank::from_sets(&sets, config.quiz.shuffle_questions, &mut rng);
    if bank.rejected() > 0 {
        warn!("{} malformed question(s) skipped", bank.rejected());
    }

    if !(0.0..=1.0).contains(&args.accuracy) {
        warn!("Accuracy {} clamped to [0, 1]", args.accuracy);
    }
    let options = ScenarioOptions {
        seed: args.seed,
        accuracy: args.accuracy,
        max_seconds: args.max_seconds,
        ..ScenarioOptions::default()
    };

    let summary = Scenario::new(&config, bank.questions().to_vec(), options).run();
    let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
    println!("{json}");

    Ok(())
}

fn parse_finite(value: &str) -> Result<f32, String> {
    let parsed: f32 = value.parse().map_err(|e| format!("{e}"))?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(format!("{value} is not a finite number"))
    }
}

fn parse_duration(value: &str) -> Result<f32, String> {
    let seconds = parse_finite(value)?;
    if seconds > 0.0 {
        Ok(seconds)
    } else {
        Err(format!("{value} must be greater than zero"))
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("lorekeeper=info".parse()?);
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
    Ok(())
}

/// Loads every quiz file, or the built-in sets when none are given.
fn load_quiz_sets(paths: &[PathBuf]) -> Result<Vec<QuizSet>> {
    if paths.is_empty() {
        return QuizSet::builtin().context("built-in quiz sets are malformed");
    }

    let mut sets = Vec::new();
    for path in paths {
        let loaded = QuizSet::load_all(path)
            .with_context(|| format!("failed to load quiz sets from {}", path.display()))?;
        sets.extend(loaded);
    }
    Ok(sets)
}
