//! Transfusion CLI Module
//!
//! Command-line interface for running the blood donation experiment and
//! inspecting the data.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::ExperimentConfig;
use crate::data::{ClassFrequency, Dataset};
use crate::experiment::Experiment;
use crate::export::PayloadKind;
use crate::search::SearchSpaceKind;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

/// Full-line variant of [`step_run`] for stages that log while running
fn step_start_line(msg: &str) -> String {
    format!("  {} {}...\n", accent("›"), msg)
}

fn step_start(msg: &str) {
    print!("{}", step_start_line(msg));
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "transfusion")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Predict blood donation with an evolutionary pipeline search and a logistic baseline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full experiment
    Run {
        /// Input data file (CSV with header)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// JSON experiment config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for the split, the search and the baseline
        #[arg(short, long)]
        seed: Option<u64>,

        /// Generations of the pipeline search
        #[arg(short, long)]
        generations: Option<usize>,

        /// Population size of the pipeline search
        #[arg(short, long)]
        population: Option<usize>,

        /// Search space (light, classifiers)
        #[arg(long)]
        space: Option<String>,

        /// Artifact output path
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Artifact payload (estimator, placeholder)
        #[arg(long)]
        payload: Option<String>,
    },

    /// Show raw preview, schema and class incidence
    Info {
        /// Input data file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// JSON experiment config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the stratified train/test split
    Split {
        /// Input data file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// JSON experiment config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Split seed
        #[arg(short, long)]
        seed: Option<u64>,
    },
}

/// Command-line overrides applied on top of the config file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub data: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub generations: Option<usize>,
    pub population: Option<usize>,
    pub space: Option<String>,
    pub artifact: Option<PathBuf>,
    pub payload: Option<String>,
}

impl Overrides {
    pub fn into_config(self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)?,
            None => ExperimentConfig::default(),
        };

        if let Some(data) = self.data {
            config = config.with_data_path(data);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(generations) = self.generations {
            config.search.generations = generations;
        }
        if let Some(population) = self.population {
            config.search.population_size = population;
        }
        if let Some(space) = self.space {
            config.search.search_space = space.parse::<SearchSpaceKind>()?;
        }
        if let Some(artifact) = self.artifact {
            config = config.with_artifact_path(artifact);
        }
        if let Some(payload) = self.payload {
            config = config.with_payload(payload.parse::<PayloadKind>()?);
        }

        config.validate()?;
        Ok(config)
    }
}

// ─── Shared stages ─────────────────────────────────────────────────────────────

fn load_dataset(experiment: &Experiment) -> anyhow::Result<Dataset> {
    let path = experiment.config().data_path.clone();
    step_run(&format!("Loading {}", path.display()));
    let start = Instant::now();
    let df = experiment.load()?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let dataset = experiment.prepare(df)?;
    step_ok(&format!("Label renamed to {}", "target".cyan()));
    Ok(dataset)
}

fn print_incidence(incidence: &[ClassFrequency]) {
    println!();
    println!("  {:<8} {:>8} {:>10}", muted("Label"), muted("Count"), muted("Share"));
    for class in incidence {
        println!(
            "  {:<8} {:>8} {:>10}",
            class.label,
            class.count,
            format!("{:.3}", class.frequency).white().bold()
        );
    }
}

fn print_variances(title: &str, variances: &[(String, f64)]) {
    println!();
    println!("  {}", muted(title));
    for (name, var) in variances {
        println!("  {:<28} {:>14.3}", name, var);
    }
}

// ─── Info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info(overrides: Overrides) -> anyhow::Result<()> {
    let experiment = Experiment::new(overrides.into_config()?);

    section("Raw file");
    for line in experiment.preview(5)? {
        println!("  {}", dim(&line));
    }

    section("Data Info");
    let dataset = load_dataset(&experiment)?;
    println!();
    indented(&dataset.head(5).to_string());
    println!();
    indented(&experiment.info(dataset.frame()).to_string());

    section("Class incidence");
    print_incidence(&dataset.class_incidence()?);
    println!();
    Ok(())
}

// ─── Split ─────────────────────────────────────────────────────────────────────

pub fn cmd_split(overrides: Overrides) -> anyhow::Result<()> {
    let experiment = Experiment::new(overrides.into_config()?);

    section("Split");
    let dataset = load_dataset(&experiment)?;
    let split = experiment.split(&dataset)?;

    let config = experiment.config();
    println!();
    println!("  {:<16} {}", muted("Test size"), config.split.test_size);
    println!("  {:<16} {}", muted("Seed"), config.split.random_state);
    println!("  {:<16} {}", muted("Train rows"), split.train_indices.len());
    println!("  {:<16} {}", muted("Test rows"), split.test_indices.len());
    println!("  {:<16} {:.3}", muted("Train positive"), split.train_positive_rate());
    println!("  {:<16} {:.3}", muted("Test positive"), split.test_positive_rate());
    println!();
    indented(&split.x_train.head(Some(2)).to_string());
    println!();
    Ok(())
}

// ─── Run ───────────────────────────────────────────────────────────────────────

pub fn cmd_run(overrides: Overrides) -> anyhow::Result<()> {
    let mut experiment = Experiment::new(overrides.into_config()?);

    section("Data");
    let dataset = load_dataset(&experiment)?;
    println!();
    indented(&dataset.head(5).to_string());
    print_incidence(&dataset.class_incidence()?);

    section("Split");
    let split = experiment.split(&dataset)?;
    step_ok(&format!(
        "{} train / {} test, test positive rate {:.3}",
        split.train_indices.len(),
        split.test_indices.len(),
        split.test_positive_rate()
    ));
    println!();
    indented(&split.x_train.head(Some(2)).to_string());

    section("Pipeline search");
    let search = experiment.config().search.clone();
    step_start(&format!(
        "Evolving {} pipelines for {} generations ({} space)",
        search.population_size,
        search.generations,
        search.search_space.as_str()
    ));
    let start = Instant::now();
    let outcome = experiment.search(&split)?;
    step_ok(&format!("{} pipelines in {:?}", outcome.scored.n_evaluated, start.elapsed()));

    println!();
    for step in outcome.scored.spec().step_lines() {
        println!("  {}", step.cyan());
    }
    println!();
    println!("  {:<16} {}", muted("CV AUC"), format!("{:.4}", outcome.scored.cv_score).white());
    println!("  {:<16} {}", muted("Test AUC"), format!("{:.4}", outcome.test_auc).white().bold());

    section("Baseline");
    step_run("Fitting log-normalized logistic regression");
    let start = Instant::now();
    let (model, report) = experiment.baseline(&split)?;
    step_done(&format!("{:?}", start.elapsed()));
    print_variances("Training variances", &report.variances_before);
    print_variances(
        &format!("After {} → {}", report.source_column, report.output_column),
        &report.variances_after,
    );
    println!();
    println!("  {:<16} {}", muted("Test AUC"), format!("{:.4}", report.test_auc).white().bold());

    section("Ranking");
    let ranking = experiment.rank(outcome.test_auc, report.test_auc);
    for (i, entry) in ranking.iter().enumerate() {
        println!("  {}. {:<16} {}", i + 1, entry.name, format!("{:.4}", entry.score).white());
    }

    section("Artifact");
    step_run("Saving and reloading");
    let artifact = experiment.persist(model, &split)?;
    artifact.check_reload(report.test_auc)?;
    step_done(&artifact.path.display().to_string());

    println!();
    line_box_top();
    line_box(&kv("Name    ", &artifact.name));
    line_box(&kv("Payload ", &format!("{:?}", artifact.kind)));
    match artifact.reload_auc {
        Some(auc) => line_box(&kv("Reloaded", &format!("AUC {:.4} {}", auc, ok("✓")))),
        None => line_box(&kv("Reloaded", "placeholder only")),
    }
    line_box_bottom();
    println!();
    Ok(())
}

pub fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("transfusion run -d transfusion.data", "Run the full experiment"),
        ("transfusion run -c experiment.json", "Run from a config file"),
        ("transfusion run --space classifiers -g 3", "Smaller search"),
        ("transfusion info -d transfusion.data", "Inspect the dataset"),
        ("transfusion split -d transfusion.data", "Show the train/test split"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<44} {}", cmd.cyan(), dim(desc));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "hi".red());
        assert_eq!(strip_ansi(&colored), "hi");
    }

    #[test]
    fn test_search_step_ends_its_line() {
        let line = step_start_line("Evolving 20 pipelines");
        assert!(line.ends_with('\n'));
        assert_eq!(strip_ansi(&line), "  › Evolving 20 pipelines...\n");
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = Overrides {
            seed: Some(7),
            generations: Some(2),
            space: Some("classifiers".to_string()),
            payload: Some("placeholder".to_string()),
            ..Default::default()
        };
        let config = overrides.into_config().unwrap();
        assert_eq!(config.split.random_state, 7);
        assert_eq!(config.search.generations, 2);
        assert_eq!(config.search.search_space, SearchSpaceKind::Classifiers);
        assert_eq!(config.artifact.payload, PayloadKind::Placeholder);
    }

    #[test]
    fn test_bad_override_is_error() {
        let overrides = Overrides {
            space: Some("huge".to_string()),
            ..Default::default()
        };
        assert!(overrides.into_config().is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["transfusion", "run", "-d", "x.csv", "-g", "3", "--space", "light"]).unwrap();
        match cli.command {
            Some(Commands::Run { data, generations, .. }) => {
                assert_eq!(data, Some(PathBuf::from("x.csv")));
                assert_eq!(generations, Some(3));
            }
            _ => panic!("expected run"),
        }
    }
}
