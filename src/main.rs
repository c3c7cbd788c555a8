use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use emodel::cli::{Cli, Command};
use emodel::config::EmodelConfig;
use emodel::error::Error;
use emodel::model;
use emodel::topology::Topology;
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = emodel::config::load(cli.config.as_deref());
    let verbosity = config.report.verbosity.saturating_add(cli.verbose);

    match cli.command {
        Command::Report { trace, model } => cmd_report(&config, &trace, model, verbosity, cli.json)?,
        Command::Check { model } => cmd_check(&config, model)?,
        Command::Template {
            trace,
            model,
            force,
        } => cmd_template(&config, &trace, model, force)?,
        Command::Completions { shell } => emodel::cli::print_completions(shell),
    }

    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}

fn model_path(config: &EmodelConfig, model: Option<PathBuf>) -> PathBuf {
    model.unwrap_or_else(|| config.model.path.clone())
}

fn cmd_report(
    config: &EmodelConfig,
    trace: &Path,
    model: Option<PathBuf>,
    verbosity: u8,
    json: bool,
) -> Result<()> {
    let model_path = model_path(config, model);

    let energy_model = match model::load(&model_path) {
        Ok(m) => m,
        Err(Error::ModelNotFound { path }) => {
            let topology = Topology::load(trace)?;
            model::template::write(&path, &topology)?;
            println!(
                "{} {} not found; wrote a template there. Fill in the {} values and run again.",
                "Note:".yellow(),
                path.display(),
                "?".cyan()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let topology = Topology::load(trace)?;
    let report = emodel::energy::calculate(&energy_model, &topology, &config.calculator.options())
        .with_context(|| format!("cannot apply {} to {}", model_path.display(), trace.display()))?;

    if json {
        emodel::output::print_report_json(&report);
    } else {
        emodel::output::print_report(&report, verbosity);
    }

    Ok(())
}

fn cmd_check(config: &EmodelConfig, model: Option<PathBuf>) -> Result<()> {
    let model_path = model_path(config, model);
    let energy_model = model::load(&model_path)?;
    println!("{} {}", "Parsed".green().bold(), model_path.display());
    emodel::output::print_model_summary(&energy_model);
    Ok(())
}

fn cmd_template(
    config: &EmodelConfig,
    trace: &Path,
    model: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let model_path = model_path(config, model);
    if model_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            model_path.display()
        );
    }

    let topology = Topology::load(trace)?;
    model::template::write(&model_path, &topology)?;
    println!(
        "Wrote energy model template for {} clusters to {}",
        topology.clusters.len(),
        model_path.display()
    );
    Ok(())
}
