use std::{io::Write, process::ExitCode};

use clap::Parser;
use error_stack::ResultExt;
use wrf_xsect::{
    batch::{run_batch, BatchSummary, NcOpener},
    config::RunConfig,
    logging::init_logging,
};

mod cli;
mod error;

use error::CliError;

fn main() -> ExitCode {
    let clargs = cli::Cli::parse();
    init_logging(clargs.verbosity.log_level_filter());
    if let Err(e) = main_inner(clargs) {
        eprintln!("ERROR: {e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main_inner(clargs: cli::Cli) -> error_stack::Result<(), CliError> {
    match clargs.command {
        cli::Commands::Plot(plot_cli) => plot_driver(plot_cli),
        cli::Commands::ConfigTemplate(template_cli) => {
            RunConfig::preset(template_cli.preset)
                .write_template(&template_cli.template_file)
                .change_context_lazy(|| CliError::context("Error writing the configuration template"))?;
            log::info!("Wrote {}", template_cli.template_file.display());
            Ok(())
        }
        cli::Commands::DebugConfig(config_cli) => {
            let config = load_config(&config_cli)?;
            println!("Configuration:\n\n{config:#?}");
            Ok(())
        }
    }
}

/// Main function that plots every file matching the pattern.
fn plot_driver(cli: cli::PlotCli) -> error_stack::Result<(), CliError> {
    let mut config = load_config(&cli.config)?;
    cli.apply_to(&mut config);
    config
        .validate()
        .change_context_lazy(|| CliError::use_error("The command line options gave an invalid configuration"))?;

    let pattern = match &cli.pattern {
        Some(p) => p.clone(),
        None => prompt_for_pattern()?,
    };

    let renderer = cli
        .renderer
        .build()
        .change_context_lazy(|| CliError::use_error(format!("Cannot use the {} renderer", cli.renderer)))?;

    let summary = run_batch(&pattern, &cli.output_root, &config, &NcOpener, renderer.as_ref())
        .change_context_lazy(|| CliError::context(format!("Error plotting files matching {pattern}")))?;
    print_summary(&summary);

    if summary.all_succeeded() {
        Ok(())
    } else {
        Err(CliError::FilesFailed(summary.failed.len()).into())
    }
}

/// Load the configuration from the preset, optional TOML file, and environment.
fn load_config(cli: &cli::ConfigCli) -> error_stack::Result<RunConfig, CliError> {
    RunConfig::load(cli.preset, cli.config.as_deref()).change_context_lazy(|| {
        match &cli.config {
            Some(p) => CliError::context(format!("Error loading configuration from {}", p.display())),
            None => CliError::context("Error loading configuration"),
        }
    })
}

fn prompt_for_pattern() -> error_stack::Result<String, CliError> {
    print!("Enter directory to be evaluated: ");
    std::io::stdout()
        .flush()
        .change_context_lazy(|| CliError::context("Error writing the prompt"))?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .change_context_lazy(|| CliError::context("Error reading the input pattern"))?;

    let pattern = line.trim();
    if pattern.is_empty() {
        return Err(CliError::use_error("no input pattern given").into());
    }
    Ok(pattern.to_string())
}

fn print_summary(summary: &BatchSummary) {
    if summary.n_files() == 0 {
        println!("No files found.");
        return;
    }

    let mut table = tabled::Table::new(summary.rows());
    table.with(tabled::settings::Style::modern());
    println!("{table}");
    println!(
        "{} plotted, {} failed, {} skipped. Plots are in {}",
        summary.rendered.len(),
        summary.failed.len(),
        summary.skipped.len(),
        summary.output_dir.display()
    );
}
