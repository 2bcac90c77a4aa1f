use anyhow::{Context as _, Result};
use pypeline::cli::commands::{RunCommand, ValidateCommand};
use pypeline::cli::output::*;
use pypeline::cli::{Cli, Command};
use pypeline::{Context, FileLoader, ParserRegistry, PipelineRunner, StepRegistry};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let runner = PipelineRunner::new(Arc::new(FileLoader));

    // Seed the context
    let mut context = Context::with_working_dir(&cmd.dir);
    for (key, value) in &cmd.set {
        context.set(key.clone(), value.clone());
        println!(
            "{} Context seed: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    println!("{} Running pipeline {}", ROCKET, style(&cmd.name).bold());
    println!();

    match runner
        .run_pipeline(&cmd.name, &mut context, cmd.input.as_deref(), true)
        .await
    {
        Ok(summary) => {
            println!();
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", format_summary(&summary));
            }
            Ok(())
        }
        Err(err) => {
            println!();
            eprintln!("{}", format_failure(&cmd.name, &err));
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    use pypeline::DefinitionLoader;

    println!("{} Validating pipeline {}", INFO, style(&cmd.name).bold());

    let definition = match FileLoader.load(&cmd.name, &cmd.dir) {
        Ok(definition) => definition,
        Err(err) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}: {}", style(err.kind()).bold(), style(&err).red());
            std::process::exit(1);
        }
    };

    // Check every step and the declared parser against the registries.
    let steps = StepRegistry::with_builtin_steps();
    let parsers = ParserRegistry::with_builtin_parsers();
    let mut unknown = 0;
    for entry in &definition.steps {
        if !steps.contains(entry.name()) {
            println!("{} Unknown step: {}", WARN, style(entry.name()).yellow());
            unknown += 1;
        }
    }
    if let Some(parser) = &definition.context_parser {
        if !parsers.contains(parser) {
            println!(
                "{} Unknown context parser: {}",
                WARN,
                style(parser).yellow()
            );
            unknown += 1;
        }
    }

    if unknown > 0 {
        println!("{} Pipeline references {} unknown name(s)", CROSS, unknown);
        std::process::exit(1);
    }

    println!("{} Pipeline definition is valid!", CHECK);
    println!("  Steps: {}", style(definition.steps.len()).cyan());
    if let Some(parser) = &definition.context_parser {
        println!("  Context parser: {}", style(parser).cyan());
    }

    if cmd.json {
        let json = serde_json::to_string_pretty(&definition)?;
        println!("\n{}", json);
    }

    Ok(())
}
