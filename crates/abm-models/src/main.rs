//! abm: run, sweep and serve the demo agent-based models.
//!
//! Examples:
//!   abm run wealth --steps 100 --param n=200 --out output/
//!   abm batch schelling --config sweep.toml --out output/
//!   abm serve flockers --port 8521
//!   abm params virus

use std::path::PathBuf;

use abm_core::abm_types::{ParamValue, Params};
use abm_core::{RunConfig, SweepConfig};
use abm_models::{write_batch, write_run, ModelKind};
use abm_viz::ServerConfig;
use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_STEPS: u64 = 100;

/// Agent-based modeling demos
#[derive(Parser, Debug)]
#[command(name = "abm")]
#[command(about = "Run, sweep and visualize agent-based models")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one model and print a summary
    Run {
        model: ModelKind,

        /// Maximum number of steps
        #[arg(long)]
        steps: Option<u64>,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Parameter override, as name=value (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,

        /// TOML file with steps, seed and params
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for model_vars.json and agent_vars.jsonl
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run a parameter sweep
    Batch {
        model: ModelKind,

        /// TOML sweep file
        #[arg(long)]
        config: PathBuf,

        /// Directory for batch_model_vars.json and batch_agent_vars.jsonl
        #[arg(long)]
        out: Option<PathBuf>,

        /// Run on one thread even when built with parallel support
        #[arg(long)]
        sequential: bool,
    },

    /// Launch the browser visualization
    Serve {
        model: ModelKind,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value_t = 8521)]
        port: u16,
    },

    /// Print a model's default parameters as TOML
    Params { model: ModelKind },
}

fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{}'", raw));
    }
    Ok((name.to_string(), ParamValue::parse(value.trim())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .init();

    match cli.command {
        Command::Run {
            model,
            steps,
            seed,
            params,
            config,
            out,
        } => run(model, steps, seed, params, config, out),
        Command::Batch {
            model,
            config,
            out,
            sequential,
        } => batch(model, config, out, sequential),
        Command::Serve { model, host, port } => {
            info!(model = model.name(), "Starting visualization server");
            model
                .serve(ServerConfig { host, port })
                .await
                .context("visualization server failed")
        }
        Command::Params { model } => {
            let toml = toml::to_string(&model.default_params())
                .context("failed to render parameters")?;
            print!("{}", toml);
            Ok(())
        }
    }
}

fn run(
    model: ModelKind,
    steps: Option<u64>,
    seed: Option<u64>,
    overrides: Vec<(String, ParamValue)>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let file = match &config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(name) = &file.model {
        match ModelKind::from_name(name) {
            Some(kind) if kind == model => {}
            Some(kind) => warn!(
                config = kind.name(),
                cli = model.name(),
                "Config names a different model; using the command line"
            ),
            None => bail!("config names unknown model '{}'", name),
        }
    }

    // command line beats the config file
    let mut params = file.params.clone();
    params.merge(&overrides.into_iter().collect::<Params>());
    let steps = steps.or(file.steps).unwrap_or(DEFAULT_STEPS);
    let seed = seed.or(file.seed);

    println!("{}", model.title());
    println!("{}", "=".repeat(model.title().len()));

    let summary = model
        .run(&params, seed, steps)
        .with_context(|| format!("{} run failed", model.name()))?;

    println!("Seed: {}", summary.seed);
    println!(
        "Steps: {}{}",
        summary.steps,
        if summary.finished { " (model stopped)" } else { "" }
    );
    println!("Agents: {}", summary.agents);
    for (name, value) in &summary.latest {
        println!("  {}: {}", name, value);
    }

    if let Some(dir) = out {
        write_run(&summary, &dir)
            .with_context(|| format!("failed to write output to {}", dir.display()))?;
        println!("Output written to {}", dir.display());
    }
    Ok(())
}

fn batch(
    model: ModelKind,
    config: PathBuf,
    out: Option<PathBuf>,
    sequential: bool,
) -> anyhow::Result<()> {
    let sweep = SweepConfig::from_file(&config)
        .with_context(|| format!("failed to load {}", config.display()))?;
    if sweep.run_count() == 0 {
        return Err(anyhow!("sweep in {} has no runs", config.display()));
    }

    println!("{} sweep", model.title());
    println!("Runs: {}", sweep.run_count());
    println!("Max steps per run: {}", sweep.batch.max_steps);

    let results = model
        .batch(&sweep, sequential)
        .with_context(|| format!("{} sweep failed", model.name()))?;

    for run in &results.runs {
        let vars: Vec<String> = run
            .model_vars
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!(
            "  run {:>3} (seed {}, {} steps): {}",
            run.run_id,
            run.seed,
            run.steps,
            vars.join(", ")
        );
    }

    if let Some(dir) = out {
        write_batch(&results, &dir)
            .with_context(|| format!("failed to write output to {}", dir.display()))?;
        println!("Output written to {}", dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("n=10").unwrap(),
            ("n".to_string(), ParamValue::Int(10))
        );
        assert_eq!(
            parse_param(" density = 0.5 ").unwrap(),
            ("density".to_string(), ParamValue::Float(0.5))
        );
        assert!(parse_param("n").is_err());
        assert!(parse_param("=3").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "abm", "run", "wealth", "--steps", "5", "--param", "n=3", "--param", "width=4",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                model,
                steps,
                params,
                ..
            } => {
                assert_eq!(model, ModelKind::Wealth);
                assert_eq!(steps, Some(5));
                assert_eq!(params.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["abm", "-v", "serve", "flockers", "--port", "9000"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Serve { model: ModelKind::Flockers, port: 9000, .. }
        ));

        assert!(Cli::try_parse_from(["abm", "run", "boids"]).is_err());
    }
}
