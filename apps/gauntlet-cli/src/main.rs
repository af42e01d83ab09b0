use std::{env, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use gauntlet_engine::ProcessLauncher;
use gauntlet_ops::{init_tracing, RunRecord};
use gauntlet_orchestrator::{render::chunk_lines, RunnerConfig, Scheduler, TestRunner};
use gauntlet_suite::load_suite;
use gauntlet_types::config::{FaultPolicy, HarnessConfig};
use tracing::{info, warn};

const CONFIG_ENV: &str = "GAUNTLET_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Run an EPD test suite against a UCI engine.
#[derive(Debug, Parser)]
#[command(name = "gauntlet", version)]
struct Cli {
    /// Path to the EPD test suite.
    testsuite: PathBuf,
    /// Path to the engine executable.
    engine: PathBuf,
    /// Maximum search depth per position [default: 64]
    #[arg(long)]
    depth: Option<u32>,
    /// Search time per position in milliseconds [default: 10000]
    #[arg(long)]
    time: Option<u64>,
    /// Echo the protocol exchange.
    #[arg(long)]
    debug: bool,
    /// Number of parallel workers, each with its own engine [default: 1]
    #[arg(short, long)]
    jobs: Option<usize>,
    /// TOML configuration file; also read from GAUNTLET_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Always wait for the engine's own bestmove.
    #[arg(long)]
    no_early_stop: bool,
    /// Restart the engine and continue after a protocol violation.
    #[arg(long)]
    skip_on_error: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli, env::var(CONFIG_ENV).ok().map(PathBuf::from))?;
    config.validate()?;
    init_tracing(&config.ops)?;

    let positions = load_suite(&cli.testsuite)?;
    let launcher = ProcessLauncher::from_config(&config.engine);
    let runner = TestRunner::new(launcher, RunnerConfig::from_config(&config));
    let scheduler = Scheduler::new(runner, config.scheduler.jobs)?;

    let started_at = Utc::now();
    let output = scheduler
        .run(&positions, |outcome| {
            if cli.format == OutputFormat::Text {
                for line in chunk_lines(outcome) {
                    println!("{line}");
                }
            }
        })
        .await;

    match cli.format {
        OutputFormat::Text => println!("{}", output.report.summary_line()),
        OutputFormat::Json => {
            let record = RunRecord::new(
                config.engine.path.clone(),
                cli.testsuite.display().to_string(),
                started_at,
                output.report.clone(),
                &output.outcomes,
            );
            println!("{}", record.to_json()?);
        }
    }

    if output.report.has_failures() {
        warn!(
            "{} chunk failure(s); affected positions have no result",
            output.report.failures.len()
        );
        return Ok(ExitCode::FAILURE);
    }
    info!("Run complete");
    Ok(ExitCode::SUCCESS)
}

/// Defaults, then the TOML file (`--config` before `env_config`), then
/// explicit flags.
fn load_config(cli: &Cli, env_config: Option<PathBuf>) -> Result<HarnessConfig> {
    let path = cli.config.clone().or(env_config);
    let mut config = match &path {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    config.engine.path = cli.engine.display().to_string();
    if let Some(depth) = cli.depth {
        config.search.depth = depth;
    }
    if let Some(time) = cli.time {
        config.search.movetime_ms = time;
    }
    if let Some(jobs) = cli.jobs {
        config.scheduler.jobs = jobs;
    }
    if cli.no_early_stop {
        config.search.early_stop = false;
    }
    if cli.skip_on_error {
        config.scheduler.fault_policy = FaultPolicy::SkipPosition;
    }
    if cli.debug {
        config.ops.debug = true;
    }
    if let Some(level) = &cli.log_level {
        config.ops.log_level = level.clone();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "gauntlet",
            "wac.epd",
            "./stockfish",
            "--depth",
            "12",
            "--time",
            "250",
            "-j",
            "4",
            "--debug",
            "--skip-on-error",
        ]);
        let config = load_config(&cli, None).expect("config");
        assert_eq!(config.engine.path, "./stockfish");
        assert_eq!(config.search.depth, 12);
        assert_eq!(config.search.movetime_ms, 250);
        assert_eq!(config.scheduler.jobs, 4);
        assert_eq!(config.scheduler.fault_policy, FaultPolicy::SkipPosition);
        assert!(config.ops.debug);
        assert!(config.search.early_stop);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::parse_from(["gauntlet", "wac.epd", "engine", "--format", "json"]);
        let config = load_config(&cli, None).expect("config");
        assert_eq!(config.search.depth, 64);
        assert_eq!(config.search.movetime_ms, 10_000);
        assert_eq!(config.scheduler.jobs, 1);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_file_sits_between_defaults_and_flags() {
        let path = std::env::temp_dir().join("gauntlet-cli-layering-test.toml");
        std::fs::write(&path, "[search]\ndepth = 9\n\n[scheduler]\njobs = 3\n")
            .expect("write temp config");

        let cli = Cli::parse_from(["gauntlet", "wac.epd", "engine", "-j", "2"]);
        let config = load_config(&cli, Some(path.clone())).expect("config");
        assert_eq!(config.search.depth, 9);
        assert_eq!(config.scheduler.jobs, 2);
        assert_eq!(config.search.movetime_ms, 10_000);

        let missing = std::env::temp_dir().join("gauntlet-cli-missing.toml");
        let cli = Cli::parse_from([
            "gauntlet",
            "wac.epd",
            "engine",
            "--config",
            path.to_str().expect("utf-8 temp path"),
        ]);
        let config = load_config(&cli, Some(missing)).expect("--config wins over env");
        assert_eq!(config.scheduler.jobs, 3);

        let _ = std::fs::remove_file(&path);
    }
}
