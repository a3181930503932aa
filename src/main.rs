//! SSP Verifier CLI
//!
//! Runs the enrollment / authentication / attack script and writes case
//! evidence. With `--verify-replay` the script runs twice and the two
//! evidence trees must be byte-identical.
//!
//! Exit codes: 0 on PASS, 1 on replay divergence, 2 on usage or
//! configuration errors.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ssp::{
    evidence::{
        replay::{execute_script, CaseSummary},
        writer::{remove_tree, write_tree},
        RunMode,
    },
    AdmissibilityContext, ReplayScript, ReplayVerifier, SspConfig, SspError, VERSION,
};

/// SSP Verifier CLI
#[derive(Parser)]
#[command(name = "ssp-verifier")]
#[command(about = "Deterministic structural verifier with replay evidence", long_about = None)]
#[command(version)]
struct Cli {
    /// Input to enroll and re-present
    #[arg(long)]
    m: String,

    /// Layer-pass bound (overrides the config file)
    #[arg(long)]
    horizon_steps: Option<u32>,

    /// Enrolled posture class
    #[arg(long, default_value = "P0")]
    posture: String,

    /// Enrolled structural-time class
    #[arg(long, default_value = "T0")]
    time_class: String,

    /// Posture class for the cross presentations
    #[arg(long, default_value = "P1")]
    cross_posture: String,

    /// Time class for the cross presentations (defaults to --time-class)
    #[arg(long)]
    cross_time_class: Option<String>,

    /// Deltas applied to the trailing number of m for attack cases
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "1,-1")]
    attack_deltas: Vec<i64>,

    /// Run tag, part of every output folder name
    #[arg(long, default_value = "V03_DEMO")]
    tag: String,

    /// Output root folder
    #[arg(long, default_value = "outputs/ssp_out")]
    out_root: PathBuf,

    /// JSON configuration file
    #[arg(long, env = "SSP_CONFIG")]
    config: Option<PathBuf>,

    /// Run twice and require byte-identical evidence
    #[arg(long)]
    verify_replay: bool,

    /// Log level
    #[arg(long, env = "SSP_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("SSP Verifier v{}", VERSION);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let divergence = err
                .downcast_ref::<SspError>()
                .is_some_and(SspError::is_implementation_defect);
            if divergence {
                println!("VERIFY_REPLAY: FAIL ({:#})", err);
                ExitCode::from(1)
            } else {
                error!("{:#}", err);
                eprintln!("ERROR: {:#}", err);
                ExitCode::from(2)
            }
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let tag = cli.tag.trim();
    anyhow::ensure!(!tag.is_empty(), "empty --tag");

    let context = AdmissibilityContext::new(&cli.posture, &cli.time_class);
    let cross = AdmissibilityContext::new(
        &cli.cross_posture,
        cli.cross_time_class.as_deref().unwrap_or(&cli.time_class),
    );
    let script = ReplayScript::new(&cli.m, context)
        .with_cross_context(cross)
        .with_attack_deltas(&cli.attack_deltas);

    if cli.verify_replay {
        let verifier = ReplayVerifier::new(config, tag)?;
        let report = verifier.verify_on_disk(&script, &cli.out_root)?;
        print_cases(&report.cases);
        println!("VERIFY_REPLAY: PASS (all CSV/TXT/CONFIG/MANIFEST outputs byte-identical)");
        println!("tree_digest = {}", hex::encode(report.tree_digest));
        println!("OK: SSP Verifier v{} complete", VERSION);
        println!("Output folder: {}", cli.out_root.display());
        return Ok(());
    }

    // Timestamped folder; not used for replay evidence
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let run_dir = cli
        .out_root
        .join(format!("{}__{}__{}", ts, config.engine_tag, tag));
    let run = execute_script(&script, &config, tag, RunMode::Demo)?;
    remove_tree(&run_dir)?;
    write_tree(&run_dir, &run.tree)?;

    print_cases(&run.cases);
    println!("OK: SSP Verifier v{} complete", VERSION);
    println!("Output folder: {}", run_dir.display());
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<SspConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => SspConfig::default(),
    };
    if let Some(horizon_steps) = cli.horizon_steps {
        config = config.with_horizon_steps(horizon_steps);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_config_file(path: &Path) -> anyhow::Result<SspConfig> {
    let config = SspConfig::from_json_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn print_cases(cases: &[CaseSummary]) {
    for case in cases {
        println!("  {:<28} {:<9} {}", case.name, case.outcome, case.reason);
    }
}
