use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use vcid_asl_gear::command::SystemExecutor;
use vcid_asl_gear::context::{
    DEFAULT_CONTEXT_PATH, DEFAULT_OUTPUT_DIR, GearContext, PathOverrides, RunContext,
};
use vcid_asl_gear::driver::{self, ENV_BOOTSTRAP_SCRIPT};
use vcid_asl_gear::error::GearError;
use vcid_asl_gear::fetch;
use vcid_asl_gear::flywheel::FlywheelHttpClient;

#[derive(Parser)]
#[command(name = "vcid-asl")]
#[command(about = "Stages BIDS data from Flywheel and drives the VCID ASL analysis pipeline")]
#[command(version, author)]
struct Cli {
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    input_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    code_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    mcr_root: Option<Utf8PathBuf>,

    #[arg(long)]
    pipeline_output_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(gear) = report.downcast_ref::<GearError>() {
            return ExitCode::from(map_exit_code(gear));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GearError) -> u8 {
    match error {
        GearError::MissingContext(_)
        | GearError::ContextRead(_)
        | GearError::ContextParse(_)
        | GearError::MissingInput(_)
        | GearError::InvalidApiKey
        | GearError::InvalidAnalysisId(_)
        | GearError::InvalidLabel(_)
        | GearError::MissingParent { .. } => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("=======: VCID ASL processing :=======");

    let config_path = cli
        .config
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CONTEXT_PATH));
    let output_dir = cli
        .output_dir
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR));
    let overrides = PathOverrides {
        input_root: cli.input_dir,
        code_dir: cli.code_dir,
        mcr_root: cli.mcr_root,
        pipeline_output_dir: cli.pipeline_output_dir,
    };

    let gear = GearContext::load(&config_path)?;
    let client = FlywheelHttpClient::new(gear.api_key()?)?;
    let ctx = RunContext::resolve(&gear, &client, output_dir, &overrides)?;
    info!(
        "analysis {} for {} / sub-{} / ses-{}",
        ctx.analysis_id, ctx.project_label, ctx.subject_label, ctx.session_label
    );
    for (name, input) in [
        ("asl-file", &ctx.asl_input),
        ("m0_file", &ctx.m0_input),
        ("mprage_file", &ctx.mprage_input),
    ] {
        if let Some(location) = input {
            debug!("{name} input provided: {}", location.name);
        }
    }

    if cli.dry_run {
        let summary = fetch::download_bids(&client, &ctx, true)?;
        info!(
            "dry run: {} files gathered, {} outside perf/anat",
            summary.gathered, summary.skipped
        );
        return Ok(());
    }

    let executor = SystemExecutor;
    driver::run_env_bootstrap(Utf8Path::new(ENV_BOOTSTRAP_SCRIPT), &executor);

    let report = driver::run_pipeline(&ctx, &client, &executor)?;
    info!(
        "pipeline finished: {} files downloaded, {} ASL / {} M0 / {} MPRAGE volumes staged, {} outputs collected, analysis ran {}s",
        report.downloaded.downloaded,
        report.converted.asl,
        report.converted.m0,
        report.converted.mprage,
        report.collected,
        report.elapsed.as_secs()
    );
    Ok(())
}
