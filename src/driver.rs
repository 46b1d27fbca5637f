use std::time::{Duration, Instant};

use camino::Utf8Path;
use tracing::{debug, info, warn};

use crate::command::{Executor, RunCommand, write_run_script};
use crate::context::RunContext;
use crate::convert::{self, ConvertSummary};
use crate::error::GearError;
use crate::fetch::{self, DownloadSummary};
use crate::flywheel::FlywheelClient;
use crate::fs_util::{self, ScopedDir};
use crate::layout::BidsLayout;

pub const ENV_BOOTSTRAP_SCRIPT: &str = "/flywheel/v0/docker-env.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Downloading,
    Converting,
    WritingCommand,
    Executing,
    Collecting,
    Done,
    Failed,
}

impl Stage {
    pub fn describe(self) -> &'static str {
        match self {
            Stage::Init => "initialize the pipeline",
            Stage::Downloading => "download BIDS data",
            Stage::Converting => "convert BIDS layout",
            Stage::WritingCommand => "write run command",
            Stage::Executing => "run the analysis pipeline",
            Stage::Collecting => "collect pipeline outputs",
            Stage::Done => "finish the pipeline",
            Stage::Failed => "recover from failure",
        }
    }
}

pub trait PipelineStages {
    fn download(&mut self) -> Result<DownloadSummary, GearError>;
    fn convert(&mut self) -> Result<ConvertSummary, GearError>;
    fn write_command(&mut self) -> Result<RunCommand, GearError>;
    fn execute(&mut self, command: &RunCommand) -> Result<Duration, GearError>;
    fn collect(&mut self) -> Result<usize, GearError>;
}

#[derive(Debug)]
pub struct PipelineReport {
    pub downloaded: DownloadSummary,
    pub converted: ConvertSummary,
    pub collected: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct Driver {
    stage: Stage,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    pub fn new() -> Self {
        Self { stage: Stage::Init }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn run(&mut self, stages: &mut dyn PipelineStages) -> Result<PipelineReport, GearError> {
        self.stage = Stage::Downloading;
        let downloaded = match stages.download() {
            Ok(summary) => summary,
            Err(err) => return Err(self.fail(err)),
        };

        self.stage = Stage::Converting;
        let converted = match stages.convert() {
            Ok(summary) => summary,
            Err(err) => return Err(self.fail(err)),
        };

        self.stage = Stage::WritingCommand;
        let command = match stages.write_command() {
            Ok(command) => command,
            Err(err) => return Err(self.fail(err)),
        };

        self.stage = Stage::Executing;
        let elapsed = match stages.execute(&command) {
            Ok(elapsed) => elapsed,
            Err(err) => return Err(self.fail(err)),
        };

        self.stage = Stage::Collecting;
        let collected = match stages.collect() {
            Ok(count) => count,
            Err(err) => return Err(self.fail(err)),
        };

        self.stage = Stage::Done;
        Ok(PipelineReport {
            downloaded,
            converted,
            collected,
            elapsed,
        })
    }

    fn fail(&mut self, err: GearError) -> GearError {
        warn!("critical error while trying to {}: {err}", self.stage.describe());
        self.stage = Stage::Failed;
        err
    }
}

pub struct GearStages<'a, F: FlywheelClient, E: Executor> {
    ctx: &'a RunContext,
    client: &'a F,
    executor: &'a E,
}

impl<'a, F: FlywheelClient, E: Executor> GearStages<'a, F, E> {
    pub fn new(ctx: &'a RunContext, client: &'a F, executor: &'a E) -> Self {
        Self {
            ctx,
            client,
            executor,
        }
    }
}

impl<F: FlywheelClient, E: Executor> PipelineStages for GearStages<'_, F, E> {
    fn download(&mut self) -> Result<DownloadSummary, GearError> {
        fetch::download_bids(self.client, self.ctx, false)
    }

    fn convert(&mut self) -> Result<ConvertSummary, GearError> {
        let layout = BidsLayout::index(&self.ctx.paths.bids_root)?;
        convert::convert_from_bids(&layout, self.ctx)
    }

    fn write_command(&mut self) -> Result<RunCommand, GearError> {
        let command = RunCommand::full_analysis(&self.ctx.paths);
        write_run_script(&self.ctx.paths.run_script, &command)?;
        Ok(command)
    }

    fn execute(&mut self, command: &RunCommand) -> Result<Duration, GearError> {
        info!("running {}", command.shell_line());
        let start = Instant::now();
        let status = self.executor.run(command)?;
        let elapsed = start.elapsed();
        if status != 0 {
            return Err(GearError::Execution { status });
        }
        info!("pipeline executable finished in {}s", elapsed.as_secs());
        Ok(elapsed)
    }

    fn collect(&mut self) -> Result<usize, GearError> {
        collect_outputs(self.ctx)
    }
}

pub fn collect_outputs(ctx: &RunContext) -> Result<usize, GearError> {
    let source = &ctx.paths.pipeline_output_dir;
    if !source.as_std_path().is_dir() {
        return Err(GearError::Collection(format!(
            "pipeline output directory {source} does not exist"
        )));
    }
    let copied = fs_util::copy_dir_files(source, &ctx.paths.output_dir)?;
    if copied == 0 {
        return Err(GearError::Collection(format!(
            "no pipeline outputs found in {source}"
        )));
    }
    info!("collected {copied} output files into {}", ctx.paths.output_dir);
    Ok(copied)
}

pub fn run_pipeline<F: FlywheelClient, E: Executor>(
    ctx: &RunContext,
    client: &F,
    executor: &E,
) -> Result<PipelineReport, GearError> {
    let output_guard = ScopedDir::create(&ctx.paths.output_root)?;
    let work_guard = ScopedDir::create(&ctx.paths.working_dir)?;

    let mut stages = GearStages::new(ctx, client, executor);
    let report = Driver::new().run(&mut stages)?;

    output_guard.keep();
    work_guard.keep();
    Ok(report)
}

pub fn run_env_bootstrap<E: Executor>(script: &Utf8Path, executor: &E) {
    if !script.as_std_path().exists() {
        debug!("no environment bootstrap script at {script}");
        return;
    }
    let command = RunCommand::env_bootstrap(script);
    match executor.run(&command) {
        Ok(0) => debug!("environment bootstrap finished"),
        Ok(status) => warn!("environment bootstrap exited with status {status}"),
        Err(err) => warn!("environment bootstrap failed to start: {err}"),
    }
}
