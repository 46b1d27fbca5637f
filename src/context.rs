use std::collections::HashMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::domain::{AnalysisId, BidsLabel};
use crate::error::GearError;
use crate::flywheel::FlywheelClient;

pub const DEFAULT_CONTEXT_PATH: &str = "/flywheel/v0/config.json";
pub const DEFAULT_OUTPUT_DIR: &str = "/flywheel/v0/output";
pub const DEFAULT_INPUT_ROOT: &str = "/opt/base/input";
pub const DEFAULT_PIPELINE_OUTPUT_DIR: &str = "/opt/base/output";
pub const DEFAULT_CODE_DIR: &str = "/flywheel/v0/app/for_redistribution_files_only";
pub const DEFAULT_MCR_ROOT: &str = "/opt/mcr/v99";
pub const RUN_SCRIPT_NAME: &str = "vcid_run.sh";
pub const BIDS_DATASET_DIR: &str = "bids_dataset";

#[derive(Debug, Deserialize)]
pub struct GearContext {
    #[serde(default)]
    pub config: GearConfig,
    #[serde(default)]
    pub inputs: HashMap<String, GearInput>,
    pub destination: Destination,
}

#[derive(Debug, Deserialize)]
pub struct GearConfig {
    #[serde(rename = "BIDS-acq")]
    bids_acq: Option<String>,
    #[serde(rename = "BIDS-run")]
    bids_run: Option<String>,
    #[serde(rename = "BIDS-subject")]
    bids_subject: Option<String>,
    #[serde(rename = "BIDS-session")]
    bids_session: Option<String>,
    #[serde(rename = "apply-acq-run-filters", default = "default_apply_filters")]
    apply_acq_run_filters: bool,
}

impl Default for GearConfig {
    fn default() -> Self {
        Self {
            bids_acq: None,
            bids_run: None,
            bids_subject: None,
            bids_session: None,
            apply_acq_run_filters: default_apply_filters(),
        }
    }
}

fn default_apply_filters() -> bool {
    true
}

impl GearConfig {
    pub fn bids_acq(&self) -> Option<&str> {
        non_empty(self.bids_acq.as_deref())
    }

    pub fn bids_run(&self) -> Option<&str> {
        non_empty(self.bids_run.as_deref())
    }

    pub fn bids_subject(&self) -> Option<&str> {
        non_empty(self.bids_subject.as_deref())
    }

    pub fn bids_session(&self) -> Option<&str> {
        non_empty(self.bids_session.as_deref())
    }

    pub fn apply_acq_run_filters(&self) -> bool {
        self.apply_acq_run_filters
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct GearInput {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub location: Option<FileLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileLocation {
    pub path: Utf8PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Destination {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl GearContext {
    pub fn load(path: &Utf8Path) -> Result<Self, GearError> {
        if !path.as_std_path().exists() {
            return Err(GearError::MissingContext(path.to_path_buf()));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| GearError::ContextRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| GearError::ContextParse(err.to_string()))
    }

    pub fn api_key(&self) -> Result<&str, GearError> {
        self.inputs
            .get("api_key")
            .and_then(|input| input.key.as_deref())
            .ok_or_else(|| GearError::MissingInput("api_key".to_string()))
    }

    pub fn file_input(&self, name: &str) -> Option<&FileLocation> {
        self.inputs.get(name).and_then(|input| input.location.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct GearPaths {
    pub input_root: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub output_root: Utf8PathBuf,
    pub working_dir: Utf8PathBuf,
    pub bids_root: Utf8PathBuf,
    pub run_script: Utf8PathBuf,
    pub code_dir: Utf8PathBuf,
    pub mcr_root: Utf8PathBuf,
    pub pipeline_output_dir: Utf8PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub input_root: Option<Utf8PathBuf>,
    pub code_dir: Option<Utf8PathBuf>,
    pub mcr_root: Option<Utf8PathBuf>,
    pub pipeline_output_dir: Option<Utf8PathBuf>,
}

impl GearPaths {
    pub fn resolve(
        output_dir: Utf8PathBuf,
        analysis_id: &AnalysisId,
        overrides: &PathOverrides,
    ) -> Self {
        let output_root = output_dir.join(analysis_id.as_str());
        let working_dir = Utf8PathBuf::from(format!("{output_root}_work"));
        let bids_root = output_root.join(BIDS_DATASET_DIR);
        let run_script = output_dir.join(RUN_SCRIPT_NAME);
        Self {
            input_root: overrides
                .input_root
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_INPUT_ROOT)),
            output_dir,
            output_root,
            working_dir,
            bids_root,
            run_script,
            code_dir: overrides
                .code_dir
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CODE_DIR)),
            mcr_root: overrides
                .mcr_root
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_MCR_ROOT)),
            pipeline_output_dir: overrides
                .pipeline_output_dir
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PIPELINE_OUTPUT_DIR)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub analysis_id: AnalysisId,
    pub project_label: String,
    pub subject_label: String,
    pub session_label: String,
    pub subjects: Vec<String>,
    pub sessions: Vec<String>,
    pub bids_subject: BidsLabel,
    pub bids_session: BidsLabel,
    pub bids_acq: Option<String>,
    pub bids_run: Option<String>,
    pub apply_acq_run_filters: bool,
    pub asl_input: Option<FileLocation>,
    pub m0_input: Option<FileLocation>,
    pub mprage_input: Option<FileLocation>,
    pub paths: GearPaths,
}

impl RunContext {
    pub fn resolve<F: FlywheelClient>(
        gear: &GearContext,
        client: &F,
        output_dir: Utf8PathBuf,
        overrides: &PathOverrides,
    ) -> Result<Self, GearError> {
        let analysis_id: AnalysisId = gear.destination.id.parse()?;
        let analysis = client.get(analysis_id.as_str())?;

        let project_id =
            analysis
                .parents
                .get("project")
                .ok_or_else(|| GearError::MissingParent {
                    container: analysis.id.clone(),
                    kind: "project".to_string(),
                })?;
        let project = client.get(project_id)?;

        let session_ref = analysis.parent.as_ref().ok_or_else(|| GearError::MissingParent {
            container: analysis.id.clone(),
            kind: "session".to_string(),
        })?;
        let session = client.get(&session_ref.id)?;

        let subject_id =
            session
                .parents
                .get("subject")
                .ok_or_else(|| GearError::MissingParent {
                    container: session.id.clone(),
                    kind: "subject".to_string(),
                })?;
        let subject = client.get(subject_id)?;

        let bids_subject: BidsLabel = gear
            .config
            .bids_subject()
            .unwrap_or(&subject.label)
            .parse()?;
        let bids_session: BidsLabel = gear
            .config
            .bids_session()
            .unwrap_or(&session.label)
            .parse()?;

        let paths = GearPaths::resolve(output_dir, &analysis_id, overrides);

        Ok(Self {
            analysis_id,
            project_label: project.label,
            subjects: vec![subject.label.clone()],
            sessions: vec![session.label.clone()],
            subject_label: subject.label,
            session_label: session.label,
            bids_subject,
            bids_session,
            bids_acq: gear.config.bids_acq().map(str::to_string),
            bids_run: gear.config.bids_run().map(str::to_string),
            apply_acq_run_filters: gear.config.apply_acq_run_filters(),
            asl_input: gear.file_input("asl-file").cloned(),
            m0_input: gear.file_input("m0_file").cloned(),
            mprage_input: gear.file_input("mprage_file").cloned(),
            paths,
        })
    }
}
