use std::collections::HashMap;
use std::fs;
use std::path::Path;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use vcid_asl_gear::context::{GearContext, PathOverrides, RunContext};
use vcid_asl_gear::error::GearError;
use vcid_asl_gear::flywheel::{BidsDownload, Container, FlywheelClient, ParentRef};

const ANALYSIS_ID: &str = "5eb4f2c1a9d0e8b7c6a5f4d3";
const PROJECT_ID: &str = "aaaaaaaaaaaaaaaaaaaaaaaa";
const SESSION_ID: &str = "bbbbbbbbbbbbbbbbbbbbbbbb";
const SUBJECT_ID: &str = "cccccccccccccccccccccccc";

struct MockPlatform {
    containers: HashMap<String, Container>,
}

impl MockPlatform {
    fn with_chain() -> Self {
        let mut containers = HashMap::new();
        containers.insert(
            ANALYSIS_ID.to_string(),
            Container {
                id: ANALYSIS_ID.to_string(),
                label: "asl analysis".to_string(),
                parents: HashMap::from([("project".to_string(), PROJECT_ID.to_string())]),
                parent: Some(ParentRef {
                    id: SESSION_ID.to_string(),
                    kind: Some("session".to_string()),
                }),
            },
        );
        containers.insert(
            PROJECT_ID.to_string(),
            Container {
                id: PROJECT_ID.to_string(),
                label: "VCID".to_string(),
                parents: HashMap::new(),
                parent: None,
            },
        );
        containers.insert(
            SESSION_ID.to_string(),
            Container {
                id: SESSION_ID.to_string(),
                label: "V1".to_string(),
                parents: HashMap::from([("subject".to_string(), SUBJECT_ID.to_string())]),
                parent: None,
            },
        );
        containers.insert(
            SUBJECT_ID.to_string(),
            Container {
                id: SUBJECT_ID.to_string(),
                label: "S1".to_string(),
                parents: HashMap::new(),
                parent: None,
            },
        );
        Self { containers }
    }
}

impl FlywheelClient for MockPlatform {
    fn get(&self, id: &str) -> Result<Container, GearError> {
        self.containers
            .get(id)
            .cloned()
            .ok_or_else(|| GearError::FlywheelStatus {
                status: 404,
                message: format!("container {id} not found"),
            })
    }

    fn gather_bids(
        &self,
        _project_label: &str,
        _subjects: &[String],
        _sessions: &[String],
    ) -> Result<Vec<BidsDownload>, GearError> {
        Ok(Vec::new())
    }

    fn download_file(
        &self,
        _download: &BidsDownload,
        _destination: &Path,
    ) -> Result<(), GearError> {
        Err(GearError::FlywheelHttp("not implemented".to_string()))
    }
}

fn context_json(config: &str) -> String {
    format!(
        r#"{{
            "config": {config},
            "inputs": {{
                "api_key": {{"base": "api-key", "key": "site.flywheel.io:secret"}}
            }},
            "destination": {{"id": "{ANALYSIS_ID}", "type": "analysis"}}
        }}"#
    )
}

fn write_context(root: &Utf8Path, config: &str) -> Utf8PathBuf {
    let path = root.join("config.json");
    fs::write(path.as_std_path(), context_json(config)).unwrap();
    path
}

#[test]
fn load_reads_the_gear_context_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let path = write_context(root, r#"{"BIDS-acq": "3dspiral"}"#);

    let gear = GearContext::load(&path).unwrap();

    assert_eq!(gear.destination.id, ANALYSIS_ID);
    assert_eq!(gear.config.bids_acq(), Some("3dspiral"));
    assert_eq!(gear.api_key().unwrap(), "site.flywheel.io:secret");
}

#[test]
fn load_missing_file_is_typed() {
    let err = GearContext::load(Utf8Path::new("/nonexistent/config.json")).unwrap_err();
    assert_matches!(err, GearError::MissingContext(_));
}

#[test]
fn load_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let path = root.join("config.json");
    fs::write(path.as_std_path(), b"{not json").unwrap();

    let err = GearContext::load(&path).unwrap_err();
    assert_matches!(err, GearError::ContextParse(_));
}

#[test]
fn resolve_walks_the_container_chain() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let path = write_context(root, "{}");
    let gear = GearContext::load(&path).unwrap();
    let platform = MockPlatform::with_chain();

    let ctx = RunContext::resolve(
        &gear,
        &platform,
        root.join("output"),
        &PathOverrides::default(),
    )
    .unwrap();

    assert_eq!(ctx.analysis_id.as_str(), ANALYSIS_ID);
    assert_eq!(ctx.project_label, "VCID");
    assert_eq!(ctx.subject_label, "S1");
    assert_eq!(ctx.session_label, "V1");
    assert_eq!(ctx.subjects, vec!["S1".to_string()]);
    assert_eq!(ctx.sessions, vec!["V1".to_string()]);
    assert_eq!(ctx.bids_subject.as_str(), "S1");
    assert_eq!(ctx.bids_session.as_str(), "V1");
    assert!(ctx.apply_acq_run_filters);
    assert_eq!(ctx.paths.output_root, root.join("output").join(ANALYSIS_ID));
    assert_eq!(
        ctx.paths.working_dir.as_str(),
        format!("{}_work", ctx.paths.output_root)
    );
    assert_eq!(
        ctx.paths.bids_root,
        ctx.paths.output_root.join("bids_dataset")
    );
    assert_eq!(ctx.paths.run_script, root.join("output").join("vcid_run.sh"));
}

#[test]
fn subject_and_session_overrides_shape_local_labels_only() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let path = write_context(
        root,
        r#"{"BIDS-subject": "sub-override01", "BIDS-session": "ses-W2"}"#,
    );
    let gear = GearContext::load(&path).unwrap();
    let platform = MockPlatform::with_chain();

    let ctx = RunContext::resolve(
        &gear,
        &platform,
        root.join("output"),
        &PathOverrides::default(),
    )
    .unwrap();

    assert_eq!(ctx.bids_subject.as_str(), "override01");
    assert_eq!(ctx.bids_session.as_str(), "W2");
    assert_eq!(ctx.subjects, vec!["S1".to_string()]);
    assert_eq!(ctx.sessions, vec!["V1".to_string()]);
}

#[test]
fn filter_scope_flag_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let path = write_context(root, r#"{"apply-acq-run-filters": false, "BIDS-acq": "3dspiral"}"#);
    let gear = GearContext::load(&path).unwrap();
    let platform = MockPlatform::with_chain();

    let ctx = RunContext::resolve(
        &gear,
        &platform,
        root.join("output"),
        &PathOverrides::default(),
    )
    .unwrap();

    assert!(!ctx.apply_acq_run_filters);
    assert_eq!(ctx.bids_acq.as_deref(), Some("3dspiral"));
}

#[test]
fn missing_project_parent_is_typed() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let path = write_context(root, "{}");
    let gear = GearContext::load(&path).unwrap();

    let mut platform = MockPlatform::with_chain();
    let analysis = platform.containers.get_mut(ANALYSIS_ID).unwrap();
    analysis.parents.clear();

    let err = RunContext::resolve(
        &gear,
        &platform,
        root.join("output"),
        &PathOverrides::default(),
    )
    .unwrap_err();

    assert_matches!(err, GearError::MissingParent { kind, .. } if kind == "project");
}

#[test]
fn invalid_destination_id_is_typed() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let path = root.join("config.json");
    fs::write(
        path.as_std_path(),
        r#"{"destination": {"id": "not-hex", "type": "analysis"}}"#,
    )
    .unwrap();
    let gear = GearContext::load(&path).unwrap();
    let platform = MockPlatform::with_chain();

    let err = RunContext::resolve(
        &gear,
        &platform,
        root.join("output"),
        &PathOverrides::default(),
    )
    .unwrap_err();

    assert_matches!(err, GearError::InvalidAnalysisId(_));
}

#[test]
fn path_overrides_replace_the_container_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let path = write_context(root, "{}");
    let gear = GearContext::load(&path).unwrap();
    let platform = MockPlatform::with_chain();

    let overrides = PathOverrides {
        input_root: Some(root.join("input")),
        code_dir: Some(root.join("code")),
        mcr_root: Some(root.join("mcr")),
        pipeline_output_dir: Some(root.join("pipeline_out")),
    };
    let ctx = RunContext::resolve(&gear, &platform, root.join("output"), &overrides).unwrap();

    assert_eq!(ctx.paths.input_root, root.join("input"));
    assert_eq!(ctx.paths.code_dir, root.join("code"));
    assert_eq!(ctx.paths.mcr_root, root.join("mcr"));
    assert_eq!(ctx.paths.pipeline_output_dir, root.join("pipeline_out"));
}
