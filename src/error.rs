use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::Modality;

#[derive(Debug, Error, Diagnostic)]
pub enum GearError {
    #[error("missing gear context file at {0}")]
    MissingContext(Utf8PathBuf),

    #[error("failed to read gear context file at {0}")]
    ContextRead(Utf8PathBuf),

    #[error("failed to parse gear context: {0}")]
    ContextParse(String),

    #[error("missing required gear input: {0}")]
    MissingInput(String),

    #[error("malformed api key: expected <host>:<token>")]
    InvalidApiKey,

    #[error("invalid analysis id: {0}")]
    InvalidAnalysisId(String),

    #[error("invalid BIDS label: {0}")]
    InvalidLabel(String),

    #[error("container {container} has no {kind} parent")]
    MissingParent { container: String, kind: String },

    #[error("project not found on platform: {0}")]
    ProjectNotFound(String),

    #[error("flywheel request failed: {0}")]
    FlywheelHttp(String),

    #[error("flywheel returned status {status}: {message}")]
    FlywheelStatus { status: u16, message: String },

    #[error("no BIDS files gathered for subject {subject} session {session} in project {project}")]
    EmptyManifest {
        project: String,
        subject: String,
        session: String,
    },

    #[error("BIDS path traversal detected for {name}: {path}")]
    PathTraversal { name: String, path: Utf8PathBuf },

    #[error("no {modality} files matched the BIDS filters")]
    NoMatches { modality: Modality },

    #[error("run script missing after write: {0}")]
    CommandWrite(Utf8PathBuf),

    #[error("failed to launch pipeline executable: {0}")]
    Launch(String),

    #[error("pipeline executable exited with status {status}")]
    Execution { status: i32 },

    #[error("pipeline output collection failed: {0}")]
    Collection(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
