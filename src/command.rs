use std::fs;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::context::GearPaths;
use crate::error::GearError;
use crate::fs_util;

pub const ANALYSIS_SCRIPT_NAME: &str = "run_full_analysis.sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
    pub program: Utf8PathBuf,
    pub args: Vec<String>,
}

impl RunCommand {
    pub fn full_analysis(paths: &GearPaths) -> Self {
        Self {
            program: paths.code_dir.join(ANALYSIS_SCRIPT_NAME),
            args: vec![paths.mcr_root.to_string(), paths.output_dir.to_string()],
        }
    }

    pub fn env_bootstrap(script: &Utf8Path) -> Self {
        Self {
            program: Utf8PathBuf::from("bash"),
            args: vec!["-x".to_string(), script.to_string()],
        }
    }

    pub fn shell_line(&self) -> String {
        let mut line = shell_quote(self.program.as_str());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }
}

fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=+".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

pub fn write_run_script(path: &Utf8Path, command: &RunCommand) -> Result<(), GearError> {
    if let Some(parent) = path.parent() {
        fs_util::ensure_dir(parent)?;
    }
    let line = command.shell_line();
    info!("run command: {line}");
    fs::write(path.as_std_path(), format!("{line}\n"))
        .map_err(|_| GearError::CommandWrite(path.to_path_buf()))?;
    if !path.as_std_path().exists() {
        return Err(GearError::CommandWrite(path.to_path_buf()));
    }
    Ok(())
}

pub trait Executor {
    fn run(&self, command: &RunCommand) -> Result<i32, GearError>;
}

pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, command: &RunCommand) -> Result<i32, GearError> {
        let status = Command::new(command.program.as_std_path())
            .args(&command.args)
            .status()
            .map_err(|err| GearError::Launch(err.to_string()))?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;
    use crate::context::{GearPaths, PathOverrides};
    use crate::domain::AnalysisId;

    fn paths() -> GearPaths {
        let analysis_id: AnalysisId = "5eb4f2c1a9d0e8b7c6a5f4d3".parse().unwrap();
        GearPaths::resolve(
            Utf8PathBuf::from("/flywheel/v0/output"),
            &analysis_id,
            &PathOverrides::default(),
        )
    }

    #[test]
    fn full_analysis_orders_mcr_root_before_output_dir() {
        let command = RunCommand::full_analysis(&paths());
        assert_eq!(
            command.program.as_str(),
            "/flywheel/v0/app/for_redistribution_files_only/run_full_analysis.sh"
        );
        assert_eq!(command.args, vec!["/opt/mcr/v99", "/flywheel/v0/output"]);
    }

    #[test]
    fn shell_line_quotes_only_unsafe_tokens() {
        let command = RunCommand {
            program: Utf8PathBuf::from("/opt/app/run.sh"),
            args: vec!["plain".to_string(), "has space".to_string(), "don't".to_string()],
        };
        assert_eq!(
            command.shell_line(),
            r#"/opt/app/run.sh plain 'has space' 'don'\''t'"#
        );
    }

    #[test]
    fn env_bootstrap_traces_the_script() {
        let command = RunCommand::env_bootstrap(Utf8Path::new("/flywheel/v0/docker-env.sh"));
        assert_eq!(command.program.as_str(), "bash");
        assert_eq!(command.args, vec!["-x", "/flywheel/v0/docker-env.sh"]);
    }

    #[test]
    fn write_run_script_persists_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let script = root.join("scripts").join("vcid_run.sh");
        let command = RunCommand::full_analysis(&paths());

        write_run_script(&script, &command).unwrap();

        let written = std::fs::read_to_string(script.as_std_path()).unwrap();
        assert_eq!(
            written,
            "/flywheel/v0/app/for_redistribution_files_only/run_full_analysis.sh /opt/mcr/v99 /flywheel/v0/output\n"
        );
    }

    #[test]
    fn system_executor_reports_exit_status() {
        let command = RunCommand {
            program: Utf8PathBuf::from("sh"),
            args: vec!["-c".to_string(), "exit 3".to_string()],
        };
        assert_eq!(SystemExecutor.run(&command).unwrap(), 3);

        let ok = RunCommand {
            program: Utf8PathBuf::from("sh"),
            args: vec!["-c".to_string(), "true".to_string()],
        };
        assert_eq!(SystemExecutor.run(&ok).unwrap(), 0);
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let command = RunCommand {
            program: Utf8PathBuf::from("/definitely/not/here"),
            args: Vec::new(),
        };
        assert!(matches!(
            SystemExecutor.run(&command),
            Err(GearError::Launch(_))
        ));
    }
}
