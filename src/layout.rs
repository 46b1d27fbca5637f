use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use crate::context::RunContext;
use crate::error::GearError;
use crate::fs_util;

pub const NIFTI_EXTENSIONS: [&str; 2] = [".nii", ".nii.gz"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsEntry {
    pub path: Utf8PathBuf,
    pub subject: String,
    pub session: Option<String>,
    pub acquisition: Option<String>,
    pub run: Option<String>,
    pub suffix: String,
    pub extension: String,
}

#[derive(Debug, Default)]
pub struct BidsLayout {
    entries: Vec<BidsEntry>,
}

impl BidsLayout {
    pub fn index(root: &Utf8Path) -> Result<Self, GearError> {
        let name_re = Regex::new(
            r"^sub-([A-Za-z0-9]+)(?:_ses-([A-Za-z0-9]+))?(?:_acq-([A-Za-z0-9]+))?(?:_run-([A-Za-z0-9]+))?_([A-Za-z0-9]+)(\.nii(?:\.gz)?)$",
        )
        .unwrap();

        let mut entries = Vec::new();
        for path in fs_util::walk_files(root)? {
            let Some(name) = path.file_name() else {
                continue;
            };
            let Some(captures) = name_re.captures(name) else {
                continue;
            };
            entries.push(BidsEntry {
                subject: captures[1].to_string(),
                session: captures.get(2).map(|m| m.as_str().to_string()),
                acquisition: captures.get(3).map(|m| m.as_str().to_string()),
                run: captures.get(4).map(|m| m.as_str().to_string()),
                suffix: captures[5].to_string(),
                extension: captures[6].to_string(),
                path,
            });
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn query(
        &self,
        suffix: &str,
        extensions: &[&str],
        filter: &SelectionFilter,
    ) -> Vec<&BidsEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                entry.suffix == suffix
                    && extensions.contains(&entry.extension.as_str())
                    && filter.matches(entry)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SelectionFilter {
    pub subject: String,
    pub session: String,
    pub acquisition: Option<String>,
    pub run: Option<String>,
}

impl SelectionFilter {
    pub fn from_context(ctx: &RunContext) -> Self {
        let (acquisition, run) = if ctx.apply_acq_run_filters {
            (ctx.bids_acq.clone(), ctx.bids_run.clone())
        } else {
            (None, None)
        };
        Self {
            subject: ctx.bids_subject.as_str().to_string(),
            session: ctx.bids_session.as_str().to_string(),
            acquisition,
            run,
        }
    }

    pub fn matches(&self, entry: &BidsEntry) -> bool {
        if entry.subject != self.subject {
            return false;
        }
        if entry.session.as_deref() != Some(self.session.as_str()) {
            return false;
        }
        if let Some(acquisition) = &self.acquisition {
            if entry.acquisition.as_deref() != Some(acquisition.as_str()) {
                return false;
            }
        }
        if let Some(run) = &self.run {
            let matched = entry
                .run
                .as_deref()
                .is_some_and(|value| normalize_run(value) == normalize_run(run));
            if !matched {
                return false;
            }
        }
        true
    }
}

fn normalize_run(value: &str) -> &str {
    let trimmed = value.trim_start_matches('0');
    if trimmed.is_empty() { "0" } else { trimmed }
}
