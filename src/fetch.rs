use std::fs;

use serde::Serialize;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::error::GearError;
use crate::flywheel::FlywheelClient;
use crate::fs_util;

pub const DOWNLOAD_FOLDERS: [&str; 2] = ["perf", "anat"];
pub const DOWNLOAD_SUMMARY_NAME: &str = "bids_download.json";

#[derive(Debug, Serialize)]
pub struct DownloadSummary {
    pub project: String,
    pub gathered: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub downloaded_at: String,
    pub tool: String,
}

pub fn download_bids<F: FlywheelClient>(
    client: &F,
    ctx: &RunContext,
    dry_run: bool,
) -> Result<DownloadSummary, GearError> {
    if !dry_run {
        fs_util::ensure_dir(&ctx.paths.output_root)?;
    }

    let manifest = client.gather_bids(&ctx.project_label, &ctx.subjects, &ctx.sessions)?;
    if manifest.is_empty() {
        return Err(GearError::EmptyManifest {
            project: ctx.project_label.clone(),
            subject: ctx.subject_label.clone(),
            session: ctx.session_label.clone(),
        });
    }
    info!(
        "gathered {} BIDS files for {}/{}/{}",
        manifest.len(),
        ctx.project_label,
        ctx.subject_label,
        ctx.session_label
    );

    let mut downloaded = 0;
    let mut skipped = 0;
    for entry in &manifest {
        if !DOWNLOAD_FOLDERS.contains(&entry.folder.as_str()) {
            debug!("skipping {} (folder {})", entry.bids_name, entry.folder);
            skipped += 1;
            continue;
        }
        let relative = entry.bids_path.join(&entry.bids_name);
        let target = match fs_util::enclosed_join(&ctx.paths.bids_root, &relative) {
            Some(target) => target,
            None => {
                return Err(GearError::PathTraversal {
                    name: entry.bids_name.clone(),
                    path: relative,
                });
            }
        };
        if dry_run {
            info!("would download {} -> {target}", entry.file_name);
            continue;
        }
        if let Some(parent) = target.parent() {
            fs_util::ensure_dir(parent)?;
        }
        client.download_file(entry, target.as_std_path())?;
        debug!("downloaded {} -> {target}", entry.file_name);
        downloaded += 1;
    }

    let summary = DownloadSummary {
        project: ctx.project_label.clone(),
        gathered: manifest.len(),
        downloaded,
        skipped,
        downloaded_at: chrono::Utc::now().to_rfc3339(),
        tool: format!("vcid-asl-gear/{}", env!("CARGO_PKG_VERSION")),
    };
    if !dry_run {
        write_summary(ctx, &summary)?;
        info!(
            "downloaded {downloaded} files into {} ({skipped} skipped)",
            ctx.paths.bids_root
        );
    }
    Ok(summary)
}

fn write_summary(ctx: &RunContext, summary: &DownloadSummary) -> Result<(), GearError> {
    let path = ctx.paths.output_root.join(DOWNLOAD_SUMMARY_NAME);
    let body = serde_json::to_string_pretty(summary)
        .map_err(|err| GearError::Filesystem(err.to_string()))?;
    fs::write(path.as_std_path(), body).map_err(|err| GearError::Filesystem(err.to_string()))
}
