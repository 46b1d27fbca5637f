use camino::Utf8PathBuf;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::domain::Modality;
use crate::error::GearError;
use crate::fs_util;
use crate::layout::{BidsLayout, NIFTI_EXTENSIONS, SelectionFilter};

#[derive(Debug)]
pub struct ConvertSummary {
    pub session_dir: Utf8PathBuf,
    pub asl: usize,
    pub m0: usize,
    pub mprage: usize,
}

pub fn convert_from_bids(
    layout: &BidsLayout,
    ctx: &RunContext,
) -> Result<ConvertSummary, GearError> {
    let filter = SelectionFilter::from_context(ctx);
    debug!(
        "selecting sub-{} ses-{} (acq {:?}, run {:?})",
        filter.subject, filter.session, filter.acquisition, filter.run
    );

    let asl = layout.query(Modality::Asl.suffix(), &NIFTI_EXTENSIONS, &filter);
    if asl.is_empty() {
        return Err(GearError::NoMatches { modality: Modality::Asl });
    }
    let m0 = layout.query(Modality::M0.suffix(), &NIFTI_EXTENSIONS, &filter);
    if m0.is_empty() {
        return Err(GearError::NoMatches { modality: Modality::M0 });
    }
    let mprage = layout.query(Modality::Mprage.suffix(), &NIFTI_EXTENSIONS, &filter);
    if mprage.is_empty() {
        return Err(GearError::NoMatches { modality: Modality::Mprage });
    }

    let session_dir = ctx
        .paths
        .input_root
        .join(ctx.bids_subject.as_str())
        .join(ctx.bids_session.as_str());

    for (index, entry) in asl.iter().enumerate() {
        let target_dir = session_dir.join(Modality::Asl.numbered_dir(index + 1));
        fs_util::ensure_dir(&target_dir)?;
        let target = target_dir.join(Modality::Asl.canonical_filename());
        fs_util::copy_file(&entry.path, &target)?;
        debug!("placed {} -> {target}", entry.path);
    }
    for (index, entry) in m0.iter().enumerate() {
        let target_dir = session_dir.join(Modality::M0.numbered_dir(index + 1));
        fs_util::ensure_dir(&target_dir)?;
        let target = target_dir.join(Modality::M0.canonical_filename());
        fs_util::copy_file(&entry.path, &target)?;
        debug!("placed {} -> {target}", entry.path);
    }

    let structural = mprage[0];
    let target_dir = session_dir.join(Modality::Mprage.numbered_dir(1));
    fs_util::ensure_dir(&target_dir)?;
    let target = target_dir.join(Modality::Mprage.canonical_filename());
    fs_util::copy_file(&structural.path, &target)?;
    debug!("placed {} -> {target}", structural.path);

    let summary = ConvertSummary {
        session_dir,
        asl: asl.len(),
        m0: m0.len(),
        mprage: 1,
    };
    info!(
        "converted {} ASL, {} M0 and {} MPRAGE volumes into {}",
        summary.asl, summary.m0, summary.mprage, summary.session_dir
    );
    Ok(summary)
}
