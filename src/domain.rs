use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GearError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Asl,
    M0,
    Mprage,
}

impl Modality {
    pub fn suffix(&self) -> &'static str {
        match self {
            Modality::Asl => "asl",
            Modality::M0 => "m0",
            Modality::Mprage => "T1w",
        }
    }

    pub fn canonical_filename(&self) -> &'static str {
        match self {
            Modality::Asl => "ASL.nii.gz",
            Modality::M0 => "M0.nii.gz",
            Modality::Mprage => "MPRAGE.nii.gz",
        }
    }

    pub fn numbered_dir(&self, index: usize) -> String {
        match self {
            Modality::Asl => format!("ASL_0{index}"),
            Modality::M0 => format!("M0_0{index}"),
            Modality::Mprage => "MPRAGE".to_string(),
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Asl => write!(f, "ASL"),
            Modality::M0 => write!(f, "M0"),
            Modality::Mprage => write!(f, "MPRAGE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(String);

impl AnalysisId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AnalysisId {
    type Err = GearError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid =
            normalized.len() == 24 && normalized.chars().all(|ch| ch.is_ascii_hexdigit());
        if !is_valid {
            return Err(GearError::InvalidAnalysisId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidsLabel(String);

impl BidsLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BidsLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BidsLabel {
    type Err = GearError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let stripped = trimmed
            .strip_prefix("sub-")
            .or_else(|| trimmed.strip_prefix("ses-"))
            .unwrap_or(trimmed);
        let is_valid =
            !stripped.is_empty() && stripped.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(GearError::InvalidLabel(value.to_string()));
        }
        Ok(Self(stripped.to_string()))
    }
}
