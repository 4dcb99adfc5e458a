use crate::constants;
use crate::error::{ErrorKind, GeneError, Result};
use crate::gene::Gene;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Every gene prediction tool the engine knows how to query and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "glimmer")]
    Glimmer,
    #[serde(rename = "gm")]
    GeneMark,
    #[serde(rename = "hmm")]
    GeneMarkHmm,
    #[serde(rename = "gms")]
    GeneMarkS,
    #[serde(rename = "heuristic")]
    GeneMarkHeuristic,
    #[serde(rename = "gms2")]
    GeneMarkS2,
    #[serde(rename = "prodigal")]
    Prodigal,
    #[serde(rename = "rast")]
    Rast,
}

impl SourceKind {
    pub const ALL: [SourceKind; 8] = [
        SourceKind::Glimmer,
        SourceKind::GeneMark,
        SourceKind::GeneMarkHmm,
        SourceKind::GeneMarkS,
        SourceKind::GeneMarkHeuristic,
        SourceKind::GeneMarkS2,
        SourceKind::Prodigal,
        SourceKind::Rast,
    ];

    /// Short label used in configuration files, saved runs and reports
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Glimmer => constants::GLIMMER_LABEL,
            SourceKind::GeneMark => constants::GENEMARK_LABEL,
            SourceKind::GeneMarkHmm => constants::GENEMARK_HMM_LABEL,
            SourceKind::GeneMarkS => constants::GENEMARK_S_LABEL,
            SourceKind::GeneMarkHeuristic => constants::GENEMARK_HEURISTIC_LABEL,
            SourceKind::GeneMarkS2 => constants::GENEMARK_S2_LABEL,
            SourceKind::Prodigal => constants::PRODIGAL_LABEL,
            SourceKind::Rast => constants::RAST_LABEL,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::Glimmer => "Glimmer",
            SourceKind::GeneMark => "GeneMark",
            SourceKind::GeneMarkHmm => "GeneMark.hmm",
            SourceKind::GeneMarkS => "GeneMarkS",
            SourceKind::GeneMarkHeuristic => "GeneMark Heuristic",
            SourceKind::GeneMarkS2 => "GeneMarkS-2",
            SourceKind::Prodigal => "Prodigal",
            SourceKind::Rast => "RAST",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourceKind {
    type Err = GeneError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        SourceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.label() == wanted)
            .ok_or_else(|| {
                GeneError::Config(format!(
                    "unknown source '{}' (supported: {})",
                    s,
                    get_supported_sources().join(", ")
                ))
            })
    }
}

/// Get all supported source labels
pub fn get_supported_sources() -> Vec<&'static str> {
    SourceKind::ALL.iter().map(|k| k.label()).collect()
}

/// Terminal outcome of one source's query task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { genes: Vec<Gene> },
    Failure { kind: ErrorKind, message: String },
}

impl ToolResult {
    pub fn failure(err: &GeneError) -> Self {
        ToolResult::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    pub fn genes(&self) -> &[Gene] {
        match self {
            ToolResult::Success { genes } => genes,
            ToolResult::Failure { .. } => &[],
        }
    }
}

impl From<Result<Vec<Gene>>> for ToolResult {
    fn from(result: Result<Vec<Gene>>) -> Self {
        match result {
            Ok(genes) => ToolResult::Success { genes },
            Err(e) => ToolResult::failure(&e),
        }
    }
}

/// A DNA sequence submitted for prediction, kept as the raw FASTA bytes the
/// services expect.
#[derive(Debug, Clone)]
pub struct SequenceInput {
    pub name: String,
    pub fasta: Vec<u8>,
}

impl SequenceInput {
    pub fn new(name: impl Into<String>, fasta: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            fasta: fasta.into(),
        }
    }

    /// Reads a FASTA file; the sequence name is the file stem.
    pub fn from_fasta_file(path: &Path) -> Result<Self> {
        let fasta = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| GeneError::Config(format!("invalid sequence path {}", path.display())))?
            .to_string();
        Ok(Self { name, fasta })
    }

    /// Nucleotides only: header lines and whitespace removed, upper-cased.
    pub fn residues(&self) -> String {
        String::from_utf8_lossy(&self.fasta)
            .lines()
            .filter(|line| !line.starts_with('>'))
            .flat_map(|line| line.chars())
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    /// Hex SHA-256 of the residues, used to check a saved run against its sequence.
    pub fn fingerprint(&self) -> String {
        let mut h = Sha256::new();
        h.update(self.residues().as_bytes());
        hex::encode(h.finalize())
    }
}
