//! Canonical gene call record and the strand-aware comparison rule.
//!
//! Two calls are the same gene when they sit on the same strand and share the
//! fixed endpoint: the stop coordinate for forward calls, the start coordinate
//! for reverse calls. Tools routinely disagree on the other boundary.

use crate::error::{GeneError, Result};
use crate::types::SourceKind;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Markers tools put on a coordinate that runs off the sequence edge.
const TRUNCATION_MARKERS: [&str; 4] = ["&lt;", "&gt;", "<", ">"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn symbol(&self) -> char {
        match self {
            Direction::Forward => '+',
            Direction::Reverse => '-',
        }
    }
}

impl FromStr for Direction {
    type Err = GeneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+" => Ok(Direction::Forward),
            "-" => Ok(Direction::Reverse),
            other => Err(GeneError::Validation(format!(
                "direction must be + or -, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A single gene call from one source. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawGene")]
pub struct Gene {
    start: u64,
    stop: u64,
    direction: Direction,
    source: SourceKind,
    #[serde(default)]
    start_approximate: bool,
    #[serde(default)]
    stop_approximate: bool,
}

/// Wire shape of a stored gene; checked through `Gene::new` on the way in.
#[derive(Deserialize)]
struct RawGene {
    start: u64,
    stop: u64,
    direction: Direction,
    source: SourceKind,
    #[serde(default)]
    start_approximate: bool,
    #[serde(default)]
    stop_approximate: bool,
}

impl TryFrom<RawGene> for Gene {
    type Error = GeneError;

    fn try_from(raw: RawGene) -> Result<Self> {
        let mut gene = Gene::new(raw.start, raw.stop, raw.direction, raw.source)?;
        gene.start_approximate = raw.start_approximate;
        gene.stop_approximate = raw.stop_approximate;
        Ok(gene)
    }
}

impl Gene {
    pub fn new(start: u64, stop: u64, direction: Direction, source: SourceKind) -> Result<Self> {
        if stop < start {
            return Err(GeneError::Validation(format!(
                "stop {} precedes start {}",
                stop, start
            )));
        }
        Ok(Self {
            start,
            stop,
            direction,
            source,
            start_approximate: false,
            stop_approximate: false,
        })
    }

    /// Builds a gene from raw text tokens as they appear in tool output.
    /// Boundary tokens such as `<3` or `&gt;1200` keep their coordinate and
    /// are flagged approximate.
    pub fn from_tokens(start: &str, stop: &str, direction: &str, source: SourceKind) -> Result<Self> {
        let direction: Direction = direction.parse()?;
        let (start, start_approximate) = parse_boundary(start)?;
        let (stop, stop_approximate) = parse_boundary(stop)?;
        let mut gene = Self::new(start, stop, direction, source)?;
        gene.start_approximate = start_approximate;
        gene.stop_approximate = stop_approximate;
        Ok(gene)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn stop(&self) -> u64 {
        self.stop
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn start_approximate(&self) -> bool {
        self.start_approximate
    }

    pub fn stop_approximate(&self) -> bool {
        self.stop_approximate
    }

    pub fn length(&self) -> u64 {
        (self.stop - self.start).saturating_add(1)
    }

    /// The boundary that identifies the call: stop for forward, start for reverse.
    pub fn fixed_end(&self) -> u64 {
        match self.direction {
            Direction::Forward => self.stop,
            Direction::Reverse => self.start,
        }
    }

    /// Whether two calls represent the same gene.
    pub fn same_call(&self, other: &Gene) -> bool {
        self.direction == other.direction && self.fixed_end() == other.fixed_end()
    }

    /// Exact coordinates, ignoring the source.
    pub fn coords(&self) -> (Direction, u64, u64) {
        (self.direction, self.start, self.stop)
    }
}

/// Equality follows `same_call`, so genes differing on the variable
/// boundary compare equal.
impl PartialEq for Gene {
    fn eq(&self, other: &Self) -> bool {
        self.same_call(other)
    }
}

/// Sort key for laying all calls out along the sequence regardless of strand.
pub fn sort_key(gene: &Gene) -> u64 {
    gene.fixed_end()
}

/// Ordering by fixed endpoint. Calls on opposite strands can share an
/// endpoint, so strand breaks the tie to keep equal calls adjacent.
pub fn cmp_by_fixed_end(a: &Gene, b: &Gene) -> Ordering {
    sort_key(a)
        .cmp(&sort_key(b))
        .then_with(|| a.direction.cmp(&b.direction))
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}{}, {}{})",
            self.direction,
            if self.start_approximate { "<" } else { "" },
            self.start,
            if self.stop_approximate { ">" } else { "" },
            self.stop
        )
    }
}

/// Splits a truncation marker off a coordinate token.
fn parse_boundary(token: &str) -> Result<(u64, bool)> {
    let trimmed = token.trim();
    let mut rest = trimmed;
    let mut approximate = false;
    while let Some(marker) = TRUNCATION_MARKERS.iter().find(|m| rest.starts_with(**m)) {
        rest = &rest[marker.len()..];
        approximate = true;
    }
    let value = rest
        .parse::<u64>()
        .map_err(|_| GeneError::Validation(format!("invalid coordinate '{}'", trimmed)))?;
    Ok((value, approximate))
}
