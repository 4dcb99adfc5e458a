//! Reduces the union of every source's calls into consensus groups.
//!
//! Calls are sorted by fixed endpoint, so all calls for the same gene end up
//! adjacent and a single scan splits them into groups. Within a group the
//! most frequently called exact interval wins, with the longer interval
//! breaking ties and the first one seen breaking any remaining tie.

use crate::gene::{cmp_by_fixed_end, Direction, Gene};
use crate::types::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Which sources count towards "every tool agrees".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementDenominator {
    /// Only sources that returned a result. A failed tool cannot veto agreement.
    #[default]
    Succeeded,
    /// Every source enabled for the run, failed or not.
    Enabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsensusGroup {
    pub representative: Gene,
    pub members: Vec<Gene>,
    pub call_count: usize,
    /// Distinct sources among the members; the agreement flags count these.
    pub source_count: usize,
    pub all_agree: bool,
    pub unique_to_one: bool,
}

impl ConsensusGroup {
    pub fn direction(&self) -> Direction {
        self.representative.direction()
    }

    pub fn fixed_end(&self) -> u64 {
        self.representative.fixed_end()
    }

    /// Sources with at least one call in this group, in member order.
    pub fn sources(&self) -> Vec<SourceKind> {
        let mut sources: Vec<SourceKind> = Vec::with_capacity(self.members.len());
        for member in &self.members {
            if !sources.contains(&member.source()) {
                sources.push(member.source());
            }
        }
        sources
    }

    /// Every call `source` made in this group, in member order.
    pub fn calls_from(&self, source: SourceKind) -> impl Iterator<Item = &Gene> + '_ {
        self.members.iter().filter(move |g| g.source() == source)
    }
}

/// Stable sort by fixed endpoint, then split into runs of equal calls.
pub fn group_calls(mut genes: Vec<Gene>) -> Vec<Vec<Gene>> {
    genes.sort_by(cmp_by_fixed_end);

    let mut groups: Vec<Vec<Gene>> = Vec::new();
    for gene in genes {
        match groups.last_mut() {
            Some(current) if current.last().is_some_and(|prev| prev.same_call(&gene)) => {
                current.push(gene)
            }
            _ => groups.push(vec![gene]),
        }
    }
    groups
}

/// Most frequent exact interval among the members; longer wins a frequency
/// tie, then the first encountered.
pub fn representative(members: &[Gene]) -> Option<Gene> {
    let mut counts: HashMap<(Direction, u64, u64), usize> = HashMap::new();
    let mut order: Vec<&Gene> = Vec::new();
    for gene in members {
        let count = counts.entry(gene.coords()).or_insert(0);
        if *count == 0 {
            order.push(gene);
        }
        *count += 1;
    }

    let mut best: Option<(&Gene, usize)> = None;
    for gene in order {
        let freq = counts[&gene.coords()];
        best = match best {
            None => Some((gene, freq)),
            Some((current, current_freq)) => {
                if freq > current_freq || (freq == current_freq && gene.length() > current.length()) {
                    Some((gene, freq))
                } else {
                    Some((current, current_freq))
                }
            }
        };
    }
    best.map(|(gene, _)| gene.clone())
}

/// Groups the calls and computes per-group statistics. `denominator` is the
/// number of sources a group needs to be called by for `all_agree`.
pub fn aggregate(genes: Vec<Gene>, denominator: usize) -> Vec<ConsensusGroup> {
    let total = genes.len();
    let groups: Vec<ConsensusGroup> = group_calls(genes)
        .into_iter()
        .filter_map(|members| {
            let representative = representative(&members)?;
            let call_count = members.len();
            let mut sources: Vec<SourceKind> = members.iter().map(|g| g.source()).collect();
            sources.sort();
            sources.dedup();
            let source_count = sources.len();
            Some(ConsensusGroup {
                representative,
                call_count,
                source_count,
                all_agree: denominator > 0 && source_count == denominator,
                unique_to_one: source_count == 1,
                members,
            })
        })
        .collect();
    debug!("aggregated {} calls into {} groups (denominator {})", total, groups.len(), denominator);
    groups
}

/// Keeps the groups whose call count satisfies `keep`, e.g. `|n| n >= 3`.
pub fn filter_groups(groups: Vec<ConsensusGroup>, keep: impl Fn(usize) -> bool) -> Vec<ConsensusGroup> {
    groups.into_iter().filter(|g| keep(g.call_count)).collect()
}
