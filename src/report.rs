//! Read-only projections of a finished run: the consensus table, the raw
//! calls per source and the failure summary.

use crate::consensus::{AgreementDenominator, ConsensusGroup};
use crate::error::Result;
use crate::gene::{Direction, Gene};
use crate::pipeline::RunOutcome;
use crate::storage::SourceFailure;
use crate::types::SourceKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// One consensus group with each source's own call for it.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub direction: Direction,
    pub start: u64,
    pub stop: u64,
    pub start_approximate: bool,
    pub stop_approximate: bool,
    pub length: u64,
    pub call_count: usize,
    pub all_agree: bool,
    pub unique_to_one: bool,
    pub calls: BTreeMap<SourceKind, Vec<(u64, u64)>>,
}

impl ReportRow {
    fn from_group(group: &ConsensusGroup) -> Self {
        let rep = &group.representative;
        let calls = group
            .sources()
            .into_iter()
            .map(|source| {
                let spans = group.calls_from(source).map(|g| (g.start(), g.stop())).collect();
                (source, spans)
            })
            .collect();
        Self {
            direction: rep.direction(),
            start: rep.start(),
            stop: rep.stop(),
            start_approximate: rep.start_approximate(),
            stop_approximate: rep.stop_approximate(),
            length: rep.length(),
            call_count: group.call_count,
            all_agree: group.all_agree,
            unique_to_one: group.unique_to_one,
            calls,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsensusReport {
    pub run_id: Uuid,
    pub sequence_name: String,
    pub agreement: AgreementDenominator,
    pub sources: Vec<SourceKind>,
    pub rows: Vec<ReportRow>,
    pub calls_by_source: BTreeMap<SourceKind, Vec<Gene>>,
    pub failures: Vec<SourceFailure>,
}

impl ConsensusReport {
    pub fn build(outcome: &RunOutcome, groups: &[ConsensusGroup], agreement: AgreementDenominator) -> Self {
        let calls_by_source = outcome
            .results()
            .iter()
            .filter(|(_, result)| result.is_success())
            .map(|(source, result)| (*source, result.genes().to_vec()))
            .collect();
        Self {
            run_id: outcome.run_id(),
            sequence_name: outcome.sequence_name().to_string(),
            agreement,
            sources: outcome.enabled_sources().to_vec(),
            rows: groups.iter().map(ReportRow::from_group).collect(),
            calls_by_source,
            failures: outcome.failures(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Tab-separated table, one row per group, one column per source.
    pub fn write_text(&self, out: &mut impl Write) -> Result<()> {
        write!(out, "strand\tstart\tstop\tlength\tcalls\tagree")?;
        for source in &self.sources {
            write!(out, "\t{}", source)?;
        }
        writeln!(out)?;

        for row in &self.rows {
            let agree = if row.all_agree {
                "all"
            } else if row.unique_to_one {
                "unique"
            } else {
                ""
            };
            write!(
                out,
                "{}\t{}{}\t{}{}\t{}\t{}\t{}",
                row.direction,
                if row.start_approximate { "<" } else { "" },
                row.start,
                if row.stop_approximate { ">" } else { "" },
                row.stop,
                row.length,
                row.call_count,
                agree
            )?;
            for source in &self.sources {
                match row.calls.get(source) {
                    Some(spans) if !spans.is_empty() => {
                        let spans: Vec<String> = spans.iter().map(|(start, stop)| format!("{}..{}", start, stop)).collect();
                        write!(out, "\t{}", spans.join(","))?;
                    }
                    _ => write!(out, "\t-")?,
                }
            }
            writeln!(out)?;
        }

        if !self.failures.is_empty() {
            writeln!(out)?;
            writeln!(out, "# failed sources")?;
            for failure in &self.failures {
                writeln!(out, "# {}\t{}\t{}", failure.source, failure.kind, failure.message)?;
            }
        }
        Ok(())
    }

    /// GenBank-style feature block with a gene and CDS entry per representative.
    pub fn write_feature_table(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "FEATURES             Location/Qualifiers")?;
        for (idx, row) in self.rows.iter().enumerate() {
            let span = format!(
                "{}{}..{}{}",
                if row.start_approximate { "<" } else { "" },
                row.start,
                if row.stop_approximate { ">" } else { "" },
                row.stop
            );
            let location = match row.direction {
                Direction::Forward => span,
                Direction::Reverse => format!("complement({})", span),
            };
            for feature in ["gene", "CDS"] {
                writeln!(out, "     {:<16}{}", feature, location)?;
                writeln!(out, "                     /gene=\"{}\"", idx + 1)?;
            }
        }
        writeln!(out, "//")?;
        Ok(())
    }
}

/// Destination for a finished report.
pub trait ReportSink {
    fn write(&self, report: &ConsensusReport) -> Result<()>;
}

/// Writes the report as pretty JSON, creating parent directories.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonFileSink {
    fn write(&self, report: &ConsensusReport) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, report.to_json()?)?;
        info!("Wrote report for {} to {}", report.sequence_name, self.path.display());
        Ok(())
    }
}

/// Writes the text table to stdout.
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn write(&self, report: &ConsensusReport) -> Result<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        report.write_text(&mut lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::storage::SavedRun;
    use chrono::Utc;
    use tempfile::tempdir;

    fn outcome() -> RunOutcome {
        let fwd = |start, stop, source| Gene::new(start, stop, Direction::Forward, source).unwrap();
        let saved = SavedRun {
            run_id: Uuid::new_v4(),
            saved_at: Utc::now(),
            sequence_name: "phage".into(),
            sequence_sha256: String::new(),
            config: Config::default(),
            enabled_sources: vec![SourceKind::Glimmer, SourceKind::GeneMark, SourceKind::Prodigal],
            gene_calls: BTreeMap::from([
                (SourceKind::Glimmer, vec![fwd(10, 100, SourceKind::Glimmer)]),
                (
                    SourceKind::GeneMark,
                    vec![fwd(10, 100, SourceKind::GeneMark), fwd(400, 900, SourceKind::GeneMark)],
                ),
            ]),
            failures: vec![SourceFailure {
                source: SourceKind::Prodigal,
                kind: ErrorKind::Config,
                message: "cannot start prodigal".into(),
            }],
        };
        RunOutcome::from_saved_run(&saved)
    }

    fn report() -> ConsensusReport {
        let outcome = outcome();
        let groups = outcome.consensus(AgreementDenominator::Succeeded);
        ConsensusReport::build(&outcome, &groups, AgreementDenominator::Succeeded)
    }

    #[test]
    fn test_rows_follow_groups() {
        let report = report();
        assert_eq!(report.rows.len(), 2);
        assert!(report.rows[0].all_agree);
        assert_eq!(report.rows[0].calls.len(), 2);
        assert!(report.rows[1].unique_to_one);
        assert_eq!(report.calls_by_source.len(), 2);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_text_table_lists_failures() {
        let mut buf = Vec::new();
        report().write_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "strand\tstart\tstop\tlength\tcalls\tagree\tglimmer\tgm\tprodigal");
        assert_eq!(lines[1], "+\t10\t100\t91\t2\tall\t10..100\t10..100\t-");
        assert!(text.contains("# prodigal\tconfig\tcannot start prodigal"));
    }

    #[test]
    fn test_repeated_calls_from_one_source_all_listed() {
        let fwd = |start, stop, source| Gene::new(start, stop, Direction::Forward, source).unwrap();
        let saved = SavedRun {
            run_id: Uuid::new_v4(),
            saved_at: Utc::now(),
            sequence_name: "phage".into(),
            sequence_sha256: String::new(),
            config: Config::default(),
            enabled_sources: vec![SourceKind::Glimmer, SourceKind::GeneMark],
            gene_calls: BTreeMap::from([
                (
                    SourceKind::Glimmer,
                    vec![fwd(10, 100, SourceKind::Glimmer), fwd(40, 100, SourceKind::Glimmer)],
                ),
                (SourceKind::GeneMark, vec![fwd(700, 900, SourceKind::GeneMark)]),
            ]),
            failures: vec![],
        };
        let outcome = RunOutcome::from_saved_run(&saved);
        let groups = outcome.consensus(AgreementDenominator::Succeeded);
        let report = ConsensusReport::build(&outcome, &groups, AgreementDenominator::Succeeded);

        assert_eq!(report.rows[0].calls[&SourceKind::Glimmer], vec![(10, 100), (40, 100)]);
        assert!(!report.rows[0].all_agree);

        let mut buf = Vec::new();
        report.write_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().nth(1), Some("+\t10\t100\t91\t2\tunique\t10..100,40..100\t-"));
    }

    #[test]
    fn test_feature_table() {
        let mut buf = Vec::new();
        report().write_feature_table(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("FEATURES"));
        assert!(text.contains("     CDS             10..100\n"));
        assert!(text.trim_end().ends_with("//"));
    }

    #[test]
    fn test_json_sink_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("phage.json");
        JsonFileSink::new(&path).write(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["sequence_name"], "phage");
        assert_eq!(value["rows"].as_array().unwrap().len(), 2);
        assert_eq!(value["failures"][0]["source"], "prodigal");
    }
}
