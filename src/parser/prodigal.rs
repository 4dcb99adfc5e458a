use super::{table_rows, GeneParser};
use crate::error::Result;
use crate::gene::Gene;
use crate::types::SourceKind;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static CDS_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(complement\()?([<>]?\d+)\.\.([<>]?\d+)\)?$").expect("valid CDS location pattern")
});

/// Prodigal's default GenBank-style output. Only `CDS` feature lines carry
/// coordinates; qualifier lines are skipped.
pub struct ProdigalParser;

impl GeneParser for ProdigalParser {
    fn source(&self) -> SourceKind {
        SourceKind::Prodigal
    }

    fn parse(&self, text: &str) -> Result<Vec<Gene>> {
        debug!("ProdigalParser: start text_len={}", text.len());
        let source = self.source();
        let rows = table_rows(source, text, |l| l.starts_with("FEATURES"), 0)?;

        let mut genes = Vec::new();
        for row in &rows {
            let cols = row.columns();
            if cols.first() != Some(&"CDS") {
                continue;
            }
            let location = cols.get(1).copied().unwrap_or("");
            let caps = CDS_LOCATION
                .captures(location)
                .ok_or_else(|| row.invalid(source, format!("unrecognized CDS location '{}'", location)))?;
            let direction = if caps.get(1).is_some() { "-" } else { "+" };
            let gene = Gene::from_tokens(&caps[2], &caps[3], direction, source)
                .map_err(|e| row.locate(source, e))?;
            genes.push(gene);
        }
        info!("ProdigalParser: parsed {} genes", genes.len());
        Ok(genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneError;
    use crate::gene::Direction;

    const OUTPUT: &str = r#"DEFINITION  seqnum=1;seqlen=40000;seqhdr="phage";version=Prodigal.v2.6.3
FEATURES             Location/Qualifiers
     CDS             <2..451
                     /note="ID=1_1;partial=10;start_type=Edge"
     CDS             complement(500..1310)
                     /note="ID=1_2;partial=00;start_type=ATG"
     CDS             1400..>1999
                     /note="ID=1_3;partial=01;start_type=GTG"
//
"#;

    #[test]
    fn test_parses_cds_lines() {
        let genes = ProdigalParser.parse(OUTPUT).unwrap();
        assert_eq!(genes.len(), 3);
        assert_eq!(genes[0].coords(), (Direction::Forward, 2, 451));
        assert!(genes[0].start_approximate());
        assert_eq!(genes[1].coords(), (Direction::Reverse, 500, 1310));
        assert!(genes[2].stop_approximate());
    }

    #[test]
    fn test_missing_features_block() {
        let err = ProdigalParser.parse("Error: can't open input file").unwrap_err();
        assert!(matches!(err, GeneError::Format { .. }));
    }

    #[test]
    fn test_malformed_location() {
        let text = "FEATURES             Location/Qualifiers\n     CDS             join(1..3,5..9)\n";
        assert!(matches!(ProdigalParser.parse(text), Err(GeneError::Validation(_))));
    }
}
