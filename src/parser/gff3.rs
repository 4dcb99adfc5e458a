use super::{table_rows, GeneParser};
use crate::error::Result;
use crate::gene::Gene;
use crate::types::SourceKind;
use tracing::{debug, info};

/// GFF3 annotation export, as returned by RAST. Only `CDS` features are gene calls.
pub struct Gff3Parser {
    source: SourceKind,
}

impl Gff3Parser {
    pub fn new(source: SourceKind) -> Self {
        Self { source }
    }
}

impl GeneParser for Gff3Parser {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn parse(&self, text: &str) -> Result<Vec<Gene>> {
        debug!("Gff3Parser[{}]: start text_len={}", self.source, text.len());
        let rows = table_rows(self.source, text, |l| l.starts_with("##gff-version"), 0)?;

        let mut genes = Vec::new();
        for row in rows.iter().filter(|r| !r.text.starts_with('#')) {
            let cols: Vec<&str> = row.text.split('\t').collect();
            if cols.len() < 7 {
                return Err(row.invalid(self.source, format!("expected 9 tab-separated columns, found {}", cols.len())));
            }
            if cols[2] != "CDS" {
                continue;
            }
            let gene = Gene::from_tokens(cols[3], cols[4], cols[6], self.source)
                .map_err(|e| row.locate(self.source, e))?;
            genes.push(gene);
        }
        info!("Gff3Parser[{}]: parsed {} genes", self.source, genes.len());
        Ok(genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneError;
    use crate::gene::Direction;

    #[test]
    fn test_parses_cds_features_only() {
        let text = "##gff-version 3\n\
#sequence-region phage 1 40000\n\
phage\tFIG\tCDS\t3\t461\t.\t+\t0\tID=fig|6666666.1.peg.1\n\
phage\tFIG\trna\t470\t490\t.\t+\t.\tID=fig|6666666.1.rna.1\n\
phage\tFIG\tCDS\t500\t1310\t.\t-\t0\tID=fig|6666666.1.peg.2\n";
        let genes = Gff3Parser::new(SourceKind::Rast).parse(text).unwrap();
        assert_eq!(genes.len(), 2);
        assert_eq!(genes[0].coords(), (Direction::Forward, 3, 461));
        assert_eq!(genes[1].coords(), (Direction::Reverse, 500, 1310));
        assert_eq!(genes[0].source(), SourceKind::Rast);
    }

    #[test]
    fn test_requires_version_pragma() {
        let err = Gff3Parser::new(SourceKind::Rast).parse("status: error\n").unwrap_err();
        assert!(matches!(err, GeneError::Format { .. }));
    }

    #[test]
    fn test_short_row_is_validation_error() {
        let err = Gff3Parser::new(SourceKind::Rast)
            .parse("##gff-version 3\nphage\tFIG\tCDS\n")
            .unwrap_err();
        assert!(matches!(err, GeneError::Validation(_)));
    }
}
