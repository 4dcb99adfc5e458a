use super::{strip_leading_tags, table_rows, GeneParser};
use crate::error::Result;
use crate::gene::Gene;
use crate::types::SourceKind;
use tracing::{debug, info};

/// Glimmer3 `.predict` output: a `>name` line followed by
/// `orf00001      310     1125  +1     9.87` rows. Reverse-frame rows list
/// the start codon position first, so their columns are swapped.
pub struct GlimmerParser;

impl GeneParser for GlimmerParser {
    fn source(&self) -> SourceKind {
        SourceKind::Glimmer
    }

    fn parse(&self, text: &str) -> Result<Vec<Gene>> {
        debug!("GlimmerParser: start text_len={}", text.len());
        let source = self.source();
        let rows = table_rows(source, text, |l| strip_leading_tags(l).starts_with('>'), 0)?;

        let mut genes = Vec::with_capacity(rows.len());
        for row in &rows {
            let cols = row.columns();
            if cols.len() < 4 {
                return Err(row.invalid(source, format!("expected at least 4 columns, found {}", cols.len())));
            }
            let gene = match cols[3].chars().next() {
                Some('+') => Gene::from_tokens(cols[1], cols[2], "+", source),
                Some('-') => Gene::from_tokens(cols[2], cols[1], "-", source),
                _ => return Err(row.invalid(source, format!("unrecognized frame '{}'", cols[3]))),
            };
            genes.push(gene.map_err(|e| row.locate(source, e))?);
        }
        info!("GlimmerParser: parsed {} genes", genes.len());
        Ok(genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneError;
    use crate::gene::Direction;

    #[test]
    fn test_parses_both_frames() {
        let text = "\
<html><body><pre>>phage
orf00001        3      461  +3     9.87
orf00003     1310      500  -2    12.01
</pre></body></html>
";
        let genes = GlimmerParser.parse(text).unwrap();
        assert_eq!(genes.len(), 2);
        assert_eq!(genes[0].coords(), (Direction::Forward, 3, 461));
        assert_eq!(genes[1].coords(), (Direction::Reverse, 500, 1310));
        assert_eq!(genes[1].fixed_end(), 500);
    }

    #[test]
    fn test_plain_text_without_markup() {
        let text = ">phage\norf00001 10 100 +1 3.2\n";
        let genes = GlimmerParser.parse(text).unwrap();
        assert_eq!(genes.len(), 1);
    }

    #[test]
    fn test_error_page_is_format_error() {
        let err = GlimmerParser.parse("Internal Server Error").unwrap_err();
        assert!(matches!(err, GeneError::Format { .. }));
    }

    #[test]
    fn test_bad_frame_is_validation_error() {
        let err = GlimmerParser.parse(">phage\norf00001 10 100 ?1 3.2\n").unwrap_err();
        assert!(matches!(err, GeneError::Validation(_)));
    }
}
