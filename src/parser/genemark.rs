use super::{contains_words, table_rows, GeneParser, Row};
use crate::error::{GeneError, Result};
use crate::gene::Gene;
use crate::types::SourceKind;
use tracing::{debug, info};

const GENE_TABLE_HEADER: &str = "Gene Strand LeftEnd RightEnd";
const LST_BANNER: &str = "GeneMark.hmm";

/// Rows look like `    1        +          <3         461         459         1`.
fn gene_from_row(source: SourceKind, row: &Row<'_>) -> Result<Gene> {
    let cols = row.columns();
    if cols.len() < 4 {
        return Err(row.invalid(source, format!("expected at least 4 columns, found {}", cols.len())));
    }
    Gene::from_tokens(cols[2], cols[3], cols[1], source).map_err(|e| row.locate(source, e))
}

/// Output of the GeneMark server that DNA Master talks to.
pub struct GeneMarkServerParser;

impl GeneParser for GeneMarkServerParser {
    fn source(&self) -> SourceKind {
        SourceKind::GeneMark
    }

    fn parse(&self, text: &str) -> Result<Vec<Gene>> {
        debug!("GeneMarkServerParser: start text_len={}", text.len());
        let rows = table_rows(self.source(), text, |l| contains_words(l, GENE_TABLE_HEADER), 1)?;
        let genes = rows
            .iter()
            .map(|row| gene_from_row(self.source(), row))
            .collect::<Result<Vec<_>>>()?;
        info!("GeneMarkServerParser: parsed {} genes", genes.len());
        Ok(genes)
    }
}

/// GeneMark.hmm LST output, shared by the hmm, GeneMarkS and heuristic tools.
pub struct GeneMarkLstParser {
    source: SourceKind,
}

impl GeneMarkLstParser {
    pub fn new(source: SourceKind) -> Self {
        Self { source }
    }
}

impl GeneParser for GeneMarkLstParser {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn parse(&self, text: &str) -> Result<Vec<Gene>> {
        debug!("GeneMarkLstParser[{}]: start text_len={}", self.source, text.len());
        let banner = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        if !banner.contains(LST_BANNER) {
            return Err(GeneError::format(
                self.source.label(),
                format!("not a {} LST file", LST_BANNER),
            ));
        }
        // Header is followed by the `#  Length` line and a blank line.
        let rows = table_rows(self.source, text, |l| contains_words(l, GENE_TABLE_HEADER), 2)?;
        let genes = rows
            .iter()
            .map(|row| gene_from_row(self.source, row))
            .collect::<Result<Vec<_>>>()?;
        info!("GeneMarkLstParser[{}]: parsed {} genes", self.source, genes.len());
        Ok(genes)
    }
}

/// GeneMarkS-2 LST output. The table follows the `SequenceID` line; comment
/// and column-header lines inside it are ignored.
pub struct GeneMarkS2Parser;

impl GeneParser for GeneMarkS2Parser {
    fn source(&self) -> SourceKind {
        SourceKind::GeneMarkS2
    }

    fn parse(&self, text: &str) -> Result<Vec<Gene>> {
        debug!("GeneMarkS2Parser: start text_len={}", text.len());
        let rows = table_rows(self.source(), text, |l| l.contains("SequenceID"), 0)?;
        let genes = rows
            .iter()
            .filter(|row| {
                let t = row.text.trim_start();
                !t.starts_with('#') && !contains_words(t, GENE_TABLE_HEADER)
            })
            .map(|row| gene_from_row(self.source(), row))
            .collect::<Result<Vec<_>>>()?;
        info!("GeneMarkS2Parser: parsed {} genes", genes.len());
        Ok(genes)
    }
}
