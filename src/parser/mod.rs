//! Format adapters turning raw tool output into gene calls.
//!
//! Every adapter scans for a format-specific header marker, skips a fixed
//! number of separator lines and reads rows until a blank line or an end
//! sentinel. A missing marker means the tool answered with something other
//! than a prediction table (an error page, a login form) and is reported as a
//! format error.

pub mod genemark;
pub mod gff3;
pub mod glimmer;
pub mod prodigal;

use crate::error::{GeneError, Result};
use crate::gene::Gene;
use crate::types::SourceKind;

pub use genemark::{GeneMarkLstParser, GeneMarkS2Parser, GeneMarkServerParser};
pub use gff3::Gff3Parser;
pub use glimmer::GlimmerParser;
pub use prodigal::ProdigalParser;

pub trait GeneParser: Send + Sync {
    fn source(&self) -> SourceKind;
    fn parse(&self, text: &str) -> Result<Vec<Gene>>;
}

/// Parser registered for each source.
pub fn parser_for(kind: SourceKind) -> Box<dyn GeneParser> {
    match kind {
        SourceKind::Glimmer => Box::new(GlimmerParser),
        SourceKind::GeneMark => Box::new(GeneMarkServerParser),
        SourceKind::GeneMarkHmm | SourceKind::GeneMarkS | SourceKind::GeneMarkHeuristic => {
            Box::new(GeneMarkLstParser::new(kind))
        }
        SourceKind::GeneMarkS2 => Box::new(GeneMarkS2Parser),
        SourceKind::Prodigal => Box::new(ProdigalParser),
        SourceKind::Rast => Box::new(Gff3Parser::new(kind)),
    }
}

/// A table row with its 1-based line number in the raw text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Row<'a> {
    pub line_no: usize,
    pub text: &'a str,
}

impl<'a> Row<'a> {
    pub fn columns(&self) -> Vec<&'a str> {
        self.text.split_whitespace().collect()
    }

    pub fn invalid(&self, source: SourceKind, reason: impl std::fmt::Display) -> GeneError {
        GeneError::Validation(format!("{} line {}: {}", source, self.line_no, reason))
    }

    /// Attaches this row's position to a validation error.
    pub fn locate(&self, source: SourceKind, err: GeneError) -> GeneError {
        match err {
            GeneError::Validation(reason) => self.invalid(source, reason),
            other => other,
        }
    }
}

/// Locates the table introduced by the first line matching `is_marker`,
/// skips `skip` further lines and collects rows up to the end of the table.
pub(crate) fn table_rows<'a>(
    source: SourceKind,
    text: &'a str,
    is_marker: impl Fn(&str) -> bool,
    skip: usize,
) -> Result<Vec<Row<'a>>> {
    let mut lines = text.lines().enumerate();
    let header = lines.by_ref().find(|(_, line)| is_marker(line));
    let Some((header_idx, _)) = header else {
        return Err(GeneError::format(
            source.label(),
            "prediction table header not found",
        ));
    };
    tracing::debug!("{}: table header on line {}", source, header_idx + 1);

    let rows = lines
        .skip(skip)
        .map(|(idx, text)| Row {
            line_no: idx + 1,
            text,
        })
        .take_while(|row| !is_table_end(row.text))
        .collect();
    Ok(rows)
}

/// Blank lines, closing markup and GenBank record terminators end a table.
fn is_table_end(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('<') || trimmed.starts_with("//")
}

/// Drops leading HTML tags, e.g. `<html><pre>>seq` becomes `>seq`.
pub(crate) fn strip_leading_tags(line: &str) -> &str {
    let mut rest = line.trim_start();
    while rest.starts_with('<') {
        match rest.find('>') {
            Some(end) => rest = rest[end + 1..].trim_start(),
            None => break,
        }
    }
    rest
}

/// Whitespace-insensitive substring check for column header markers.
pub(crate) fn contains_words(line: &str, words: &str) -> bool {
    let normalized: Vec<&str> = line.split_whitespace().collect();
    let wanted: Vec<&str> = words.split_whitespace().collect();
    !wanted.is_empty() && normalized.windows(wanted.len()).any(|w| w == wanted.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_skip_and_stop_at_blank() {
        let text = "banner\nHEADER\n----\nrow one\nrow two\n\ntrailing\n";
        let rows = table_rows(SourceKind::GeneMark, text, |l| l == "HEADER", 1).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "row one");
        assert_eq!(rows[0].line_no, 4);
    }

    #[test]
    fn test_table_rows_stop_at_markup() {
        let text = "HEADER\n1 2\n</pre></body>\n3 4\n";
        let rows = table_rows(SourceKind::Glimmer, text, |l| l == "HEADER", 0).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_missing_marker_is_format_error() {
        let err = table_rows(SourceKind::GeneMark, "<html>502 Bad Gateway</html>", |l| l == "HEADER", 0)
            .unwrap_err();
        assert!(matches!(err, GeneError::Format { .. }));
    }

    #[test]
    fn test_strip_leading_tags() {
        assert_eq!(strip_leading_tags("<html><pre>>phage"), ">phage");
        assert_eq!(strip_leading_tags(">phage"), ">phage");
        assert_eq!(strip_leading_tags("<unterminated"), "<unterminated");
    }

    #[test]
    fn test_contains_words_ignores_spacing() {
        assert!(contains_words(
            "   Gene    Strand    LeftEnd    RightEnd       Gene     Class",
            "Gene Strand LeftEnd RightEnd"
        ));
        assert!(!contains_words("Gene Strand", "Gene Strand LeftEnd"));
    }

    #[test]
    fn test_every_source_has_a_parser() {
        for kind in SourceKind::ALL {
            assert_eq!(parser_for(kind).source(), kind);
        }
    }
}
