use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MISSING_DESCRIPTION;
use crate::validation::{StoryDraft, ValidationError};

/// Column order expected in import files:
/// title, url, category, description, author.
pub const MIN_COLUMNS: usize = 3;
pub const MAX_COLUMNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Semicolon,
}

impl Delimiter {
    fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Semicolon => b';',
        }
    }
}

/// Structural failures that reject the whole import request. Row-level
/// problems never surface here; they land in the report instead.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV file is empty")]
    Empty,
    #[error("CSV parsing failed")]
    Parse(#[source] csv::Error),
}

/// One candidate record from the file, tagged with its 1-based row
/// number. Blank lines and a detected header do not receive numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub row: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Imported,
    Duplicate,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRowReport {
    pub row: usize,
    pub status: RowStatus,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub successful: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub rows: Vec<ImportRowReport>,
}

/// A validated row waiting for the batch committer.
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub row: usize,
    pub draft: StoryDraft,
}

/// Splits raw delimited text into candidate rows.
///
/// The first non-blank record is treated as a header and skipped when
/// its lowercased fields contain both "title" and "url". Blank records
/// are dropped without consuming a row number.
pub fn parse_rows(content: &str, delimiter: Delimiter) -> Result<Vec<CsvRow>, ImportError> {
    if content.trim().is_empty() {
        return Err(ImportError::Empty);
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut rows: Vec<CsvRow> = Vec::new();
    let mut seen_first_record = false;

    for record in reader.records() {
        let record = record.map_err(ImportError::Parse)?;
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();

        if fields.iter().all(|field| field.is_empty()) {
            continue;
        }

        if !seen_first_record {
            seen_first_record = true;
            if is_header(&fields) {
                continue;
            }
        }

        fields.truncate(MAX_COLUMNS);
        rows.push(CsvRow {
            row: rows.len() + 1,
            fields,
        });
    }

    Ok(rows)
}

fn is_header(fields: &[String]) -> bool {
    let mut has_title = false;
    let mut has_url = false;
    for field in fields {
        let lower = field.to_lowercase();
        has_title |= lower.contains("title");
        has_url |= lower.contains("url");
    }
    has_title && has_url
}

/// Converts candidate rows into committable entries, collecting the
/// rows that fail validation as report lines.
pub fn prepare_rows(rows: Vec<CsvRow>) -> (Vec<ImportEntry>, Vec<ImportRowReport>) {
    let mut entries = Vec::new();
    let mut failures = Vec::new();

    for row in rows {
        match draft_from_row(&row) {
            Ok(draft) => entries.push(ImportEntry { row: row.row, draft }),
            Err(report) => failures.push(report),
        }
    }

    (entries, failures)
}

fn draft_from_row(row: &CsvRow) -> Result<StoryDraft, ImportRowReport> {
    if row.fields.len() < MIN_COLUMNS {
        return Err(ImportRowReport {
            row: row.row,
            status: RowStatus::Failed,
            title: first_field_or_placeholder(row),
            message: "Missing required fields (need at least: title, url, category)".to_string(),
        });
    }

    let title = &row.fields[0];
    let url = &row.fields[1];
    let category = &row.fields[2];
    let description = row.fields.get(3).map(String::as_str);
    let author = row.fields.get(4).map(String::as_str);

    match StoryDraft::new(title, url, category, author, description) {
        Ok(mut draft) => {
            // Imported rows never keep a NULL description
            if draft.description.is_none() {
                draft.description = Some(MISSING_DESCRIPTION.to_string());
            }
            Ok(draft)
        }
        Err(err) => Err(ImportRowReport {
            row: row.row,
            status: RowStatus::Failed,
            title: failed_row_title(row, err),
            message: err.to_string(),
        }),
    }
}

fn first_field_or_placeholder(row: &CsvRow) -> String {
    row.fields
        .first()
        .filter(|field| !field.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("Row {}", row.row))
}

fn failed_row_title(row: &CsvRow, err: ValidationError) -> String {
    if err == ValidationError::MissingTitle {
        format!("Row {}", row.row)
    } else {
        row.fields[0].clone()
    }
}

/// Merges committer outcomes and validation failures into the final
/// report, ordered by row number.
pub fn build_report(mut rows: Vec<ImportRowReport>) -> ImportReport {
    rows.sort_by_key(|row| row.row);

    let count = |status: RowStatus| rows.iter().filter(|row| row.status == status).count();

    ImportReport {
        total: rows.len(),
        successful: count(RowStatus::Imported),
        duplicates: count(RowStatus::Duplicate),
        failed: count(RowStatus::Failed),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(row: &CsvRow) -> Vec<&str> {
        row.fields.iter().map(String::as_str).collect()
    }

    #[test]
    fn skips_header_line() {
        let rows = parse_rows(
            "title,url,category\nA,https://example.com/a,Tech",
            Delimiter::Comma,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 1);
        assert_eq!(fields(&rows[0]), vec!["A", "https://example.com/a", "Tech"]);
    }

    #[test]
    fn header_detection_is_case_insensitive() {
        let rows = parse_rows(
            "Title;URL;Category\nA;https://example.com/a;Tech",
            Delimiter::Semicolon,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn first_data_line_is_row_one_without_header() {
        let rows = parse_rows("A,https://example.com/a,Tech", Delimiter::Comma).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 1);
    }

    #[test]
    fn blank_lines_do_not_shift_row_numbers() {
        let content = "title,url,category\nA,https://example.com/a,Tech\n\n\nB,https://example.com/b,Tech";
        let rows = parse_rows(content, Delimiter::Comma).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[1].row, 2);
    }

    #[test]
    fn empty_input_is_a_structural_error() {
        assert!(matches!(
            parse_rows("", Delimiter::Comma),
            Err(ImportError::Empty)
        ));
        assert!(matches!(
            parse_rows("  \n  \n", Delimiter::Comma),
            Err(ImportError::Empty)
        ));
    }

    #[test]
    fn header_only_input_yields_no_rows() {
        let rows = parse_rows("title,url,category,description,author", Delimiter::Comma).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn quoted_fields_keep_embedded_delimiters() {
        let rows = parse_rows(
            "\"One, Two\",https://example.com/a,Tech",
            Delimiter::Comma,
        )
        .unwrap();

        assert_eq!(rows[0].fields[0], "One, Two");
    }

    #[test]
    fn fields_are_trimmed() {
        let rows = parse_rows(" A ; https://example.com/a ; Tech ", Delimiter::Semicolon).unwrap();
        assert_eq!(
            fields(&rows[0]),
            vec!["A", "https://example.com/a", "Tech"]
        );
    }

    #[test]
    fn extra_columns_are_ignored() {
        let rows = parse_rows(
            "A,https://example.com/a,Tech,desc,Ada,extra,more",
            Delimiter::Comma,
        )
        .unwrap();

        assert_eq!(rows[0].fields.len(), MAX_COLUMNS);
    }

    #[test]
    fn short_row_fails_with_field_list_message() {
        let rows = parse_rows("A,https://example.com/a", Delimiter::Comma).unwrap();
        let (entries, failures) = prepare_rows(rows);

        assert!(entries.is_empty());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].status, RowStatus::Failed);
        assert_eq!(failures[0].title, "A");
        assert_eq!(
            failures[0].message,
            "Missing required fields (need at least: title, url, category)"
        );
    }

    #[test]
    fn missing_title_uses_row_placeholder() {
        let rows = parse_rows(";https://example.com/a;Tech", Delimiter::Semicolon).unwrap();
        let (entries, failures) = prepare_rows(rows);

        assert!(entries.is_empty());
        assert_eq!(failures[0].title, "Row 1");
        assert_eq!(failures[0].message, "Title is required");
    }

    #[test]
    fn invalid_url_keeps_real_title() {
        let rows = parse_rows("A;nonsense;Tech", Delimiter::Semicolon).unwrap();
        let (_, failures) = prepare_rows(rows);

        assert_eq!(failures[0].title, "A");
        assert_eq!(failures[0].message, "Invalid URL format");
    }

    #[test]
    fn valid_row_gets_description_sentinel() {
        let rows = parse_rows("A,https://example.com/a,Tech", Delimiter::Comma).unwrap();
        let (entries, failures) = prepare_rows(rows);

        assert!(failures.is_empty());
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].draft.description.as_deref(),
            Some(MISSING_DESCRIPTION)
        );
    }

    #[test]
    fn provided_description_and_author_are_kept() {
        let rows = parse_rows(
            "A,https://example.com/a,Tech,All about A,Ada",
            Delimiter::Comma,
        )
        .unwrap();
        let (entries, _) = prepare_rows(rows);

        assert_eq!(entries[0].draft.description.as_deref(), Some("All about A"));
        assert_eq!(entries[0].draft.author, "Ada");
    }

    #[test]
    fn report_counts_every_status() {
        let report = build_report(vec![
            ImportRowReport {
                row: 2,
                status: RowStatus::Duplicate,
                title: "B".into(),
                message: "URL already exists".into(),
            },
            ImportRowReport {
                row: 1,
                status: RowStatus::Imported,
                title: "A".into(),
                message: "Successfully added".into(),
            },
            ImportRowReport {
                row: 3,
                status: RowStatus::Failed,
                title: "Row 3".into(),
                message: "Title is required".into(),
            },
        ]);

        assert_eq!(report.total, 3);
        assert_eq!(report.successful, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.failed, 1);
        // rows come back sorted by row number
        let order: Vec<usize> = report.rows.iter().map(|row| row.row).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn semicolon_rows_mix_outcomes() {
        let content = "title;url;category\nA;https://x.com/a;Tech\n;https://x.com/b;Tech";
        let rows = parse_rows(content, Delimiter::Semicolon).unwrap();
        let (entries, failures) = prepare_rows(rows);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].row, 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].row, 2);
        assert_eq!(failures[0].message, "Title is required");
    }
}
