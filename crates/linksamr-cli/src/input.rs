//! CSV ingestion: one row per lookup record.
//!
//! Header names are normalized to lowercase here so the rest of the
//! pipeline can treat field names uniformly; cell values are trimmed and
//! empty cells are dropped rather than carried as empty fields.

use std::path::Path;

use anyhow::Context;
use linksamr_core::LookupRecord;

/// Read an identifier-lookup CSV. Every column is passed through; the
/// header row defines the field names.
pub fn read_lookup_csv(path: &Path) -> anyhow::Result<Vec<LookupRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = LookupRecord::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            let value = value.trim();
            if !value.is_empty() {
                record.insert(header, value);
            }
        }
        if !record.is_empty() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Read a journal-lookup CSV: requires an `ISSN` column; an optional `ID`
/// column names each row, falling back to the zero-based row number.
pub fn read_journal_csv(path: &Path) -> anyhow::Result<Vec<LookupRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let issn_col = headers
        .iter()
        .position(|h| h == "issn")
        .with_context(|| format!("{} has no ISSN column", path.display()))?;
    let id_col = headers.iter().position(|h| h == "id");

    let mut records = Vec::new();
    for (num, row) in reader.records().enumerate() {
        let row = row?;
        let issn = row.get(issn_col).map(str::trim).unwrap_or_default();
        if issn.is_empty() {
            continue;
        }
        let id = id_col
            .and_then(|col| row.get(col))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| num.to_string());
        records.push(LookupRecord::from_pairs([
            ("id", id.as_str()),
            ("issn", issn),
        ]));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn headers_are_lowercased_and_values_trimmed() {
        let file = write_csv("UT,DOI\n 01234 ,10.1/x\n02394,\n");
        let records = read_lookup_csv(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("ut"), Some("01234"));
        assert_eq!(records[0].get("doi"), Some("10.1/x"));
        // Empty cells are dropped, not stored as empty fields.
        assert_eq!(records[1].get("doi"), None);
    }

    #[test]
    fn unrecognized_columns_pass_through() {
        let file = write_csv("id,Title,authors\n1,Some Paper,Smith; Jones\n");
        let records = read_lookup_csv(file.path()).unwrap();
        assert_eq!(records[0].get("title"), Some("Some Paper"));
        assert_eq!(records[0].get("authors"), Some("Smith; Jones"));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let file = write_csv("ut\n01234\n\n02394\n");
        let records = read_lookup_csv(file.path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn journal_rows_default_ids_to_row_number() {
        let file = write_csv("ISSN\n0265-0568\n0028-0836\n");
        let records = read_journal_csv(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some("0"));
        assert_eq!(records[0].get("issn"), Some("0265-0568"));
        assert_eq!(records[1].get("id"), Some("1"));
    }

    #[test]
    fn journal_rows_use_the_id_column_when_present() {
        let file = write_csv("ID,ISSN\nj9,0028-4793\n");
        let records = read_journal_csv(file.path()).unwrap();
        assert_eq!(records[0].get("id"), Some("j9"));
    }

    #[test]
    fn journal_rows_without_an_issn_are_skipped() {
        let file = write_csv("ID,ISSN\n1,0028-4793\n2,\n");
        let records = read_journal_csv(file.path()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn missing_issn_column_is_an_error() {
        let file = write_csv("id,doi\n1,10.1/x\n");
        assert!(read_journal_csv(file.path()).is_err());
    }
}
