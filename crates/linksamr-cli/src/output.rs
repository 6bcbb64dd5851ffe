//! CSV emission for the two lookup modes.

use std::path::Path;

use anyhow::Context;
use linksamr_core::ResultRecord;

/// Write identifier-lookup results: `id, ut, doi, pmid, times cited, source`.
///
/// The `ut` value carries a `WOS:` prefix when present; `times cited`
/// defaults to `0` and `source` to `N/A` for records the service matched
/// without those fields.
pub fn write_id_results(path: &Path, results: &[(String, ResultRecord)]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    writer.write_record(["id", "ut", "doi", "pmid", "times cited", "source"])?;

    for (key, record) in results {
        let ut = record
            .get("ut")
            .map(|ut| format!("WOS:{ut}"))
            .unwrap_or_default();
        writer.write_record([
            key.as_str(),
            ut.as_str(),
            record.get("doi").map_or("", String::as_str),
            record.get("pmid").map_or("", String::as_str),
            record.get("timesCited").map_or("0", String::as_str),
            record.get("sourceURL").map_or("N/A", String::as_str),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write journal-lookup results: `number, ISSN, JCR`, defaulting missing
/// values to `na`.
pub fn write_journal_results(
    path: &Path,
    results: &[(String, ResultRecord)],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    writer.write_record(["number", "ISSN", "JCR"])?;

    for (key, record) in results {
        writer.write_record([
            key.as_str(),
            record.get("issn").map_or("na", String::as_str),
            record.get("impactGraphURL").map_or("na", String::as_str),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
