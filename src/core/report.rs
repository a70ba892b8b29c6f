use crate::domain::model::{MigrationResult, ReportRow, ReportStatus};
use crate::utils::error::{MigrateError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const CSV_REPORT: &str = "migration_report.csv";
pub const JSON_REPORT: &str = "migration_report.json";
pub const BUNDLE: &str = "migration_bundle.zip";

pub const REPORT_FORMATS: &[&str] = &["csv", "json"];

#[derive(Debug, Serialize)]
struct StatusTotals {
    rewritten: usize,
    renamed: usize,
    unsupported: usize,
    skipped: usize,
    warning: usize,
    dropped: usize,
}

impl StatusTotals {
    fn of(result: &MigrationResult) -> Self {
        Self {
            rewritten: result.count(ReportStatus::Rewritten),
            renamed: result.count(ReportStatus::Renamed),
            unsupported: result.count(ReportStatus::Unsupported),
            skipped: result.count(ReportStatus::Skipped),
            warning: result.count(ReportStatus::Warning),
            dropped: result.count(ReportStatus::Dropped),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    totals: StatusTotals,
    files: &'a [crate::domain::model::FileMigration],
    rows: Vec<&'a ReportRow>,
}

pub fn to_csv(rows: &[&ReportRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    // 沒有資料時仍輸出表頭
    if rows.is_empty() {
        writer.write_record(["file", "line", "family", "original", "replacement", "status", "message"])?;
    }
    let data = writer.into_inner().map_err(|e| MigrateError::ProcessingError {
        message: format!("failed to flush CSV report: {}", e),
    })?;
    String::from_utf8(data).map_err(|e| MigrateError::ProcessingError {
        message: format!("CSV report is not valid UTF-8: {}", e),
    })
}

pub fn to_json(result: &MigrationResult, generated_at: DateTime<Utc>) -> Result<String> {
    let report = JsonReport {
        generated_at: generated_at.to_rfc3339(),
        totals: StatusTotals::of(result),
        files: &result.files,
        rows: result.rows().collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Packs `(name, contents)` entries into an in-memory zip.
pub fn bundle(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
