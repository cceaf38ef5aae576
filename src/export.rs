use crate::model::LogEntry;
use anyhow::Context;
use chrono::{DateTime, Local};
use csv::Writer;
use std::path::Path;

pub const CSV_HEADER: [&str; 6] = [
    "Date",
    "Time",
    "Student Name",
    "Student ID",
    "Session Number",
    "Receptionist",
];

/// `attendance-logs-<YYYY-MM-DD>.csv`, stamped with the current local date.
pub fn default_export_filename() -> String {
    format!("attendance-logs-{}.csv", Local::now().format("%Y-%m-%d"))
}

/// Check-in timestamps are stored as ISO-8601 UTC; the export renders them in
/// local time, split into the Date and Time columns. An unparseable stamp is
/// passed through raw rather than dropping the row.
fn local_date_time(iso: &str) -> (String, String) {
    match DateTime::parse_from_rfc3339(iso) {
        Ok(dt) => {
            let local = dt.with_timezone(&Local);
            (
                local.format("%Y-%m-%d").to_string(),
                local.format("%H:%M:%S").to_string(),
            )
        }
        Err(_) => (iso.to_string(), String::new()),
    }
}

pub fn write_logs_csv(path: &Path, entries: &[LogEntry]) -> anyhow::Result<usize> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("failed to create export file {}", path.to_string_lossy()))?;

    wtr.write_record(CSV_HEADER)
        .context("failed to write export header")?;

    for entry in entries {
        let (date, time) = local_date_time(&entry.checkin_time);
        wtr.write_record(&[
            date,
            time,
            entry.student_name.clone(),
            entry.student_id.clone(),
            entry.session_number.to_string(),
            entry.receptionist.clone(),
        ])
        .context("failed to write export row")?;
    }

    wtr.flush().context("failed to flush export file")?;
    Ok(entries.len())
}
