//! CSV serialization of the final audience.

use std::io::Write;

use chrono::SecondsFormat;
use thiserror::Error;

use crate::combine::FinalAudience;

/// Column order of exported audiences.
pub const CSV_COLUMNS: [&str; 8] = [
    "user_id",
    "country",
    "device",
    "plan",
    "num_tasks",
    "email",
    "last_login",
    "event_count",
];

/// CSV export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes the audience as UTF-8 CSV with a header row.
pub fn write_csv<W: Write>(writer: W, audience: &FinalAudience) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_COLUMNS)?;
    for member in audience.members() {
        let num_tasks = member.num_tasks.map(|n| n.to_string()).unwrap_or_default();
        let last_login = member
            .last_login
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        let event_count = member.event_count.to_string();
        csv.write_record([
            member.user_id.as_str(),
            member.country.as_str(),
            member.device.as_str(),
            member.plan.as_str(),
            num_tasks.as_str(),
            member.email.as_str(),
            last_login.as_str(),
            event_count.as_str(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Serializes the audience to an in-memory CSV document.
pub fn to_csv(audience: &FinalAudience) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, audience)?;
    Ok(buffer)
}
