//! Export metadata rows to CSV.
//!
//! Output is UTF-8, comma-delimited, with RFC 4180 quoting. A BOM can be
//! requested for Excel compatibility.

use std::io::Write;
use std::path::Path;

use crate::error::{MailError, Result};
use crate::model::record::MetadataRecord;

/// Write `records` to `output_path` with a header row of `headers`.
///
/// Each row holds the record's values for `headers`, in that order; absent
/// values are written as empty strings.
pub fn write_records(
    records: &[MetadataRecord],
    headers: &[&str],
    output_path: &Path,
    write_bom: bool,
) -> Result<()> {
    let mut file =
        std::fs::File::create(output_path).map_err(|e| MailError::io(output_path, e))?;

    if write_bom {
        file.write_all(&[0xEF, 0xBB, 0xBF])
            .map_err(|e| MailError::io(output_path, e))?;
    }

    let csv_error = |source: csv::Error| MailError::Csv {
        path: output_path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(headers).map_err(csv_error)?;
    for record in records {
        writer.write_record(record.to_row(headers)).map_err(csv_error)?;
    }
    writer.flush().map_err(|e| MailError::io(output_path, e))?;

    Ok(())
}
