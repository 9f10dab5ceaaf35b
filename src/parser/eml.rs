//! Parser for individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::path::Path;

use tracing::info;

use crate::error::{MailError, Result};
use crate::export::output::OutputFactory;
use crate::extract::attachment::extract_attachments;
use crate::extract::metadata::extract_metadata;
use crate::model::message::{Message, MessageSource};
use crate::model::output::ExtractedFile;
use crate::model::record::MetadataRecord;
use crate::parser::mime;

/// Read and parse a single `.eml` file.
pub fn read_eml(path: impl AsRef<Path>) -> Result<Message> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| MailError::open(path, e))?;

    mime::parse_message(&data, MessageSource::Eml).map_err(|reason| MailError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse a single `.eml` file, extract its attachments, and build its row.
///
/// Errors reading or parsing the file are returned to the caller.
pub fn parse_eml(
    path: impl AsRef<Path>,
    output: &dyn OutputFactory,
) -> Result<(Vec<ExtractedFile>, MetadataRecord)> {
    let path = path.as_ref();
    let message = read_eml(path)?;
    info!(path = %path.display(), "Parsed EML file");

    let attachments = message.declared_attachments();
    let files = extract_attachments(&message, output);
    let record = extract_metadata(attachments, &message);

    Ok((files, record))
}
