//! Persist attachments and inline content of a message.

use tracing::{debug, error, info};

use crate::error::{MailError, Result};
use crate::export::output::OutputFactory;
use crate::extract::sanitize::sanitize_filename;
use crate::model::message::{Message, Part};
use crate::model::output::ExtractedFile;

/// Length of the digest used when a message has no `Message-ID`.
const SYNTHETIC_ID_LEN: usize = 8;

/// What to do with a leaf part that has a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartAction {
    Extract,
    Skip,
}

/// Classify a named leaf part.
///
/// Parts with an `attachment` or `inline` disposition are extracted. Parts
/// without any disposition are extracted unless they are `text/*`, which
/// keeps alternative bodies out of the output.
pub fn classify(part: &Part) -> PartAction {
    match part.disposition.as_deref() {
        Some(disposition) => {
            let disposition = disposition.trim().to_lowercase();
            if disposition.starts_with("attachment") || disposition.starts_with("inline") {
                PartAction::Extract
            } else {
                PartAction::Skip
            }
        }
        None if part.maintype() != "text" => PartAction::Extract,
        None => PartAction::Skip,
    }
}

/// Identifier that makes attachment names unique per message.
///
/// The sanitized `Message-ID`, or `unknown_message_` plus a digest of the raw
/// message when the header is missing or empty.
pub fn message_identifier(message: &Message) -> String {
    let id = sanitize_filename(message.header("Message-ID").unwrap_or(""));
    if id.is_empty() {
        format!(
            "unknown_message_{}",
            message.content_digest(SYNTHETIC_ID_LEN)
        )
    } else {
        id
    }
}

/// Split a filename into base and extension at the last dot.
///
/// Leading dots do not start an extension (`.bashrc` has none).
pub fn split_filename(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if !filename[..pos].chars().all(|c| c == '.') => {
            (&filename[..pos], &filename[pos + 1..])
        }
        _ => (filename, ""),
    }
}

/// Write every eligible part of `message` through `output`.
///
/// Returns the descriptors of the files written, in document order. A part
/// that fails to save is logged and skipped; it never aborts its siblings.
pub fn extract_attachments(message: &Message, output: &dyn OutputFactory) -> Vec<ExtractedFile> {
    let message_id = message_identifier(message);
    let source = message.source();
    let mut extracted = Vec::new();

    for part in message.walk() {
        if part.is_container() {
            continue;
        }
        let Some(filename) = part.filename() else {
            continue;
        };

        match classify(part) {
            PartAction::Extract => match save_part(part, filename, &message_id, output) {
                Ok(file) => {
                    info!(
                        %source,
                        path = %file.path.display(),
                        disposition = part.disposition.as_deref().unwrap_or("implicit"),
                        "Saved file"
                    );
                    extracted.push(file);
                }
                Err(e) => {
                    error!(%source, filename, error = %e, "Failed to save file");
                }
            },
            PartAction::Skip => {
                debug!(
                    filename,
                    disposition = part.disposition.as_deref().unwrap_or("none"),
                    maintype = part.maintype(),
                    "Skipping part"
                );
            }
        }
    }

    extracted
}

/// Allocate an output named `{base}.{message_id}` and write the raw payload.
fn save_part(
    part: &Part,
    filename: &str,
    message_id: &str,
    output: &dyn OutputFactory,
) -> Result<ExtractedFile> {
    let (base, extension) = split_filename(filename);
    let display_name = format!("{base}.{message_id}");

    let write_error = |e: MailError| MailError::AttachmentWrite {
        filename: filename.to_string(),
        reason: e.to_string(),
    };

    let file = output
        .allocate(&display_name, extension, extension)
        .map_err(write_error)?;
    output
        .write(&file, part.payload().unwrap_or_default())
        .map_err(write_error)?;
    Ok(file)
}
