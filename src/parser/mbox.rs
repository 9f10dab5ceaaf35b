//! Streaming MBOX parser and the per-mailbox extraction driver.
//!
//! Reads MBOX files line-by-line with a 1 MB buffer, holding only one
//! message in memory at a time. Tolerant of malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{MailError, Result};
use crate::export::output::OutputFactory;
use crate::extract::attachment::extract_attachments;
use crate::extract::metadata::extract_metadata;
use crate::model::message::MessageSource;
use crate::model::output::ExtractedFile;
use crate::model::record::MetadataRecord;
use crate::parser::mime;

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default maximum message size in bytes (256 MB).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Streaming MBOX splitter.
///
/// Reads through the file sequentially, invoking a caller-supplied callback for
/// every message boundary it finds. The parser is tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Truncated messages at EOF
/// - NUL bytes and other binary content in the body
/// - UTF-8 BOM at the start of the file
///
/// A non-empty file whose first non-blank line is not a `From ` separator is
/// rejected with [`MailError::ContainerFormat`].
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
    max_message_size: usize,
}

impl MboxParser {
    /// Create a parser for the given MBOX file.
    ///
    /// Verifies that the file exists and is readable; the format itself is
    /// checked while parsing.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| MailError::open(&path, e))?;
        Ok(Self {
            path,
            file_size: metadata.len(),
            max_message_size: MAX_MESSAGE_SIZE,
        })
    }

    /// Override the per-message size limit. Longer messages are truncated.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Parse the full MBOX, calling `message_callback` for each message found.
    ///
    /// The callback receives `(offset, raw_bytes)` and returns `true` to
    /// continue or `false` to abort early. `raw_bytes` starts with the
    /// `From ` separator line.
    ///
    /// Returns the number of messages found.
    pub fn parse(&self, message_callback: &mut dyn FnMut(u64, &[u8]) -> bool) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| MailError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut current_offset: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut message_start: u64 = 0;
        let mut prev_line_was_empty = true;
        let mut seen_separator = false;
        let mut truncated = false;

        // Reusable line buffer
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let line_len = {
                let buf = reader
                    .fill_buf()
                    .map_err(|e| MailError::io(&self.path, e))?;
                if buf.is_empty() {
                    break; // EOF
                }
                let newline_pos = memchr_newline(buf);
                let consume_len = match newline_pos {
                    Some(pos) => pos + 1,
                    None => buf.len(),
                };
                line_buf.extend_from_slice(&buf[..consume_len]);
                reader.consume(consume_len);
                consume_len as u64
            };

            let is_from_line = is_mbox_separator(&line_buf);

            if !seen_separator {
                if !is_from_line {
                    if !is_blank_line(&line_buf) {
                        return Err(MailError::ContainerFormat(self.path.clone()));
                    }
                    current_offset += line_len;
                    continue;
                }
                seen_separator = true;
            }

            if is_from_line {
                if !prev_line_was_empty {
                    warn!(
                        offset = current_offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                if !message_buf.is_empty() {
                    if !message_callback(message_start, &message_buf) {
                        return Ok(count);
                    }
                    count += 1;
                }
                message_start = current_offset;
                message_buf.clear();
                message_buf.extend_from_slice(&line_buf);
                truncated = false;
            } else if message_buf.len() + line_buf.len() <= self.max_message_size {
                message_buf.extend_from_slice(&line_buf);
            } else if !truncated {
                warn!(
                    offset = message_start,
                    max_size = self.max_message_size,
                    "Message exceeds maximum size, truncating body"
                );
                truncated = true;
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            current_offset += line_len;
        }

        // Flush last message
        if !message_buf.is_empty() && message_callback(message_start, &message_buf) {
            count += 1;
        }

        Ok(count)
    }
}

/// Parse an MBOX file, extract attachments from every message, and build
/// one row per message.
///
/// Container-level failures (missing file, not an MBOX) are logged and yield
/// empty results. A message that cannot be parsed is logged and skipped.
/// Extracted files are accumulated across all messages.
pub fn parse_mbox(
    path: impl AsRef<Path>,
    output: &dyn OutputFactory,
    max_message_size: usize,
) -> (Vec<ExtractedFile>, Vec<MetadataRecord>) {
    let path = path.as_ref();
    let parser = match MboxParser::new(path) {
        Ok(p) => p.with_max_message_size(max_message_size),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Cannot open MBOX file");
            return (Vec::new(), Vec::new());
        }
    };
    info!(path = %path.display(), "Opened MBOX file");

    extract_messages(path, |callback| parser.parse(callback), output)
}

/// Drive `split` and extract every message it yields.
///
/// If `split` fails partway, whatever was extracted before the failure is
/// still returned.
fn extract_messages(
    path: &Path,
    split: impl FnOnce(&mut dyn FnMut(u64, &[u8]) -> bool) -> Result<u64>,
    output: &dyn OutputFactory,
) -> (Vec<ExtractedFile>, Vec<MetadataRecord>) {
    let mut files: Vec<ExtractedFile> = Vec::new();
    let mut records: Vec<MetadataRecord> = Vec::new();

    let mut index: usize = 0;
    let result = split(&mut |offset, raw| {
        match process_message(index, offset, raw, output) {
            Ok((message_files, record)) => {
                files.extend(message_files);
                records.push(record);
            }
            Err(e) => {
                warn!(offset, error = %e, "Skipping message");
            }
        }
        index += 1;
        true
    });

    match result {
        Ok(count) => {
            info!(path = %path.display(), messages = count, rows = records.len(), "Parsed MBOX file");
        }
        Err(MailError::ContainerFormat(_)) => {
            error!(path = %path.display(), "Not a valid MBOX file");
        }
        Err(e) => {
            error!(
                path = %path.display(),
                error = %e,
                rows = records.len(),
                "MBOX read failed, keeping messages extracted so far"
            );
        }
    }
    (files, records)
}

/// Extract one mailbox entry.
fn process_message(
    index: usize,
    offset: u64,
    raw: &[u8],
    output: &dyn OutputFactory,
) -> Result<(Vec<ExtractedFile>, MetadataRecord)> {
    let message = mime::parse_message(raw, MessageSource::Mbox { index, offset })
        .map_err(|reason| MailError::MessageProcessing { index, reason })?;

    let attachments = message.declared_attachments();
    let files = extract_attachments(&message, output);
    let record = extract_metadata(attachments, &message);
    Ok((files, record))
}

/// Fast newline search (equivalent to memchr for `\n`).
#[inline]
fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    // Skip BOM if present at very start
    let line = if line.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &line[3..]
    } else {
        line
    };
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
