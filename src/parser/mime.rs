//! MIME message parsing: building the owned [`Part`] tree and selecting the
//! plain-text body.

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Encoding, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::warn;

use crate::model::message::{Message, MessageSource, Part};
use crate::parser::header;

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Content type assumed for parts that do not declare one.
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Parse one raw message (headers + body) into a [`Message`].
///
/// A leading MBOX `From ` line and a UTF-8 BOM are skipped. Returns the
/// reason as an error string when the bytes do not form a message.
pub fn parse_message(raw: &[u8], source: MessageSource) -> Result<Message, String> {
    let bytes = skip_from_line(raw).to_vec();
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err("message is empty".to_string());
    }

    let header_end = find_header_end(&bytes).unwrap_or(bytes.len());
    let headers = header::parse_headers(&bytes[..header_end]);
    if headers.is_empty() {
        return Err("no header fields found".to_string());
    }

    let root = {
        let parser = MessageParser::default();
        let parsed = parser
            .parse(bytes.as_slice())
            .ok_or_else(|| "MIME structure could not be parsed".to_string())?;
        parsed
            .parts
            .first()
            .map(|root| convert_part(&parsed, root, 0))
            .ok_or_else(|| "message has no body parts".to_string())?
    };

    Ok(Message::new(source, bytes, headers, root))
}

/// Convert one `mail-parser` part (and its descendants) into a [`Part`].
///
/// Text leaves keep their transfer-decoded bytes and declared charset. The
/// UTF-8 text `mail-parser` produced is only used when the raw body cannot
/// be recovered.
fn convert_part(msg: &mail_parser::Message<'_>, part: &MessagePart<'_>, depth: usize) -> Part {
    let content_type = mime_type(part);

    let node = match &part.body {
        PartType::Text(text) | PartType::Html(text) => match raw_payload(msg, part) {
            Some(bytes) => with_declared_charset(Part::leaf(content_type, bytes), part),
            None => Part::leaf(content_type, text.as_bytes().to_vec()).with_charset("utf-8"),
        },
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            with_declared_charset(Part::leaf(content_type, bytes.to_vec()), part)
        }
        PartType::Multipart(ids) => {
            let children = if depth >= MAX_DEPTH {
                warn!(depth, "Multipart nesting too deep, ignoring children");
                Vec::new()
            } else {
                ids.iter()
                    .filter_map(|&id| msg.parts.get(id))
                    .map(|child| convert_part(msg, child, depth + 1))
                    .collect()
            };
            Part::container(content_type, children)
        }
        PartType::Message(inner) => {
            let children = if depth >= MAX_DEPTH {
                warn!(depth, "Embedded message nesting too deep, ignoring it");
                Vec::new()
            } else {
                inner
                    .parts
                    .first()
                    .map(|root| vec![convert_part(inner, root, depth + 1)])
                    .unwrap_or_default()
            };
            Part::container(content_type, children)
        }
    };

    let node = match part.content_disposition() {
        Some(disposition) => node.with_disposition(disposition.ctype().to_lowercase()),
        None => node,
    };

    match part.attachment_name() {
        Some(name) => node.with_filename(name),
        None => node,
    }
}

/// Body bytes of a leaf with only the Content-Transfer-Encoding undone.
fn raw_payload(msg: &mail_parser::Message<'_>, part: &MessagePart<'_>) -> Option<Vec<u8>> {
    let body = msg.raw_message.get(part.offset_body..part.offset_end)?;
    if part.is_encoding_problem {
        return Some(body.to_vec());
    }
    match part.encoding {
        Encoding::Base64 => base64_decode(body),
        Encoding::QuotedPrintable => quoted_printable_decode(body),
        Encoding::None => Some(body.to_vec()),
    }
}

fn with_declared_charset(leaf: Part, part: &MessagePart<'_>) -> Part {
    match part.content_type().and_then(|ct| ct.attribute("charset")) {
        Some(charset) => leaf.with_charset(charset),
        None => leaf,
    }
}

/// Lowercase `maintype/subtype` of a part, or the default when undeclared.
fn mime_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .and_then(|ct| {
            ct.subtype()
                .map(|sub| format!("{}/{}", ct.ctype(), sub).to_lowercase())
        })
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Decode a leaf payload to text using its charset (UTF-8 by default).
///
/// Undecodable sequences become U+FFFD; this never fails.
pub fn decode_payload(part: &Part) -> String {
    let bytes = part.payload().unwrap_or_default();
    header::decode_charset(part.charset.as_deref().unwrap_or("utf-8"), bytes)
}

/// Return the canonical plain-text body of a message.
///
/// Single-part messages decode their only payload. Multipart messages
/// return the first `text/plain` leaf in document order, or an empty string
/// when there is none.
pub fn extract_body(message: &Message) -> String {
    if !message.is_multipart() {
        return decode_payload(message.root());
    }

    message
        .walk()
        .find(|p| !p.is_container() && p.content_type == "text/plain")
        .map(decode_payload)
        .unwrap_or_default()
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    // Handle BOM
    let data = if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    };

    if data.starts_with(b"From ") {
        // Find end of line
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    // Look for \n\n or \r\n\r\n
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i);
        }
    }
    None
}
