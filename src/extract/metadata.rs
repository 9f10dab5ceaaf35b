//! Build the metadata row for one message.

use crate::model::message::Message;
use crate::model::record::{MetadataRecord, MESSAGE_LABEL, TIMESTAMP_DESC};
use crate::parser::header::normalize_timestamp;
use crate::parser::mime::extract_body;

/// Assemble the [`MetadataRecord`] for `message`.
///
/// `attachments` is the caller's list of declared attachment filenames and is
/// stored as given.
pub fn extract_metadata(attachments: Vec<String>, message: &Message) -> MetadataRecord {
    let header = |name: &str| message.header(name).map(str::to_string);
    let date = header("Date");

    MetadataRecord {
        timestamp: normalize_timestamp(date.as_deref()),
        timestamp_desc: TIMESTAMP_DESC.to_string(),
        message: MESSAGE_LABEL.to_string(),
        to: header("To"),
        from: header("From"),
        bcc: header("Bcc"),
        cc: header("Cc"),
        subject: header("Subject"),
        message_id: header("Message-ID").unwrap_or_default(),
        date,
        content_type: message.content_type().to_string(),
        attachments,
        user_agent: header("User-Agent"),
        body: extract_body(message),
    }
}
