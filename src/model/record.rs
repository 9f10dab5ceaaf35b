//! Flat per-message metadata row, ready for timeline ingestion.

use serde::{Deserialize, Serialize};

/// Constant `Timestamp_desc` value.
pub const TIMESTAMP_DESC: &str = "Email received";

/// Constant `Message` value.
pub const MESSAGE_LABEL: &str = "Email message";

/// CSV column order.
pub const CSV_HEADERS: [&str; 14] = [
    "Timestamp",
    "Timestamp_desc",
    "Message",
    "To",
    "From",
    "Bcc",
    "Cc",
    "Subject",
    "Message-ID",
    "Date",
    "Content-Type",
    "Attachments",
    "User-Agent",
    "Body",
];

/// One CSV row describing one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// ISO-8601 form of the `Date` header (UTC when it had a zone).
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
    #[serde(rename = "Timestamp_desc")]
    pub timestamp_desc: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "Bcc")]
    pub bcc: Option<String>,
    #[serde(rename = "Cc")]
    pub cc: Option<String>,
    #[serde(rename = "Subject")]
    pub subject: Option<String>,
    #[serde(rename = "Message-ID")]
    pub message_id: String,
    /// Raw `Date` header.
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Content-Type")]
    pub content_type: String,
    /// Declared attachment filenames, in document order.
    #[serde(rename = "Attachments")]
    pub attachments: Vec<String>,
    #[serde(rename = "User-Agent")]
    pub user_agent: Option<String>,
    #[serde(rename = "Body")]
    pub body: String,
}

impl MetadataRecord {
    /// String value of the column named `header`.
    ///
    /// Absent values and unknown column names yield an empty string. The
    /// attachment list is rendered as a JSON array.
    pub fn field(&self, header: &str) -> String {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        match header {
            "Timestamp" => opt(&self.timestamp),
            "Timestamp_desc" => self.timestamp_desc.clone(),
            "Message" => self.message.clone(),
            "To" => opt(&self.to),
            "From" => opt(&self.from),
            "Bcc" => opt(&self.bcc),
            "Cc" => opt(&self.cc),
            "Subject" => opt(&self.subject),
            "Message-ID" => self.message_id.clone(),
            "Date" => opt(&self.date),
            "Content-Type" => self.content_type.clone(),
            "Attachments" => serde_json::to_string(&self.attachments).unwrap_or_default(),
            "User-Agent" => opt(&self.user_agent),
            "Body" => self.body.clone(),
            _ => String::new(),
        }
    }

    /// Values for `headers`, in order.
    pub fn to_row(&self, headers: &[&str]) -> Vec<String> {
        headers.iter().map(|h| self.field(h)).collect()
    }
}
