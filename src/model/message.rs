//! Parsed email messages and their MIME part trees.
//!
//! A [`Message`] owns its raw bytes, its unfolded top-level headers and the
//! root [`Part`] of its content tree. The same type is produced for a bare
//! `.eml` file and for every entry of an MBOX file; only [`MessageSource`]
//! tells them apart.

use sha2::{Digest, Sha256};

/// Where a [`Message`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// A single-message file.
    Eml,
    /// One entry of a mailbox file.
    Mbox {
        /// Position within the mailbox (0, 1, 2, …).
        index: usize,
        /// Byte offset of the `From ` separator line.
        offset: u64,
    },
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eml => write!(f, "eml"),
            Self::Mbox { index, offset } => write!(f, "mbox message {index} at byte {offset}"),
        }
    }
}

/// One parsed email.
#[derive(Debug, Clone)]
pub struct Message {
    source: MessageSource,
    raw: Vec<u8>,
    headers: Vec<(String, String)>,
    root: Part,
}

impl Message {
    /// Assemble a message from already-parsed pieces.
    ///
    /// `headers` are `(lowercase_name, value)` pairs in file order.
    pub fn new(
        source: MessageSource,
        raw: Vec<u8>,
        headers: Vec<(String, String)>,
        root: Part,
    ) -> Self {
        Self {
            source,
            raw,
            headers,
            root,
        }
    }

    /// Where this message was read from.
    pub fn source(&self) -> MessageSource {
        self.source
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Lowercase `maintype/subtype` of the top-level part.
    pub fn content_type(&self) -> &str {
        &self.root.content_type
    }

    pub fn is_multipart(&self) -> bool {
        self.root.is_container()
    }

    pub fn root(&self) -> &Part {
        &self.root
    }

    /// Depth-first, document-order walk over every part, root included.
    pub fn walk(&self) -> Walk<'_> {
        self.root.walk()
    }

    /// Filenames of every leaf part that declares one, in document order.
    ///
    /// This is independent of whether the part is later extracted.
    pub fn declared_attachments(&self) -> Vec<String> {
        self.walk()
            .filter_map(|p| p.filename().map(str::to_string))
            .collect()
    }

    /// Short hex digest of the raw bytes.
    ///
    /// Stable for identical input bytes; other implementations agree only if
    /// they hash the same bytes the same way.
    pub fn content_digest(&self, len: usize) -> String {
        let digest = Sha256::digest(&self.raw);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        hex.chars().take(len).collect()
    }
}

/// Payload of a [`Part`]: either leaf bytes or child parts.
#[derive(Debug, Clone, PartialEq)]
pub enum PartBody {
    /// Transfer-decoded payload bytes.
    Leaf(Vec<u8>),
    /// A `multipart/*` or `message/rfc822` node.
    Container(Vec<Part>),
}

/// One node in a message's content tree.
///
/// Containers never carry a filename or a payload; [`Part::filename`] and
/// [`Part::payload`] return `None` for them regardless of what was set.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// Lowercase `maintype/subtype`, `text/plain` when undeclared.
    pub content_type: String,
    /// Disposition type (`attachment`, `inline`, …) if a header was present.
    pub disposition: Option<String>,
    /// Charset the leaf payload bytes are encoded in.
    pub charset: Option<String>,
    filename: Option<String>,
    body: PartBody,
}

impl Part {
    pub fn leaf(content_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            disposition: None,
            charset: None,
            filename: None,
            body: PartBody::Leaf(payload.into()),
        }
    }

    pub fn container(content_type: impl Into<String>, children: Vec<Part>) -> Self {
        Self {
            content_type: content_type.into(),
            disposition: None,
            charset: None,
            filename: None,
            body: PartBody::Container(children),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        if !self.is_container() {
            self.filename = Some(filename.into());
        }
        self
    }

    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = Some(disposition.into());
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Main type (`text` for `text/plain`).
    pub fn maintype(&self) -> &str {
        self.content_type
            .split('/')
            .next()
            .unwrap_or(&self.content_type)
    }

    pub fn is_container(&self) -> bool {
        matches!(self.body, PartBody::Container(_))
    }

    /// Non-empty filename of a leaf part.
    pub fn filename(&self) -> Option<&str> {
        match self.body {
            PartBody::Leaf(_) => self.filename.as_deref().filter(|f| !f.is_empty()),
            PartBody::Container(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match &self.body {
            PartBody::Leaf(bytes) => Some(bytes),
            PartBody::Container(_) => None,
        }
    }

    pub fn children(&self) -> &[Part] {
        match &self.body {
            PartBody::Leaf(_) => &[],
            PartBody::Container(children) => children,
        }
    }

    /// Depth-first, document-order walk starting with `self`.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`Part::walk`] and [`Message::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children().iter().rev());
        Some(part)
    }
}
