//! Email parsing: MBOX splitting, EML reading, header decoding, and the MIME part tree.

pub mod eml;
pub mod header;
pub mod mbox;
pub mod mime;
