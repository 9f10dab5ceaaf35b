//! Per-message extraction: filename sanitizing, attachment persistence, and
//! metadata rows.

pub mod attachment;
pub mod metadata;
pub mod sanitize;
