//! `mailsift` — extract timeline metadata and attachments from email archives.
//!
//! Given an `.eml` or `.mbox` file, the library produces one CSV row per
//! message (see [`model::record::CSV_HEADERS`]) and writes every attachment
//! or inline file to an output directory, named after the message it came
//! from.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod parser;
pub mod task;
