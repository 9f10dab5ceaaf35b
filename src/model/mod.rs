//! Core data model types: messages and their part trees, metadata rows, and
//! extracted-file descriptors.

pub mod message;
pub mod output;
pub mod record;
