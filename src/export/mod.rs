//! Output side: CSV serialization and output-file allocation.

pub mod csv;
pub mod output;
