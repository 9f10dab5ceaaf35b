//! Descriptors of files written to the output directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A file allocated by an [`OutputFactory`](crate::export::output::OutputFactory).
///
/// The core only writes bytes to `path`; the file itself belongs to the
/// caller once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFile {
    /// Logical name without extension (e.g. `report.<message-id>`).
    pub display_name: String,
    /// Extension without the dot; may be empty.
    pub extension: String,
    /// Data-type tag for downstream consumers.
    pub data_type: String,
    /// Concrete filesystem location.
    pub path: PathBuf,
}

impl ExtractedFile {
    /// Plain mapping form for task results.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "display_name": self.display_name,
            "extension": self.extension,
            "data_type": self.data_type,
            "path": self.path.display().to_string(),
        })
    }
}
