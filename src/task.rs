//! One unit of work: turn a list of input files into CSV and attachment
//! outputs.
//!
//! Each supported input produces exactly one CSV (one row per message) plus
//! any extracted attachments. Failures are contained per input; the task as a
//! whole fails only when nothing at all was produced.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Config;
use crate::error::{MailError, Result};
use crate::export::csv::write_records;
use crate::export::output::OutputFactory;
use crate::model::output::ExtractedFile;
use crate::model::record::{MetadataRecord, CSV_HEADERS};
use crate::parser::{eml, mbox};

/// An input file handed to the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    /// Name used for the CSV output.
    pub display_name: String,
    /// Lowercase extension without the dot.
    pub extension: String,
}

impl InputFile {
    /// Describe a file on disk, deriving display name and extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            display_name,
            extension,
        }
    }
}

/// The container format an input is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Eml,
    Mbox,
}

impl InputKind {
    fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "eml" => Some(Self::Eml),
            "mbox" => Some(Self::Mbox),
            _ => None,
        }
    }
}

/// Outputs of a finished task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// CSV files first for each input, followed by its attachments.
    pub output_files: Vec<ExtractedFile>,
    /// Summary counters.
    pub meta: TaskMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMeta {
    pub inputs_processed: usize,
    pub inputs_skipped: usize,
    pub messages: usize,
    pub attachments: usize,
}

/// Route an input to a parser, or explain why it is not supported.
pub fn route(input: &InputFile, config: &Config) -> Result<InputKind> {
    let extension = input.extension.to_lowercase();
    let unsupported = || MailError::UnsupportedInput {
        path: input.path.clone(),
        extension: extension.clone(),
    };
    if !config.extraction.is_supported(&extension) {
        return Err(unsupported());
    }
    InputKind::from_extension(&extension).ok_or_else(unsupported)
}

/// Process every input and collect the produced files.
///
/// Unsupported inputs are skipped, unparseable single-message inputs are
/// logged and skipped, and an empty overall result is an error.
pub fn run(inputs: &[InputFile], output: &dyn OutputFactory, config: &Config) -> Result<TaskResult> {
    let mut output_files: Vec<ExtractedFile> = Vec::new();
    let mut meta = TaskMeta::default();

    for input in inputs {
        let kind = match route(input, config) {
            Ok(kind) => kind,
            Err(e) => {
                info!(error = %e, "Skipping file");
                meta.inputs_skipped += 1;
                continue;
            }
        };

        info!(path = %input.path.display(), kind = ?kind, "Processing file");
        let (attachments, records) = match kind {
            InputKind::Mbox => mbox::parse_mbox(
                &input.path,
                output,
                config.extraction.max_message_size,
            ),
            InputKind::Eml => match eml::parse_eml(&input.path, output) {
                Ok((files, record)) => (files, vec![record]),
                Err(e) => {
                    error!(path = %input.path.display(), error = %e, "Failed to parse EML file");
                    meta.inputs_skipped += 1;
                    continue;
                }
            },
        };

        match write_csv(input, &records, output, config) {
            Ok(csv_file) => output_files.push(csv_file),
            Err(e) => {
                error!(path = %input.path.display(), error = %e, "Failed to write CSV");
            }
        }

        meta.inputs_processed += 1;
        meta.messages += records.len();
        meta.attachments += attachments.len();
        output_files.extend(attachments);
    }

    if output_files.is_empty() {
        return Err(MailError::NoOutput {
            supported: config.extraction.supported_extensions.join(", "),
        });
    }

    Ok(TaskResult { output_files, meta })
}

fn write_csv(
    input: &InputFile,
    records: &[MetadataRecord],
    output: &dyn OutputFactory,
    config: &Config,
) -> Result<ExtractedFile> {
    let csv_file = output.allocate(&input.display_name, "csv", "csv")?;
    write_records(records, &CSV_HEADERS, &csv_file.path, config.csv.write_bom)?;
    Ok(csv_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::output::DirectoryOutput;

    #[test]
    fn test_input_from_path() {
        let input = InputFile::from_path("/data/Inbox.MBOX");
        assert_eq!(input.display_name, "Inbox.MBOX");
        assert_eq!(input.extension, "mbox");
    }

    #[test]
    fn test_route() {
        let config = Config::default();
        assert_eq!(route(&InputFile::from_path("a.eml"), &config).unwrap(), InputKind::Eml);
        assert_eq!(route(&InputFile::from_path("a.mbox"), &config).unwrap(), InputKind::Mbox);
        assert!(matches!(
            route(&InputFile::from_path("a.pst"), &config),
            Err(MailError::UnsupportedInput { .. })
        ));
    }

    #[test]
    fn test_route_respects_configured_extensions() {
        let mut config = Config::default();
        config.extraction.supported_extensions = vec!["eml".to_string()];
        assert!(route(&InputFile::from_path("a.mbox"), &config).is_err());
    }

    #[test]
    fn test_all_unsupported_is_no_output() {
        let tmp = tempfile::tempdir().unwrap();
        let out = DirectoryOutput::new(tmp.path()).unwrap();
        let inputs = vec![InputFile::from_path("notes.txt")];
        let err = run(&inputs, &out, &Config::default()).unwrap_err();
        assert!(matches!(err, MailError::NoOutput { .. }));
    }

    #[test]
    fn test_partial_success_returns_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let eml = tmp.path().join("ok.eml");
        std::fs::write(&eml, b"From: a@example.com\nSubject: Hi\n\nBody\n").unwrap();
        let bad = tmp.path().join("bad.eml");
        std::fs::write(&bad, b"no headers at all").unwrap();
        let out = DirectoryOutput::new(tmp.path().join("out")).unwrap();

        let inputs = vec![
            InputFile::from_path(&bad),
            InputFile::from_path("skip.doc"),
            InputFile::from_path(&eml),
        ];
        let result = run(&inputs, &out, &Config::default()).unwrap();
        assert_eq!(result.output_files.len(), 1);
        assert_eq!(result.output_files[0].display_name, "ok.eml");
        assert_eq!(result.output_files[0].extension, "csv");
        assert_eq!(result.meta.inputs_processed, 1);
        assert_eq!(result.meta.inputs_skipped, 2);
        assert_eq!(result.meta.messages, 1);
    }
}
