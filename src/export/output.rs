//! Output-file allocation.
//!
//! Parsers never choose final paths themselves: they ask an
//! [`OutputFactory`] for a file with a logical display name, extension and
//! data type, and write bytes to whatever path comes back.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MailError, Result};
use crate::extract::sanitize::sanitize_filename;
use crate::model::output::ExtractedFile;

/// Allocates output files for a task.
pub trait OutputFactory {
    /// Reserve a new file for `display_name` and return its descriptor.
    fn allocate(&self, display_name: &str, extension: &str, data_type: &str)
        -> Result<ExtractedFile>;

    /// Write `data` to an allocated file, replacing any previous content.
    fn write(&self, file: &ExtractedFile, data: &[u8]) -> Result<()> {
        let mut handle = std::fs::File::create(&file.path)
            .map_err(|e| MailError::io(&file.path, e))?;
        handle
            .write_all(data)
            .map_err(|e| MailError::io(&file.path, e))
    }
}

/// Writes every output into one flat directory.
///
/// Files are named `{display_name}.{extension}` after sanitizing; a counter
/// is appended when that name is already taken.
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
    dir: PathBuf,
}

impl DirectoryOutput {
    /// Use `dir` as the output directory, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| MailError::io(&dir, e))?;
        Ok(Self { dir })
    }
}

impl OutputFactory for DirectoryOutput {
    fn allocate(
        &self,
        display_name: &str,
        extension: &str,
        data_type: &str,
    ) -> Result<ExtractedFile> {
        let stem = sanitize_filename(display_name);
        let stem = truncate_bytes(&stem, MAX_STEM_BYTES);
        let ext = sanitize_filename(extension);
        let ext = truncate_bytes(&ext, MAX_EXTENSION_BYTES);
        let file_name = if ext.is_empty() {
            stem.to_string()
        } else {
            format!("{stem}.{ext}")
        };
        let path = reserve_path(&self.dir.join(file_name))?;

        Ok(ExtractedFile {
            display_name: display_name.to_string(),
            extension: extension.to_string(),
            data_type: data_type.to_string(),
            path,
        })
    }
}

/// Longest on-disk stem, leaving room for a `_N` counter and the extension
/// under the usual 255-byte file name limit.
const MAX_STEM_BYTES: usize = 200;
const MAX_EXTENSION_BYTES: usize = 32;

/// Cut `s` to at most `max` bytes without splitting a character.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Create `path` exclusively, or the first free `{stem}_{n}.{ext}` sibling.
///
/// The empty file is left on disk so that later allocations see it as taken.
fn reserve_path(path: &Path) -> Result<PathBuf> {
    if try_create(path)? {
        return Ok(path.to_path_buf());
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..10_000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if try_create(&candidate)? {
            return Ok(candidate);
        }
    }

    Err(MailError::io(
        path,
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "no free file name available",
        ),
    ))
}

/// `Ok(false)` when the file already exists.
fn try_create(path: &Path) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(MailError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_names_file_after_display_name() {
        let tmp = tempfile::tempdir().unwrap();
        let out = DirectoryOutput::new(tmp.path()).unwrap();
        let file = out.allocate("report._id_", "txt", "txt").unwrap();
        assert_eq!(file.display_name, "report._id_");
        assert_eq!(file.extension, "txt");
        assert_eq!(file.path, tmp.path().join("report._id_.txt"));
        assert!(file.path.exists());
    }

    #[test]
    fn test_allocate_avoids_collisions() {
        let tmp = tempfile::tempdir().unwrap();
        let out = DirectoryOutput::new(tmp.path()).unwrap();
        let first = out.allocate("a", "csv", "csv").unwrap();
        let second = out.allocate("a", "csv", "csv").unwrap();
        assert_ne!(first.path, second.path);
        assert_eq!(second.path, tmp.path().join("a_1.csv"));
    }

    #[test]
    fn test_allocate_without_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let out = DirectoryOutput::new(tmp.path()).unwrap();
        let file = out.allocate("README.<id>", "", "").unwrap();
        assert_eq!(file.path, tmp.path().join("README._id_"));
    }

    #[test]
    fn test_allocate_cannot_escape_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = DirectoryOutput::new(tmp.path()).unwrap();
        let file = out.allocate("../../evil", "sh", "sh").unwrap();
        assert_eq!(file.path.parent(), Some(tmp.path()));
    }

    #[test]
    fn test_write_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let out = DirectoryOutput::new(tmp.path()).unwrap();
        let file = out.allocate("data", "bin", "bin").unwrap();
        out.write(&file, &[1, 2, 3]).unwrap();
        assert_eq!(std::fs::read(&file.path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_long_display_name_is_capped_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let out = DirectoryOutput::new(tmp.path()).unwrap();
        let display_name = format!("{}._{}@example.com_", "é".repeat(150), "x".repeat(200));

        let file = out.allocate(&display_name, "txt", "txt").unwrap();
        assert_eq!(file.display_name, display_name);
        let on_disk = file.path.file_name().unwrap().to_str().unwrap();
        assert!(on_disk.len() <= 255);
        assert!(on_disk.starts_with("éé"));
        assert!(on_disk.ends_with(".txt"));
        assert!(file.path.exists());

        let second = out.allocate(&display_name, "txt", "txt").unwrap();
        assert_ne!(second.path, file.path);
        assert!(second.path.file_name().unwrap().len() <= 255);
    }

    #[test]
    fn test_truncate_bytes_respects_char_boundaries() {
        assert_eq!(truncate_bytes("abc", 10), "abc");
        assert_eq!(truncate_bytes("aé", 2), "a");
        assert_eq!(truncate_bytes("aéb", 3), "aé");
    }
}
