//! Filesystem-safe filenames.

/// Characters that are invalid in filenames on at least one common platform.
const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace every character in `< > : " / \ | ? *` with `_`.
///
/// Everything else, including Unicode, dots and spaces, is kept. The output
/// has the same number of characters as the input.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect()
}
