//! RFC 5322 header handling: folding, encoded-words (RFC 2047), and date
//! normalization.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

/// Parse a raw header block into `(lowercase_name, decoded_value)` pairs.
///
/// Folded lines are joined and RFC 2047 encoded-words are resolved. Order and
/// duplicates are preserved so that lookups can return the first occurrence.
pub fn parse_headers(raw_headers: &[u8]) -> Vec<(String, String)> {
    let text = decode_header_bytes(raw_headers);
    unfold_headers(&text)
        .into_iter()
        .map(|(name, value)| {
            let decoded = decode_encoded_words(&value);
            (name, decoded)
        })
        .collect()
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to ISO-8859-1 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    };

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation line
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // If the gap between two encoded words is only whitespace, skip it (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_uppercase().as_str() {
        "B" => {
            use std::io::Read;
            let mut decoder = base64_decode_reader(encoded_text.as_bytes());
            let mut buf = Vec::new();
            decoder.read_to_end(&mut buf).ok()?;
            buf
        }
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    let text = decode_charset(charset, &bytes);

    Some(DecodedWord {
        text,
        consumed: total_consumed,
    })
}

/// Minimal base64 decoder (reads from a byte slice).
fn base64_decode_reader(input: &[u8]) -> impl std::io::Read + '_ {
    struct Base64Reader<'a> {
        input: &'a [u8],
        pos: usize,
        buf: [u8; 3],
        buf_len: usize,
        buf_pos: usize,
    }

    impl<'a> std::io::Read for Base64Reader<'a> {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            let mut written = 0;
            while written < out.len() {
                if self.buf_pos < self.buf_len {
                    out[written] = self.buf[self.buf_pos];
                    self.buf_pos += 1;
                    written += 1;
                    continue;
                }
                // Decode next 4-char block
                let mut quad = [0u8; 4];
                let mut qi = 0;
                while qi < 4 {
                    if self.pos >= self.input.len() {
                        if qi == 0 {
                            return Ok(written);
                        }
                        // Pad remaining
                        while qi < 4 {
                            quad[qi] = b'=';
                            qi += 1;
                        }
                        break;
                    }
                    let b = self.input[self.pos];
                    self.pos += 1;
                    if b == b' ' || b == b'\n' || b == b'\r' || b == b'\t' {
                        continue;
                    }
                    quad[qi] = b;
                    qi += 1;
                }
                let vals: [u8; 4] = quad.map(b64val);
                self.buf[0] = (vals[0] << 2) | (vals[1] >> 4);
                self.buf[1] = (vals[1] << 4) | (vals[2] >> 2);
                self.buf[2] = (vals[2] << 6) | vals[3];
                self.buf_len = if quad[3] == b'=' {
                    if quad[2] == b'=' {
                        1
                    } else {
                        2
                    }
                } else {
                    3
                };
                self.buf_pos = 0;
            }
            Ok(written)
        }
    }

    fn b64val(c: u8) -> u8 {
        match c {
            b'A'..=b'Z' => c - b'A',
            b'a'..=b'z' => c - b'a' + 26,
            b'0'..=b'9' => c - b'0' + 52,
            b'+' => 62,
            b'/' => 63,
            _ => 0,
        }
    }

    Base64Reader {
        input,
        pos: 0,
        buf: [0; 3],
        buf_len: 0,
        buf_pos: 0,
    }
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(
                    std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("00"),
                    16,
                ) {
                    result.push(byte);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset, replacing invalid sequences.
pub(crate) fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let charset_lower = charset.to_lowercase();
    match charset_lower.as_str() {
        "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

/// A `Date` header value after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDate {
    /// The header carried a usable zone offset.
    Zoned(DateTime<FixedOffset>),
    /// No zone, an unrecognized zone name, or the RFC 5322 "unknown zone"
    /// marker `-0000`.
    Naive(NaiveDateTime),
}

const ZONED_FORMATS: [&str; 2] = ["%d %b %Y %H:%M:%S %z", "%d %b %Y %H:%M %z"];
const NAIVE_FORMATS: [&str; 2] = ["%d %b %Y %H:%M:%S", "%d %b %Y %H:%M"];

/// Parse an RFC 2822-style date header.
///
/// The day-of-week is ignored rather than validated, parenthesized comments
/// such as `(PDT)` are dropped, and common zone names are mapped to offsets.
pub fn parse_header_date(date_str: &str) -> Option<HeaderDate> {
    let without_comments = strip_comments(date_str);
    let collapsed = without_comments.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let no_dow = expand_short_year(&strip_day_of_week(&collapsed));

    if let Some(local) = no_dow.strip_suffix(" -0000") {
        return parse_naive(local).map(HeaderDate::Naive);
    }

    let zoned = replace_named_tz(&no_dow);
    for fmt in &ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, fmt) {
            return Some(HeaderDate::Zoned(dt));
        }
    }

    // An unrecognized zone name carries no offset.
    let local = match no_dow.rsplit_once(' ') {
        Some((head, zone)) if zone.chars().all(|c| c.is_ascii_alphabetic()) => head,
        _ => no_dow.as_str(),
    };
    parse_naive(local).map(HeaderDate::Naive)
}

/// Expand a two-digit year (`15 Jul 24 ...`): 69-99 map to 19xx, 00-68 to
/// 20xx.
fn expand_short_year(s: &str) -> String {
    let tokens: Vec<&str> = s.split(' ').collect();
    let yy = match tokens.get(2) {
        Some(year) if year.len() <= 2 && year.bytes().all(|b| b.is_ascii_digit()) => {
            match year.parse::<u32>() {
                Ok(yy) => yy,
                Err(_) => return s.to_string(),
            }
        }
        _ => return s.to_string(),
    };
    let year = if yy > 68 { 1900 + yy } else { 2000 + yy };
    let mut expanded = tokens[..2].join(" ");
    expanded.push_str(&format!(" {year}"));
    for token in &tokens[3..] {
        expanded.push(' ');
        expanded.push_str(token);
    }
    expanded
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Convert a `Date` header to ISO-8601.
///
/// Zoned dates are converted to UTC and rendered with a `+00:00` suffix;
/// zone-less dates are rendered as-is without an offset. Missing, empty and
/// unparseable values all yield `None`.
pub fn normalize_timestamp(date_str: Option<&str>) -> Option<String> {
    let raw = date_str?;
    if raw.trim().is_empty() {
        return None;
    }
    match parse_header_date(raw) {
        Some(HeaderDate::Zoned(dt)) => Some(
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, false),
        ),
        Some(HeaderDate::Naive(ndt)) => Some(ndt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        None => {
            debug!(date = raw, "Could not parse date");
            None
        }
    }
}

/// Remove `( … )` comments, honoring nesting.
fn strip_comments(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => result.push(ch),
            _ => {}
        }
    }
    result
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = [
        "Mon,", "Tue,", "Wed,", "Thu,", "Fri,", "Sat,", "Sun,", "Mon ", "Tue ", "Wed ", "Thu ",
        "Fri ", "Sat ", "Sun ",
    ];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    // Longer names first so "CEST" is not matched as "EST".
    let tzs = [
        ("CEST", "+0200"),
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("JST", "+0900"),
        ("UT", "+0000"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
