//! Path Sanitizer
//!
//! Normalizes raw path strings into the canonical comparable form used by the index.
//! Storage always uses the ASCII-safe form; non-ASCII characters are kept as lowercase
//! percent escapes of their UTF-8 bytes so that the display form can be recovered.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Encoding policy for sanitized paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// ASCII-safe form; the only form written to the store
    #[default]
    Ascii,
    /// UTF-8 passthrough for display
    Utf8,
}

/// Sanitize a raw path into canonical form.
///
/// Leading, trailing and duplicate slashes are dropped; an empty result means the root
/// path. The function never fails and `sanitize(sanitize(x, e), e) == sanitize(x, e)`.
pub fn sanitize(raw: &str, encoding: Encoding) -> String {
    raw.split('/')
        .filter_map(|segment| sanitize_segment(segment, encoding))
        .collect::<Vec<_>>()
        .join("/")
}

/// Sanitize one path segment. Returns `None` for segments that vanish.
pub fn sanitize_segment(raw: &str, encoding: Encoding) -> Option<String> {
    let source = match encoding {
        Encoding::Ascii => raw.to_string(),
        Encoding::Utf8 => decode_escapes(raw),
    };
    let normalized: String = source.to_lowercase().nfc().collect();

    let mut out = String::with_capacity(normalized.len());
    let bytes = normalized.as_bytes();
    let mut i = 0;
    while i < normalized.len() {
        if escape_at(bytes, i).is_some() {
            out.push('%');
            out.push(bytes[i + 1].to_ascii_lowercase() as char);
            out.push(bytes[i + 2].to_ascii_lowercase() as char);
            i += 3;
            continue;
        }
        let c = match normalized[i..].chars().next() {
            Some(c) => c,
            None => break,
        };
        i += c.len_utf8();

        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            out.push(c);
        } else if c.is_ascii() || c.is_whitespace() {
            out.push('-');
        } else {
            match encoding {
                Encoding::Utf8 => out.push(c),
                Encoding::Ascii => {
                    let mut buf = [0u8; 4];
                    let encoded = urlencoding::encode(c.encode_utf8(&mut buf));
                    out.push_str(&encoded.to_ascii_lowercase());
                }
            }
        }
    }

    let collapsed = collapse_dashes(&out);
    let trimmed = collapsed.trim_matches('-');
    match trimmed {
        "" | "." | ".." => None,
        segment => Some(segment.to_string()),
    }
}

/// First sanitized segment of a path, if any.
pub fn first_segment(raw: &str, encoding: Encoding) -> Option<String> {
    raw.split('/')
        .find_map(|segment| sanitize_segment(segment, encoding))
}

/// Process-wide sanitizer carrying the configured display encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct PathSanitizer {
    display: Encoding,
}

impl PathSanitizer {
    pub fn new(display: Encoding) -> Self {
        Self { display }
    }

    pub fn display_encoding(&self) -> Encoding {
        self.display
    }

    /// Storage (ASCII-safe) form of a caller-supplied path.
    pub fn storage(&self, raw: &str) -> String {
        sanitize(raw, Encoding::Ascii)
    }

    /// Display form of a stored path, per the configured encoding.
    pub fn display(&self, stored: &str) -> String {
        sanitize(stored, self.display)
    }

    /// Storage form of a single name segment. Slashes inside the name become dashes.
    pub fn segment(&self, raw: &str) -> Option<String> {
        sanitize_segment(raw, Encoding::Ascii)
    }
}

fn collapse_dashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dash = false;
    for c in input.chars() {
        if c == '-' {
            if !prev_dash {
                out.push(c);
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }
    out
}

/// Byte value of a `%xx` escape starting at `i`, if one is there.
fn escape_at(bytes: &[u8], i: usize) -> Option<u8> {
    if i + 2 >= bytes.len() {
        return None;
    }
    if bytes[i] != b'%' || !bytes[i + 1].is_ascii_hexdigit() || !bytes[i + 2].is_ascii_hexdigit() {
        return None;
    }
    let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
    u8::from_str_radix(hex, 16).ok()
}

/// Decode runs of escapes that spell non-ASCII UTF-8 text. ASCII escapes and
/// malformed runs are left untouched.
fn decode_escapes(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let mut end = i;
        while let Some(byte) = escape_at(bytes, end) {
            if byte < 0x80 {
                break;
            }
            end += 3;
        }
        if end > i {
            let run = urlencoding::decode_binary(&bytes[i..end]);
            match std::str::from_utf8(&run) {
                Ok(text) => {
                    out.push_str(text);
                    i = end;
                }
                Err(err) if err.valid_up_to() > 0 => {
                    out.push_str(&String::from_utf8_lossy(&run[..err.valid_up_to()]));
                    i += err.valid_up_to() * 3;
                }
                Err(_) => {
                    out.push_str(&raw[i..i + 3]);
                    i += 3;
                }
            }
            continue;
        }
        let len = raw[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        out.push_str(&raw[i..i + len]);
        i += len;
    }
    out
}
