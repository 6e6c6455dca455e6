//! Java-style string escaping
//!
//! [`Escape`] turns a line into printable ASCII: quotes and backslashes are
//! backslash-escaped, the common control characters use their short forms
//! (`\b \t \n \f \r`), other control characters and everything above U+007F
//! become `\uXXXX` UTF-16 code units in uppercase hex. [`Unescape`] is the
//! exact inverse on any output of [`Escape`] and additionally accepts `\'`
//! and octal escapes (`\0` to `\377`).
//!
//! Unescaping is lenient: a backslash before a character with no escape
//! meaning is dropped (`\q` becomes `q`, a trailing `\` disappears) and
//! unpaired surrogates decode to U+FFFD. Only a `\u` without four hex digits
//! is an error.

use super::LineTransform;
use crate::error::{TransformError, TransformResult};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Escape;

impl LineTransform for Escape {
    fn apply(&self, _line_no: usize, line: &str) -> TransformResult<String> {
        Ok(escape(line))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unescape;

impl LineTransform for Unescape {
    fn apply(&self, _line_no: usize, line: &str) -> TransformResult<String> {
        unescape(line)
    }
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7f => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    // Writing to a String cannot fail.
                    let _ = write!(out, "\\u{:04X}", unit);
                }
            }
            c => out.push(c),
        }
    }
    out
}

pub fn unescape(input: &str) -> TransformResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut pending = Utf16Run::default();
    let bytes = input.as_bytes();
    let mut pos = 0;

    while pos < input.len() {
        if bytes[pos] != b'\\' {
            pending.flush(&mut out);
            // Copy the unescaped run up to the next backslash in one go.
            let end = input[pos..]
                .find('\\')
                .map_or(input.len(), |offset| pos + offset);
            out.push_str(&input[pos..end]);
            pos = end;
            continue;
        }

        let Some(&marker) = bytes.get(pos + 1) else {
            break;
        };

        if marker == b'u' {
            let (unit, end) = parse_unicode(input, pos)?;
            pending.units.push(unit);
            pos = end;
            continue;
        }

        pending.flush(&mut out);
        let simple = match marker {
            b'\\' => Some('\\'),
            b'"' => Some('"'),
            b'\'' => Some('\''),
            b'b' => Some('\u{8}'),
            b't' => Some('\t'),
            b'n' => Some('\n'),
            b'f' => Some('\u{c}'),
            b'r' => Some('\r'),
            _ => None,
        };

        if let Some(c) = simple {
            out.push(c);
            pos += 2;
        } else if (b'0'..=b'7').contains(&marker) {
            let (c, end) = parse_octal(bytes, pos);
            out.push(c);
            pos = end;
        } else {
            // Stray backslash; the next character is copied as-is.
            pos += 1;
        }
    }

    pending.flush(&mut out);
    Ok(out)
}

/// Consecutive `\uXXXX` escapes, decoded together so surrogate pairs
/// recombine into a single char.
#[derive(Default)]
struct Utf16Run {
    units: Vec<u16>,
}

impl Utf16Run {
    fn flush(&mut self, out: &mut String) {
        out.extend(
            char::decode_utf16(self.units.drain(..))
                .map(|decoded| decoded.unwrap_or(char::REPLACEMENT_CHARACTER)),
        );
    }
}

/// Parse `\u` (one or more `u`, optional `+`) followed by four hex digits.
fn parse_unicode(input: &str, start: usize) -> TransformResult<(u16, usize)> {
    let bytes = input.as_bytes();
    let mut pos = start + 1;
    while bytes.get(pos) == Some(&b'u') {
        pos += 1;
    }
    if bytes.get(pos) == Some(&b'+') {
        pos += 1;
    }

    let digits = bytes.get(pos..pos + 4).filter(|d| d.iter().all(u8::is_ascii_hexdigit));
    match digits {
        Some(digits) => {
            let mut unit = 0u16;
            for &d in digits {
                // is_ascii_hexdigit guarantees to_digit succeeds
                let value = (d as char).to_digit(16).unwrap_or(0) as u16;
                unit = unit * 16 + value;
            }
            Ok((unit, pos + 4))
        }
        None => {
            let end = input[pos..]
                .char_indices()
                .take(4)
                .last()
                .map_or(pos, |(i, c)| pos + i + c.len_utf8());
            Err(invalid(input, start, end))
        }
    }
}

/// Parse up to three octal digits after a backslash; a third digit is only
/// taken when the first is `0`..=`3`, keeping the value within `\377`.
fn parse_octal(bytes: &[u8], start: usize) -> (char, usize) {
    let is_octal = |b: Option<&u8>| matches!(b, Some(b'0'..=b'7'));
    let first = bytes[start + 1];
    let mut value = u32::from(first - b'0');
    let mut pos = start + 2;

    let max_digits = if first <= b'3' { 3 } else { 2 };
    for _ in 1..max_digits {
        if !is_octal(bytes.get(pos)) {
            break;
        }
        value = value * 8 + u32::from(bytes[pos] - b'0');
        pos += 1;
    }

    // value <= 0o377, always a valid scalar
    (char::from_u32(value).unwrap_or('\u{fffd}'), pos)
}

fn invalid(input: &str, start: usize, end: usize) -> TransformError {
    TransformError::InvalidEscape {
        position: start,
        sequence: input[start..end].to_string(),
    }
}
