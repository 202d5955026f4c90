//! Placeholder scanning and rewriting utilities.
//!
//! - Find printf-style placeholders (`%d`, `%1$@`, `%ld`…) with their byte spans.
//! - Convert universal `[%1$s]` / `[%1$s:name]` placeholders to printf style.
//! - Escape text and wrap placeholders for the template dialect used by reference mappings.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNIVERSAL_PLACEHOLDER_REGEX: Regex =
        Regex::new(r"\[%([0-9]*)\$([a-zA-Z0-9.#*@+' -]+)(?::[a-zA-Z0-9_.-]*)?\]").unwrap();
}

/// Characters with a meaning in the template dialect, escaped with [`TEMPLATE_ESCAPE`].
pub const TEMPLATE_SPECIAL_CHARS: [char; 9] = ['`', '¦', '{', '}', '<', '>', '|', '#', '~'];
pub const TEMPLATE_ESCAPE: char = '~';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    pub index: Option<usize>,
    /// Canonical conversion: `s` for strings and objects, lowercase letter otherwise.
    pub kind: char,
    pub span: Range<usize>,
}

impl PlaceholderToken {
    pub fn is_string(&self) -> bool {
        self.kind == 's'
    }
}

/// Extracts placeholder tokens from a string in occurrence order. `%%` is skipped.
pub fn extract_placeholders(input: &str) -> Vec<PlaceholderToken> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'%') {
        let start = pos + offset;
        if bytes.get(start + 1) == Some(&b'%') {
            pos = start + 2;
            continue;
        }
        match scan_conversion(input, start + 1) {
            Some((index, kind, end)) => {
                tokens.push(PlaceholderToken {
                    index,
                    kind,
                    span: start..end,
                });
                pos = end;
            }
            None => pos = start + 1,
        }
    }
    tokens
}

/// Scans what follows a `%`: `[digits$][flags/width/precision][length]conversion`.
/// Returns the positional index, the canonical conversion and the end of the token.
fn scan_conversion(input: &str, from: usize) -> Option<(Option<usize>, char, usize)> {
    let bytes = input.as_bytes();
    let skip = |mut at: usize, accept: fn(u8) -> bool| {
        while bytes.get(at).copied().is_some_and(accept) {
            at += 1;
        }
        at
    };

    let digits_end = skip(from, |b| b.is_ascii_digit());
    let (index, at) = if digits_end > from && bytes.get(digits_end) == Some(&b'$') {
        (input[from..digits_end].parse().ok(), digits_end + 1)
    } else {
        (None, from)
    };
    let at = skip(at, |b| matches!(b, b'-' | b'+' | b'#' | b'.' | b'0'..=b'9'));
    let at = skip(at, |b| matches!(b, b'l' | b'h' | b'q' | b'z' | b't' | b'j'));

    let conversion = *bytes.get(at)?;
    if !(conversion.is_ascii_alphabetic() || conversion == b'@') {
        return None;
    }
    let kind = match conversion {
        b'@' => 's',
        c => c.to_ascii_lowercase() as char,
    };
    Some((index, kind, at + 1))
}

/// Rewrites `[%1$s]` and `[%1$s:name]` to `%1$s`.
pub fn convert_universal_placeholders(input: &str) -> String {
    UNIVERSAL_PLACEHOLDER_REGEX
        .replace_all(input, "%${1}$$${2}")
        .into_owned()
}

/// Escapes the characters the template dialect gives a meaning to.
pub fn escape_template(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if TEMPLATE_SPECIAL_CHARS.contains(&c) {
            out.push(TEMPLATE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Which placeholders get delimited when converting a printf string to a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimited {
    None,
    /// String placeholders, wrapped in `|…|`.
    Strings,
    /// Numeric placeholders, wrapped in `#…#`.
    Numbers,
}

/// Converts a printf string to the template dialect: literal text is escaped and the selected
/// placeholders are wrapped in their delimiters.
pub fn to_template(input: &str, delimited: Delimited) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut last = 0;
    for token in extract_placeholders(input) {
        out.push_str(&escape_template(&input[last..token.span.start]));
        let text = escape_template(&input[token.span.clone()]);
        match delimited {
            Delimited::Strings if token.is_string() => {
                out.push('|');
                out.push_str(&text);
                out.push('|');
            }
            Delimited::Numbers if !token.is_string() => {
                out.push('#');
                out.push_str(&text);
                out.push('#');
            }
            _ => out.push_str(&text),
        }
        last = token.span.end;
    }
    out.push_str(&escape_template(&input[last..]));
    out
}
