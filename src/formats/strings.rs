//! Support for Apple `.strings` localization format.
//!
//! The parser is lossless: every byte of the input ends up in exactly one component, so a
//! parsed file renders back byte-for-byte. Keys and values are kept as they appear in the
//! source, escape sequences included.

use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
    io::{BufRead, Write},
};

use crate::{error::Error, traits::Parser};

/// Represents an Apple `.strings` file as an ordered list of components.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Whitespace(String),
    Comment(Comment),
    LocalizedString(LocalizedString),
}

/// A `/*…*/` or `//…` comment.
///
/// For line comments the content includes the terminating newline when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub content: String,
    pub double_slashed: bool,
}

/// One `key = value;` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedString {
    pub key: String,
    pub key_quoted: bool,
    /// Everything between the key and the value, `=` included. Empty when the value is omitted.
    pub equal_sign: String,
    pub value: String,
    pub value_quoted: bool,
    /// Everything between the value and the `;`, `;` included.
    pub semicolon: String,
}

impl LocalizedString {
    /// The value of the statement; a statement without value stands for its key.
    pub fn effective_value(&self) -> &str {
        if self.equal_sign.is_empty() {
            &self.key
        } else {
            &self.value
        }
    }
}

impl Display for Comment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.double_slashed {
            write!(f, "//{}", self.content)
        } else {
            write!(f, "/*{}*/", self.content)
        }
    }
}

impl Display for LocalizedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_token(f, &self.key, self.key_quoted)?;
        if !self.equal_sign.is_empty() {
            f.write_str(&self.equal_sign)?;
            write_token(f, &self.value, self.value_quoted)?;
        }
        f.write_str(&self.semicolon)
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Component::Whitespace(white) => f.write_str(white),
            Component::Comment(comment) => comment.fmt(f),
            Component::LocalizedString(string) => string.fmt(f),
        }
    }
}

fn write_token(f: &mut Formatter<'_>, token: &str, quoted: bool) -> fmt::Result {
    if quoted || !is_unquoted_token(token) {
        write!(f, "\"{}\"", token)
    } else {
        f.write_str(token)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '/' | ':' | '-')
}

/// Whether `s` can be written without quotes.
pub fn is_unquoted_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

impl Parser for Format {
    fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, Error> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        Format::parse(content)
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        for component in &self.components {
            write!(writer, "{}", component)?;
        }
        Ok(())
    }
}

impl Format {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut scanner = Scanner { input, pos: 0 };
        let mut components = Vec::new();

        while !scanner.at_end() {
            if let Some(white) = scanner.scan_whitespace() {
                components.push(Component::Whitespace(white.to_string()));
            } else if let Some(comment) = scanner.scan_comment()? {
                components.push(Component::Comment(comment));
            } else if scanner.peek().is_some_and(|c| c == '"' || is_token_char(c)) {
                let string = scanner.scan_statement()?;
                components.push(Component::LocalizedString(string));
            } else {
                let c = scanner.peek().unwrap_or_default();
                return Err(scanner.error(format!("unexpected character `{}`", c)));
            }
        }

        Ok(Format { components })
    }

    pub fn localized_strings(&self) -> impl Iterator<Item = &LocalizedString> {
        self.components.iter().filter_map(|c| match c {
            Component::LocalizedString(s) => Some(s),
            _ => None,
        })
    }

    pub fn get(&self, key: &str) -> Option<&LocalizedString> {
        self.localized_strings().find(|s| s.key == key)
    }

    /// Folds a freshly generated file into a previously maintained one.
    ///
    /// Statements of `existing` whose key is still in `new` are kept untouched (comments,
    /// formatting and value). Keys only found in `new` are appended at the end along with the
    /// whitespace and comments preceding them, before the trailing trivia of `existing`.
    /// Keys only found in `existing` are reported as
    /// obsolete and removed when `obsolete_keys` is [`ObsoleteKeys::Delete`].
    pub fn merging(new: &Format, existing: &Format, obsolete_keys: ObsoleteKeys) -> MergeOutcome {
        let new_keys: HashSet<&str> = new.localized_strings().map(|s| s.key.as_str()).collect();
        let existing_keys: HashSet<&str> = existing
            .localized_strings()
            .map(|s| s.key.as_str())
            .collect();

        let (existing_segments, existing_tail) = segments(&existing.components);
        let (new_segments, _) = segments(&new.components);

        let mut components = Vec::new();
        let mut obsolete = Vec::new();
        for (trivia, string) in existing_segments {
            if !new_keys.contains(string.key.as_str()) {
                obsolete.push(string.key.clone());
                if obsolete_keys == ObsoleteKeys::Delete {
                    continue;
                }
            }
            components.extend(trivia.iter().cloned());
            components.push(Component::LocalizedString(string.clone()));
        }

        for (trivia, string) in new_segments {
            if existing_keys.contains(string.key.as_str()) {
                continue;
            }
            components.extend(trivia.iter().cloned());
            components.push(Component::LocalizedString(string.clone()));
        }
        components.extend(existing_tail.iter().cloned());

        MergeOutcome {
            format: Format { components },
            obsolete_keys: obsolete,
        }
    }
}

/// What to do with keys of an existing file that are no longer generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObsoleteKeys {
    #[default]
    Keep,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub format: Format,
    pub obsolete_keys: Vec<String>,
}

type Segment<'a> = (&'a [Component], &'a LocalizedString);

/// Splits components into statements with their leading trivia, plus the trailing trivia.
fn segments(components: &[Component]) -> (Vec<Segment<'_>>, &[Component]) {
    let mut result = Vec::new();
    let mut start = 0;
    for (i, component) in components.iter().enumerate() {
        if let Component::LocalizedString(string) = component {
            result.push((&components[start..i], string));
            start = i + 1;
        }
    }
    (result, &components[start..])
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn line(&self) -> usize {
        self.input[..self.pos].matches('\n').count() + 1
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::strings_syntax(self.line(), message)
    }

    fn scan_while(&mut self, predicate: impl Fn(char) -> bool) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(_, c)| !predicate(c))
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn scan_whitespace(&mut self) -> Option<&'a str> {
        self.scan_while(char::is_whitespace)
    }

    fn scan_comment(&mut self) -> Result<Option<Comment>, Error> {
        let rest = self.rest();
        if let Some(body) = rest.strip_prefix("/*") {
            let Some(end) = body.find("*/") else {
                return Err(self.error("unterminated block comment"));
            };
            self.pos += 2 + end + 2;
            return Ok(Some(Comment {
                content: body[..end].to_string(),
                double_slashed: false,
            }));
        }
        if let Some(body) = rest.strip_prefix("//") {
            let len = body.find('\n').map_or(body.len(), |i| i + 1);
            self.pos += 2 + len;
            return Ok(Some(Comment {
                content: body[..len].to_string(),
                double_slashed: true,
            }));
        }
        Ok(None)
    }

    /// Skips whitespace and comments, returning the raw text skipped.
    fn scan_trivia(&mut self) -> Result<&'a str, Error> {
        let start = self.pos;
        loop {
            if self.scan_whitespace().is_some() {
                continue;
            }
            if self.scan_comment()?.is_some() {
                continue;
            }
            break;
        }
        Ok(&self.input[start..self.pos])
    }

    /// A quoted (raw content returned, escapes kept) or unquoted token.
    fn scan_token(&mut self, what: &str) -> Result<(String, bool), Error> {
        if self.peek() == Some('"') {
            let body = &self.rest()[1..];
            let mut escaped = false;
            for (i, c) in body.char_indices() {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => {
                        self.pos += 1 + i + 1;
                        return Ok((body[..i].to_string(), true));
                    }
                    _ => {}
                }
            }
            return Err(self.error(format!("unterminated quoted {}", what)));
        }
        match self.scan_while(is_token_char) {
            Some(token) => Ok((token.to_string(), false)),
            None => Err(self.error(format!("expected {}", what))),
        }
    }

    fn scan_statement(&mut self) -> Result<LocalizedString, Error> {
        let (key, key_quoted) = self.scan_token("key")?;

        let start = self.pos;
        self.scan_trivia()?;
        match self.peek() {
            Some(';') => {
                self.pos += 1;
                Ok(LocalizedString {
                    key,
                    key_quoted,
                    equal_sign: String::new(),
                    value: String::new(),
                    value_quoted: false,
                    semicolon: self.input[start..self.pos].to_string(),
                })
            }
            Some('=') => {
                self.pos += 1;
                self.scan_trivia()?;
                let equal_sign = self.input[start..self.pos].to_string();
                let (value, value_quoted) = self.scan_token("value")?;

                let start = self.pos;
                self.scan_trivia()?;
                if self.peek() != Some(';') {
                    return Err(self.error(format!("expected `;` after value of `{}`", key)));
                }
                self.pos += 1;
                Ok(LocalizedString {
                    key,
                    key_quoted,
                    equal_sign,
                    value,
                    value_quoted,
                    semicolon: self.input[start..self.pos].to_string(),
                })
            }
            _ => Err(self.error(format!("expected `=` or `;` after key `{}`", key))),
        }
    }
}
