//! Core identity types for locledger.
//! Parsers produce component lists; the ledger turns them into these.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::mapping::KeyMapping;

/// Environment tags of the supported platforms.
pub mod env {
    pub const APPLE_STRINGS: &str = "Xcode";
    pub const ANDROID: &str = "Android";
    pub const REFERENCE: &str = "RefLoc";
}

/// Exported in place of a value that has no translation for the language.
pub const TODO_LOC: &str = "!¡!TODOLOC!¡!";
/// Stored for structural keys; never exported.
pub const NOT_EXPORTED: &str = "---";
/// Exported when the mapping of a key cannot be resolved.
pub const MAPPING_ERROR: &str = "!¤*MAPPING ERROR*¤!";
/// Stands for the language folder in a language-agnostic filename.
pub const LANGUAGE_TOKEN: &str = "//LANGUAGE//";
/// Language registered for files whose folder is not in the language mapping.
pub const UNKNOWN_LANGUAGE: &str = "(Unknown)";

/// Identity of one localizable unit in the ledger.
///
/// Two keys are equal when their `loc_key`, `env` and `filename` are equal; the other
/// fields are carried along for export and display only. Instances are immutable,
/// the `with_*` methods build modified copies.
#[derive(Debug, Clone, Default)]
pub struct LineKey {
    loc_key: String,
    env: String,
    filename: String,
    index: usize,
    comment: String,
    user_info: BTreeMap<String, String>,
    user_readable_group_comment: String,
    user_readable_comment: String,
}

impl LineKey {
    pub fn new(
        loc_key: impl Into<String>,
        env: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        LineKey {
            loc_key: loc_key.into(),
            env: env.into(),
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Sets the raw formatting (whitespace and comments) preceding the unit.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_user_info(mut self, user_info: BTreeMap<String, String>) -> Self {
        self.user_info = user_info;
        self
    }

    pub fn with_readable_comments(
        mut self,
        group_comment: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        self.user_readable_group_comment = group_comment.into();
        self.user_readable_comment = comment.into();
        self
    }

    /// Copy of this key under another `loc_key`, every other field kept.
    pub fn with_loc_key(&self, loc_key: impl Into<String>) -> Self {
        LineKey {
            loc_key: loc_key.into(),
            ..self.clone()
        }
    }

    pub fn loc_key(&self) -> &str {
        &self.loc_key
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn user_info(&self) -> &BTreeMap<String, String> {
        &self.user_info
    }

    pub fn user_info_value(&self, key: &str) -> Option<&str> {
        self.user_info.get(key).map(String::as_str)
    }

    pub fn user_readable_group_comment(&self) -> &str {
        &self.user_readable_group_comment
    }

    pub fn user_readable_comment(&self) -> &str {
        &self.user_readable_comment
    }

    /// Export order: `env` descending, then `filename`, `index` and `loc_key` ascending.
    ///
    /// This is deliberately not an `Ord` implementation: keys that compare `Equal` here
    /// are not necessarily equal, and equal keys may differ in `index`.
    pub fn ordering(&self, other: &LineKey) -> Ordering {
        other
            .env
            .cmp(&self.env)
            .then_with(|| self.filename.cmp(&other.filename))
            .then_with(|| self.index.cmp(&other.index))
            .then_with(|| self.loc_key.cmp(&other.loc_key))
    }
}

impl PartialEq for LineKey {
    fn eq(&self, other: &Self) -> bool {
        self.loc_key == other.loc_key && self.env == other.env && self.filename == other.filename
    }
}

impl Eq for LineKey {}

impl Hash for LineKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.loc_key.hash(state);
        self.env.hash(state);
        self.filename.hash(state);
    }
}

/// Sorts keys in export order.
pub fn sort_keys(keys: &mut [&LineKey]) {
    keys.sort_by(|a, b| a.ordering(b));
}

/// The value stored for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum LineValue {
    /// Literal translations by language. A missing language is untranslated.
    Entries(BTreeMap<String, String>),
    /// Computed value, resolved per language by the mapping engine.
    Mapping(KeyMapping),
}

impl LineValue {
    pub fn single(language: impl Into<String>, value: impl Into<String>) -> Self {
        LineValue::Entries(BTreeMap::from([(language.into(), value.into())]))
    }

    /// The literal value for `language`, if this is a literal value.
    pub fn entry(&self, language: &str) -> Option<&str> {
        match self {
            LineValue::Entries(entries) => entries.get(language).map(String::as_str),
            LineValue::Mapping(_) => None,
        }
    }

    pub fn mapping(&self) -> Option<&KeyMapping> {
        match self {
            LineValue::Entries(_) => None,
            LineValue::Mapping(mapping) => Some(mapping),
        }
    }
}

/// A candidate string carrying semantic tags (gender, plurality, placeholder kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedString {
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TaggedString {
    pub fn new(value: impl Into<String>, tags: Vec<String>) -> Self {
        TaggedString {
            value: value.into(),
            tags,
        }
    }

    pub fn untagged(value: impl Into<String>) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
