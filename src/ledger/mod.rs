//! The ledger: every localizable unit of a project, keyed by [`LineKey`].
//!
//! Platform files are merged into the ledger (see [`Ledger::merge_platform_files`]) and
//! projected back with [`Ledger::render_platform_files`] / [`Ledger::export_platform_files`].
//! The ledger is stored as a delimited table (see [`table`]).

pub mod android;
pub mod apple;
pub mod reference;
pub mod table;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    mem,
    path::{Path, PathBuf},
};

use tracing::{debug, error, info};

use crate::{
    error::Error,
    formats::{AndroidStringsFormat, LocatedFile, StringsFormat},
    mapping::KeyMapping,
    options::ExportOptions,
    project,
    types::{
        LANGUAGE_TOKEN, LineKey, LineValue, MAPPING_ERROR, NOT_EXPORTED, TODO_LOC,
        UNKNOWN_LANGUAGE, env,
    },
};

pub use reference::MergeStyle;

/// The platforms the ledger can import and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Apple,
    Android,
}

impl Platform {
    /// Environment tag of the keys this platform produces.
    pub fn env(&self) -> &'static str {
        match self {
            Platform::Apple => env::APPLE_STRINGS,
            Platform::Android => env::ANDROID,
        }
    }
}

/// A batch of parsed files of one platform, merged together.
#[derive(Debug, Clone)]
pub enum PlatformFiles {
    Strings(Vec<LocatedFile<StringsFormat>>),
    Android(Vec<LocatedFile<AndroidStringsFormat>>),
}

/// A value that could not be computed during export.
#[derive(Debug)]
pub struct ResolutionError {
    pub key: LineKey,
    pub language: String,
    pub error: Error,
}

/// Platform files rendered in memory, by path relative to the project root.
#[derive(Debug, Default)]
pub struct RenderedFiles {
    pub files: BTreeMap<String, String>,
    pub errors: Vec<ResolutionError>,
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, Error)>,
    pub resolution_errors: Vec<ResolutionError>,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: HashMap<LineKey, LineValue>,
    languages: Vec<String>,
    metadata: BTreeMap<String, String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &HashMap<LineKey, LineValue> {
        &self.entries
    }

    /// Known languages, sorted.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Free-form metadata, saved alongside the table.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.metadata
    }

    pub fn add_language(&mut self, language: &str) {
        if let Err(pos) = self.languages.binary_search_by(|l| l.as_str().cmp(language)) {
            self.languages.insert(pos, language.to_string());
        }
    }

    /// The stored key equal to `key`, with its metadata.
    pub fn key(&self, key: &LineKey) -> Option<&LineKey> {
        self.entries.get_key_value(key).map(|(k, _)| k)
    }

    pub fn value(&self, key: &LineKey) -> Option<&LineValue> {
        self.entries.get(key)
    }

    /// All keys in export order.
    pub fn sorted_keys(&self) -> Vec<&LineKey> {
        let mut keys: Vec<&LineKey> = self.entries.keys().collect();
        crate::types::sort_keys(&mut keys);
        keys
    }

    /// Keys of one environment in export order.
    pub fn sorted_keys_in_env(&self, env: &str) -> Vec<&LineKey> {
        let mut keys: Vec<&LineKey> = self.entries.keys().filter(|k| k.env() == env).collect();
        crate::types::sort_keys(&mut keys);
        keys
    }

    /// Inserts `key`, replacing both the stored key and its value when an equal key exists.
    pub(crate) fn replace_entry(&mut self, key: LineKey, value: LineValue) {
        self.entries.remove(&key);
        self.entries.insert(key, value);
    }

    /// First index after every index in use by `env`.
    pub(crate) fn next_index(&self, env: &str) -> usize {
        self.entries
            .keys()
            .filter(|k| k.env() == env)
            .map(|k| k.index() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Sets the literal value of `key` for `language`.
    ///
    /// A key stored with a mapping loses it. A new key is added at the end of its environment
    /// when it has no index of its own.
    pub fn set_value(&mut self, key: &LineKey, language: &str, value: impl Into<String>) {
        self.add_language(language);
        match self.entries.get_mut(key) {
            Some(LineValue::Entries(values)) => {
                values.insert(language.to_string(), value.into());
            }
            Some(stored) => {
                *stored = LineValue::single(language, value);
            }
            None => {
                let key = if key.index() == 0 {
                    let index = self.next_index(key.env());
                    key.clone().with_index(index)
                } else {
                    key.clone()
                };
                self.entries.insert(key, LineValue::single(language, value));
            }
        }
    }

    pub fn set_mapping(&mut self, key: &LineKey, mapping: KeyMapping) {
        match self.entries.get_mut(key) {
            Some(stored) => *stored = LineValue::Mapping(mapping),
            None => {
                let index = self.next_index(key.env());
                self.entries
                    .insert(key.clone().with_index(index), LineValue::Mapping(mapping));
            }
        }
    }

    pub fn remove(&mut self, key: &LineKey) -> Option<LineValue> {
        self.entries.remove(key)
    }

    /// Moves the value of `key` to a key with a new `loc_key`, keeping every other field.
    pub fn rename_key(&mut self, key: &LineKey, loc_key: &str) -> Result<LineKey, Error> {
        let renamed = key.with_loc_key(loc_key);
        if self.entries.contains_key(&renamed) {
            return Err(Error::validation_error(format!(
                "key `{}` already exists in {}",
                loc_key,
                key.filename()
            )));
        }
        let (stored, value) = self.entries.remove_entry(key).ok_or_else(|| {
            Error::validation_error(format!("key `{}` not found", key.loc_key()))
        })?;
        let renamed = stored.with_loc_key(loc_key);
        self.entries.insert(renamed.clone(), value);
        Ok(renamed)
    }

    /// The value to write for `key` in `language`.
    ///
    /// Returns `None` when the key must not be exported, the to-do sentinel when the language
    /// has no translation, and the mapping error when a computed value cannot be resolved.
    pub fn exported_value(&self, key: &LineKey, language: &str) -> Result<Option<String>, Error> {
        let value = match self.entries.get(key) {
            None => return Ok(Some(TODO_LOC.to_string())),
            Some(LineValue::Entries(values)) => match values.get(language) {
                Some(value) => value.clone(),
                None => return Ok(Some(TODO_LOC.to_string())),
            },
            Some(LineValue::Mapping(mapping)) => mapping.apply(language, &self.entries)?,
        };
        if value == NOT_EXPORTED {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }

    /// Like [`Ledger::exported_value`], but resolution failures export the mapping error
    /// sentinel and are collected in `errors`.
    pub(crate) fn exported_value_or_error(
        &self,
        key: &LineKey,
        language: &str,
        errors: &mut Vec<ResolutionError>,
    ) -> Option<String> {
        match self.exported_value(key, language) {
            Ok(value) => value,
            Err(error) => {
                debug!(key = %key.loc_key(), language, error = %error, "cannot resolve value");
                errors.push(ResolutionError {
                    key: key.clone(),
                    language: language.to_string(),
                    error,
                });
                Some(MAPPING_ERROR.to_string())
            }
        }
    }

    /// Merges a batch of platform files, rebuilding the keys of the platform's environment.
    ///
    /// `folder_to_language` maps language folder names (`fr.lproj`, `values-fr`) to ledger
    /// languages.
    pub fn merge_platform_files(
        &mut self,
        files: &PlatformFiles,
        folder_to_language: &HashMap<String, String>,
    ) {
        match files {
            PlatformFiles::Strings(files) => self.merge_strings_files(files, folder_to_language),
            PlatformFiles::Android(files) => self.merge_android_files(files, folder_to_language),
        }
    }

    pub fn render_platform_files(
        &self,
        platform: Platform,
        folder_to_language: &HashMap<String, String>,
    ) -> RenderedFiles {
        match platform {
            Platform::Apple => self.render_strings_files(folder_to_language),
            Platform::Android => self.render_android_files(folder_to_language),
        }
    }

    /// Renders the platform files and writes them under `root`. Write failures are logged
    /// and reported per file.
    pub fn export_platform_files(
        &self,
        platform: Platform,
        root: &Path,
        folder_to_language: &HashMap<String, String>,
        options: &ExportOptions,
    ) -> ExportReport {
        let rendered = self.render_platform_files(platform, folder_to_language);
        let mut report = ExportReport {
            resolution_errors: rendered.errors,
            ..Default::default()
        };

        for (filename, text) in rendered.files {
            let path = root.join(filename.trim_start_matches('/'));
            let bytes = match platform {
                Platform::Apple => project::encode_text(&text, options.strings_encoding),
                Platform::Android => text.into_bytes(),
            };
            match project::write_file(&path, &bytes, options.create_directories) {
                Ok(()) => {
                    debug!(path = %path.display(), "exported file");
                    report.written.push(path);
                }
                Err(err) => {
                    error!(path = %path.display(), error = %err, "cannot write file");
                    report.failures.push((path, err));
                }
            }
        }

        info!(
            written = report.written.len(),
            failures = report.failures.len(),
            unresolved = report.resolution_errors.len(),
            "export done"
        );
        report
    }

    /// Replaces the first `/<language folder>/` of `path` with the language token and
    /// registers the folder's language. Unknown folders register the unknown language.
    pub(crate) fn language_agnostic_filename(
        &mut self,
        path: &str,
        folder_to_language: &HashMap<String, String>,
    ) -> (String, String) {
        let rooted = format!("/{}", path.trim_start_matches('/'));
        let found = folder_to_language
            .iter()
            .filter_map(|(folder, language)| {
                rooted
                    .find(&format!("/{}/", folder))
                    .map(|pos| (pos, folder, language))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.len().cmp(&a.1.len())));

        match found {
            Some((pos, folder, language)) => {
                let mut filename = String::with_capacity(rooted.len());
                filename.push_str(&rooted[..pos]);
                filename.push_str(LANGUAGE_TOKEN);
                filename.push_str(&rooted[pos + folder.len() + 2..]);
                let filename = if filename.starts_with(LANGUAGE_TOKEN) {
                    filename
                } else {
                    filename[1..].to_string()
                };
                self.add_language(language);
                (filename, language.clone())
            }
            None => {
                info!(path, "no language folder found in path");
                self.add_language(UNKNOWN_LANGUAGE);
                (path.to_string(), UNKNOWN_LANGUAGE.to_string())
            }
        }
    }
}

/// Concrete filename of a language-agnostic one, for a language folder.
pub(crate) fn localized_filename(filename: &str, folder: &str) -> String {
    filename.replace(LANGUAGE_TOKEN, &format!("/{}/", folder))
}

/// Folder/language pairs in a stable order.
pub(crate) fn sorted_folders(folder_to_language: &HashMap<String, String>) -> Vec<(&str, &str)> {
    let mut folders: Vec<(&str, &str)> = folder_to_language
        .iter()
        .map(|(f, l)| (f.as_str(), l.as_str()))
        .collect();
    folders.sort();
    folders
}

/// Bookkeeping of one merge: previous entries, keys seen in the batch and the next index.
pub(crate) struct MergeState {
    env: &'static str,
    previous: HashMap<LineKey, LineValue>,
    seen: HashSet<LineKey>,
    next_index: usize,
}

impl MergeState {
    pub(crate) fn begin(ledger: &mut Ledger, env: &'static str) -> Self {
        MergeState {
            env,
            previous: mem::take(&mut ledger.entries),
            seen: HashSet::new(),
            next_index: 0,
        }
    }

    /// The key to store for `candidate`: the first one seen in this merge, or `candidate`
    /// with a fresh index. With `fill_empty_comment`, a seen key with an empty comment takes
    /// the comment of `candidate`.
    pub(crate) fn key_for(
        &mut self,
        ledger: &mut Ledger,
        candidate: LineKey,
        fill_empty_comment: bool,
    ) -> LineKey {
        if let Some(seen) = self.seen.get(&candidate) {
            if !(fill_empty_comment && seen.comment().is_empty() && !candidate.comment().is_empty())
            {
                return seen.clone();
            }
            let updated = candidate.with_index(seen.index());
            self.seen.replace(updated.clone());
            if let Some(value) = ledger.entries.remove(&updated) {
                ledger.entries.insert(updated.clone(), value);
            }
            return updated;
        }
        let key = candidate.with_index(self.next_index);
        self.next_index += 1;
        self.seen.insert(key.clone());
        key
    }

    /// Stores `value` for `language` under `key`.
    pub(crate) fn set_value(&self, ledger: &mut Ledger, key: LineKey, language: &str, value: &str) {
        match ledger.entries.get_mut(&key) {
            Some(LineValue::Entries(values)) => {
                values.insert(language.to_string(), value.to_string());
            }
            _ => {
                ledger.replace_entry(key, LineValue::single(language, value));
            }
        }
    }

    /// Ends the merge: unseen keys of the environment are dropped, keys seen again keep
    /// their previous value with their new metadata, other environments are restored.
    pub(crate) fn finish(self, ledger: &mut Ledger) {
        let mut dropped = 0;
        for (old_key, old_value) in self.previous {
            if old_key.env() != self.env {
                ledger.entries.insert(old_key, old_value);
                continue;
            }
            match self.seen.get(&old_key) {
                Some(key) => ledger.replace_entry(key.clone(), old_value),
                None => dropped += 1,
            }
        }
        info!(
            env = self.env,
            keys = self.seen.len(),
            dropped,
            "merge done"
        );
    }
}

/// User-readable comments built from the trivia preceding a unit.
#[derive(Debug, Default)]
pub(crate) struct Trivia {
    pub raw: String,
    pub group_comment: String,
    pub comment: String,
}

impl Trivia {
    pub(crate) fn push_whitespace(&mut self, text: &str) {
        if text.contains("\n\n") && !self.comment.is_empty() {
            let comment = mem::take(&mut self.comment);
            if self.group_comment.is_empty() {
                self.group_comment = comment;
            } else {
                self.group_comment.push_str("\n\n\n");
                self.group_comment.push_str(&comment);
            }
        }
        self.raw.push_str(text);
    }

    /// Adds a comment: `raw` is its source form, `readable` its cleaned-up content.
    pub(crate) fn push_comment(&mut self, raw: &str, readable: &str) {
        self.raw.push_str(raw);
        let readable = readable.trim();
        if readable.is_empty() {
            return;
        }
        if !self.comment.is_empty() {
            self.comment.push('\n');
        }
        self.comment.push_str(readable);
    }

    pub(crate) fn push_raw(&mut self, text: &str) {
        self.raw.push_str(text);
    }

    /// Builds a key carrying the accumulated trivia and resets it.
    pub(crate) fn key(&mut self, loc_key: String, env: &str, filename: &str) -> LineKey {
        let trivia = mem::take(self);
        LineKey::new(loc_key, env, filename)
            .with_comment(trivia.raw)
            .with_readable_comments(trivia.group_comment, trivia.comment)
    }
}
