//! Merge and export of Apple strings files.
//!
//! Each statement becomes a key of the `Xcode` environment. The raw text around the value is
//! kept in the key's user info so an export rebuilds the statement as it was read:
//!
//! - `=`: everything between the key and the value (empty for `key;` statements)
//! - `;`: everything between the value and the end of the statement
//! - `k'¿` / `v'¿`: `"1"` when the key / value was not quoted, `"0"` otherwise

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::{
    Ledger, MergeState, RenderedFiles, Trivia, localized_filename, sorted_folders,
};
use crate::{
    formats::{
        LocatedFile, StringsFormat,
        strings::{Comment, Component, LocalizedString},
    },
    traits::Parser,
    types::{LineKey, env},
};

pub const EQUAL_SIGN_INFO: &str = "=";
pub const SEMICOLON_INFO: &str = ";";
pub const KEY_UNQUOTED_INFO: &str = "k'¿";
pub const VALUE_UNQUOTED_INFO: &str = "v'¿";

const DEFAULT_EQUAL_SIGN: &str = " = ";
const DEFAULT_SEMICOLON: &str = ";";

fn flag(set: bool) -> String {
    if set { "1" } else { "0" }.to_string()
}

fn readable_block_comment(content: &str) -> String {
    content.trim().replace("\n * ", "\n")
}

impl Ledger {
    /// Merges parsed strings files into the `Xcode` environment.
    pub fn merge_strings_files(
        &mut self,
        files: &[LocatedFile<StringsFormat>],
        folder_to_language: &HashMap<String, String>,
    ) {
        let mut state = MergeState::begin(self, env::APPLE_STRINGS);

        for file in files {
            let (filename, language) =
                self.language_agnostic_filename(&file.path_string(), folder_to_language);
            debug!(path = %file.path.display(), %filename, %language, "merging strings file");

            let mut trivia = Trivia::default();
            for component in &file.format.components {
                match component {
                    Component::Whitespace(white) => trivia.push_whitespace(white),
                    Component::Comment(comment) => {
                        let readable = if comment.double_slashed {
                            comment.content.trim().to_string()
                        } else {
                            readable_block_comment(&comment.content)
                        };
                        trivia.push_comment(&comment.to_string(), &readable);
                    }
                    Component::LocalizedString(string) => {
                        let value_unquoted = !string.value_quoted && !string.equal_sign.is_empty();
                        let user_info = BTreeMap::from([
                            (EQUAL_SIGN_INFO.to_string(), string.equal_sign.clone()),
                            (SEMICOLON_INFO.to_string(), string.semicolon.clone()),
                            (KEY_UNQUOTED_INFO.to_string(), flag(!string.key_quoted)),
                            (VALUE_UNQUOTED_INFO.to_string(), flag(value_unquoted)),
                        ]);

                        let candidate = trivia
                            .key(string.key.clone(), env::APPLE_STRINGS, &filename)
                            .with_user_info(user_info);
                        let key = state.key_for(self, candidate, false);
                        state.set_value(self, key, &language, string.effective_value());
                    }
                }
            }
        }

        state.finish(self);
    }

    pub(crate) fn render_strings_files(
        &self,
        folder_to_language: &HashMap<String, String>,
    ) -> RenderedFiles {
        let folders = sorted_folders(folder_to_language);
        let mut rendered = RenderedFiles::default();
        let mut files: BTreeMap<String, Vec<Component>> = BTreeMap::new();

        for key in self.sorted_keys_in_env(env::APPLE_STRINGS) {
            let trivia = comment_components(key.comment());
            for (folder, language) in &folders {
                let components = files
                    .entry(localized_filename(key.filename(), folder))
                    .or_default();
                components.extend(trivia.iter().cloned());

                let Some(value) = self.exported_value_or_error(key, language, &mut rendered.errors)
                else {
                    continue;
                };
                components.push(Component::LocalizedString(localized_string(key, value)));
            }
        }

        for (filename, components) in files {
            let format = StringsFormat { components };
            match format.to_text() {
                Ok(mut text) => {
                    if !text.ends_with('\n') {
                        text.push('\n');
                    }
                    rendered.files.insert(filename, text);
                }
                Err(err) => warn!(%filename, error = %err, "cannot render strings file"),
            }
        }
        rendered
    }
}

/// Rebuilds the statement of `key` with `value`.
fn localized_string(key: &LineKey, value: String) -> LocalizedString {
    let equal_sign = key
        .user_info_value(EQUAL_SIGN_INFO)
        .unwrap_or(DEFAULT_EQUAL_SIGN);
    let semicolon = key
        .user_info_value(SEMICOLON_INFO)
        .unwrap_or(DEFAULT_SEMICOLON);
    let key_quoted = key.user_info_value(KEY_UNQUOTED_INFO) != Some("1");
    let value_quoted = key.user_info_value(VALUE_UNQUOTED_INFO) != Some("1");

    // `key;` can only stand for a value equal to the key.
    let (equal_sign, value) = if !equal_sign.is_empty() {
        (equal_sign, value)
    } else if value == key.loc_key() {
        ("", String::new())
    } else {
        (DEFAULT_EQUAL_SIGN, value)
    };

    LocalizedString {
        key: key.loc_key().to_string(),
        key_quoted,
        equal_sign: equal_sign.to_string(),
        value,
        value_quoted,
        semicolon: semicolon.to_string(),
    }
}

/// Splits stored trivia back into whitespace and comments. Anything else is dropped.
fn comment_components(comment: &str) -> Vec<Component> {
    let mut components = Vec::new();
    let mut rest = comment;
    while !rest.is_empty() {
        let white_len = rest.len() - rest.trim_start().len();
        if white_len > 0 {
            components.push(Component::Whitespace(rest[..white_len].to_string()));
            rest = &rest[white_len..];
            continue;
        }
        if let Some(after) = rest.strip_prefix("/*") {
            if let Some(end) = after.find("*/") {
                components.push(Component::Comment(Comment {
                    content: after[..end].to_string(),
                    double_slashed: false,
                }));
                rest = &after[end + 2..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix("//") {
            let end = after.find('\n').map_or(after.len(), |i| i + 1);
            components.push(Component::Comment(Comment {
                content: after[..end].to_string(),
                double_slashed: true,
            }));
            rest = &after[end..];
            continue;
        }

        let junk_len = rest
            .char_indices()
            .skip(1)
            .find(|(_, c)| c.is_whitespace() || *c == '/')
            .map_or(rest.len(), |(i, _)| i);
        warn!(junk = %&rest[..junk_len], "ignoring invalid text in comment");
        rest = &rest[junk_len..];
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::Platform, types::LineValue};

    fn merge(text: &str, path: &str, folders: &HashMap<String, String>) -> Ledger {
        let mut ledger = Ledger::new();
        let files = vec![LocatedFile::new(path, StringsFormat::from_str(text).unwrap())];
        ledger.merge_strings_files(&files, folders);
        ledger
    }

    fn french() -> HashMap<String, String> {
        HashMap::from([("fr.lproj".to_string(), "fr".to_string())])
    }

    #[test]
    fn test_merge_user_info() {
        let ledger = merge(
            "/* Greeting */\nhello = \"Bonjour\" ;\n\"weird\";\n",
            "fr.lproj/Localizable.strings",
            &french(),
        );
        let key = ledger
            .key(&LineKey::new("hello", env::APPLE_STRINGS, "//LANGUAGE//Localizable.strings"))
            .unwrap();
        assert_eq!(key.index(), 0);
        assert_eq!(key.comment(), "/* Greeting */\n");
        assert_eq!(key.user_readable_comment(), "Greeting");
        assert_eq!(key.user_info_value("="), Some(" = "));
        assert_eq!(key.user_info_value(";"), Some(" ;"));
        assert_eq!(key.user_info_value("k'¿"), Some("1"));
        assert_eq!(key.user_info_value("v'¿"), Some("0"));

        let weird = LineKey::new("weird", env::APPLE_STRINGS, "//LANGUAGE//Localizable.strings");
        assert_eq!(ledger.key(&weird).unwrap().user_info_value("="), Some(""));
        assert_eq!(ledger.value(&weird), Some(&LineValue::single("fr", "weird")));
    }

    #[test]
    fn test_export_round_trip() {
        let text = "/* Title\n * of the screen */\n\"title\" = \"Titre\";\n\n// Button\nok=OK;\n";
        let ledger = merge(text, "fr.lproj/Localizable.strings", &french());
        let rendered = ledger.render_platform_files(Platform::Apple, &french());
        assert!(rendered.errors.is_empty());
        assert_eq!(rendered.files["/fr.lproj/Localizable.strings"], text);
    }

    #[test]
    fn test_readable_block_comment() {
        let ledger = merge(
            "/* Title\n * of the screen */\n\"title\" = \"Titre\";",
            "fr.lproj/Localizable.strings",
            &french(),
        );
        let key = ledger.sorted_keys()[0];
        assert_eq!(key.user_readable_comment(), "Title\nof the screen");
    }

    #[test]
    fn test_comment_components() {
        let components = comment_components("  /* a */junk\n// b\n//c");
        assert_eq!(
            components,
            vec![
                Component::Whitespace("  ".to_string()),
                Component::Comment(Comment {
                    content: " a ".to_string(),
                    double_slashed: false
                }),
                Component::Whitespace("\n".to_string()),
                Component::Comment(Comment {
                    content: " b\n".to_string(),
                    double_slashed: true
                }),
                Component::Comment(Comment {
                    content: "c".to_string(),
                    double_slashed: true
                }),
            ]
        );
    }

    #[test]
    fn test_omitted_value_export() {
        let key = LineKey::new("weird", env::APPLE_STRINGS, "f").with_user_info(BTreeMap::from([
            ("=".to_string(), String::new()),
            (";".to_string(), ";".to_string()),
            ("k'¿".to_string(), "1".to_string()),
        ]));
        assert_eq!(localized_string(&key, "weird".to_string()).to_string(), "weird;");
        assert_eq!(
            localized_string(&key, "other".to_string()).to_string(),
            "weird = \"other\";"
        );
    }
}
