//! Reference translations: the tagged source texts translators work from.
//!
//! They come either from a delimited export (see [`crate::formats::csv`]) or from the key
//! records of a remote translation service, fetched page by page through a
//! [`RemoteKeySource`].

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::BufRead,
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::Error,
    formats::csv::{self, parse_tags_cell},
    placeholder::convert_universal_placeholders,
    types::{NOT_EXPORTED, TaggedString},
};

/// Tag names of the reference files and their template-dialect equivalent.
pub const COMMON_TAGS: [(&str, &str); 6] = [
    ("male_other", "gm"),
    ("female_other", "gf"),
    ("male_me", "g{₋}m"),
    ("female_me", "g{₋}f"),
    ("variable_string", "r"),
    ("variable_number", "r##"),
];

const REMOTE_TAG_PREFIX: &str = "lcm:";
const REMOTE_VOID_VALUE: &str = "[VOID]";

pub fn map_tag(tag: &str) -> String {
    COMMON_TAGS
        .iter()
        .find(|(name, _)| *name == tag)
        .map_or_else(|| tag.to_string(), |(_, mapped)| mapped.to_string())
}

/// Tagged candidates by reference key, then by language.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefLocFile {
    pub languages: Vec<String>,
    pub entries: BTreeMap<String, BTreeMap<String, Vec<TaggedString>>>,
}

impl RefLocFile {
    /// Builds the file from a parsed delimited export. Languages absent from a row yield
    /// empty candidates; rows sharing a key add candidates to it.
    pub fn from_csv(format: &csv::Format, languages: &[String]) -> Result<Self, Error> {
        let mut entries: BTreeMap<String, BTreeMap<String, Vec<TaggedString>>> = BTreeMap::new();
        for row in &format.rows {
            if row.key.is_empty() {
                continue;
            }
            let tags: Vec<String> = match &row.tags {
                Some(cell) => parse_tags_cell(cell)?
                    .iter()
                    .map(|t| map_tag(t))
                    .collect(),
                None => Vec::new(),
            };
            let values = entries.entry(row.key.clone()).or_default();
            for language in languages {
                let value = row.values.get(language).cloned().unwrap_or_default();
                values
                    .entry(language.clone())
                    .or_default()
                    .push(TaggedString::new(value, tags.clone()));
            }
        }
        Ok(RefLocFile {
            languages: languages.to_vec(),
            entries,
        })
    }

    pub fn from_csv_reader<R: BufRead>(
        reader: R,
        languages: &[String],
        delimiter: u8,
    ) -> Result<Self, Error> {
        let format = csv::Format::from_reader_with_delimiter(reader, delimiter)?;
        Self::from_csv(&format, languages)
    }

    /// Reads a delimited export from disk, decoding it according to its BOM.
    pub fn read_csv<P: AsRef<Path>>(
        path: P,
        languages: &[String],
        delimiter: u8,
    ) -> Result<Self, Error> {
        let text = crate::project::read_text(path.as_ref())?;
        Self::from_csv_reader(text.as_bytes(), languages, delimiter)
    }

    /// Builds the file from remote key records.
    ///
    /// `language_map` maps the service's language codes to ledger languages; `platform` picks
    /// the key name to use among the per-platform names of a record.
    pub fn from_remote_keys(
        keys: &[RemoteKey],
        platform: &str,
        language_map: &HashMap<String, String>,
        excluded_tags: &HashSet<String>,
    ) -> Result<Self, Error> {
        let mut entries: BTreeMap<String, BTreeMap<String, Vec<TaggedString>>> = BTreeMap::new();

        for key in keys {
            if key.tags.iter().any(|t| excluded_tags.contains(t)) {
                debug!(tags = ?key.tags, "skipping key with an excluded tag");
                continue;
            }
            let Some(key_name) = key.key_name.get(platform) else {
                info!(platform, "skipping remote key with no name for the platform");
                continue;
            };

            let segments: Vec<&str> = key_name.split(" - ").collect();
            if segments.len() > 2 {
                info!(key = %key_name, "remote key has more than two segments, the last one is taken as tags");
            }
            let keep = segments.len().saturating_sub(1).max(1);
            let name = segments[..keep].join(" - ");

            let tags: Vec<String> = key
                .tags
                .iter()
                .filter_map(|t| t.strip_prefix(REMOTE_TAG_PREFIX))
                .map(map_tag)
                .collect();

            for translation in &key.translations {
                let Some(language) = language_map.get(&translation.language_iso) else {
                    info!(language = %translation.language_iso, "skipping translation in an unknown language");
                    continue;
                };
                let candidates = entries
                    .entry(name.clone())
                    .or_default()
                    .entry(language.clone())
                    .or_default();

                if key.is_plural {
                    let plural: RemotePlural = serde_json::from_str(&translation.translation)?;
                    for (value, tag) in plural.forms() {
                        let value = match value {
                            Some(v) if v == REMOTE_VOID_VALUE => String::new(),
                            Some(v) => v.clone(),
                            None => NOT_EXPORTED.to_string(),
                        };
                        let mut tags = tags.clone();
                        tags.push(tag.to_string());
                        candidates.push(TaggedString::new(
                            convert_universal_placeholders(&value),
                            tags,
                        ));
                    }
                } else {
                    candidates.push(TaggedString::new(
                        convert_universal_placeholders(&translation.translation),
                        tags.clone(),
                    ));
                }
            }
        }

        let mut languages: Vec<String> = language_map.values().cloned().collect();
        languages.sort();
        languages.dedup();
        Ok(RefLocFile { languages, entries })
    }

    /// Fetches every page of `source` (pages start at 1, an empty page ends the listing)
    /// and builds the file from the records.
    pub fn from_remote<S: RemoteKeySource + ?Sized>(
        source: &mut S,
        platform: &str,
        language_map: &HashMap<String, String>,
        excluded_tags: &HashSet<String>,
    ) -> Result<Self, Error> {
        let mut keys = Vec::new();
        let mut page = 1;
        loop {
            let fetched = source.fetch_page(page)?;
            debug!(page, count = fetched.keys.len(), "fetched remote keys");
            if fetched.keys.is_empty() {
                break;
            }
            keys.extend(fetched.keys);
            page += 1;
        }
        Self::from_remote_keys(&keys, platform, language_map, excluded_tags)
    }
}

/// Paged access to the key records of a translation service. The transport is up to the
/// implementor.
pub trait RemoteKeySource {
    fn fetch_page(&mut self, page: usize) -> Result<RemoteKeysPage, Error>;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteKeysPage {
    #[serde(default)]
    pub keys: Vec<RemoteKey>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteKey {
    /// Key name per platform (`ios`, `android`, `web`, `other`…).
    pub key_name: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_plural: bool,
    #[serde(default)]
    pub translations: Vec<RemoteTranslation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteTranslation {
    pub language_iso: String,
    pub translation: String,
}

/// The JSON document stored as the translation of a plural key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemotePlural {
    pub zero: Option<String>,
    pub one: Option<String>,
    pub two: Option<String>,
    pub few: Option<String>,
    pub many: Option<String>,
    pub other: Option<String>,
}

impl RemotePlural {
    fn forms(&self) -> [(&Option<String>, &'static str); 6] {
        [
            (&self.zero, "p0"),
            (&self.one, "p1"),
            (&self.two, "p2"),
            (&self.few, "pf"),
            (&self.many, "pm"),
            (&self.other, "px"),
        ]
    }
}

/// Pages served from memory, mostly useful for tests and replaying saved responses.
impl RemoteKeySource for Vec<RemoteKeysPage> {
    fn fetch_page(&mut self, page: usize) -> Result<RemoteKeysPage, Error> {
        Ok(page
            .checked_sub(1)
            .and_then(|i| self.get(i))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_csv_maps_tags_and_merges_rows() {
        let text = "KEY,LCM:TAGS,en,fr\n\
                    liked,male_other,He likes you,Il t'aime\n\
                    liked,female_other,She likes you,Elle t'aime\n\
                    ,,ignored,ignoré\n";
        let file = RefLocFile::from_csv_reader(text.as_bytes(), &langs(&["en", "de"]), b',')
            .unwrap();
        assert_eq!(file.entries.len(), 1);
        let en = &file.entries["liked"]["en"];
        assert_eq!(en.len(), 2);
        assert_eq!(en[0], TaggedString::new("He likes you", vec!["gm".to_string()]));
        assert_eq!(en[1].tags, vec!["gf"]);
        assert_eq!(file.entries["liked"]["de"][0].value, "");
    }

    #[test]
    fn test_from_csv_rejects_multiline_tags() {
        let text = "KEY,LCM:TAGS,en\nk,\"a\nb\",v\n";
        assert!(RefLocFile::from_csv_reader(text.as_bytes(), &langs(&["en"]), b',').is_err());
    }

    fn remote_key(name: &str, tags: &[&str], translations: &[(&str, &str)]) -> RemoteKey {
        RemoteKey {
            key_name: HashMap::from([("ios".to_string(), name.to_string())]),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_plural: false,
            translations: translations
                .iter()
                .map(|(l, t)| RemoteTranslation {
                    language_iso: l.to_string(),
                    translation: t.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_from_remote_keys() {
        let language_map = HashMap::from([("en".to_string(), "English".to_string())]);
        let excluded = HashSet::from(["obsolete".to_string()]);
        let keys = vec![
            remote_key(
                "welcome - a - variable_string",
                &["lcm:variable_string", "ios"],
                &[("en", "Welcome [%1$s:name]"), ("xx", "?")],
            ),
            remote_key("gone", &["obsolete"], &[("en", "Gone")]),
            RemoteKey {
                key_name: HashMap::from([("android".to_string(), "android_only".to_string())]),
                ..Default::default()
            },
        ];
        let file = RefLocFile::from_remote_keys(&keys, "ios", &language_map, &excluded).unwrap();
        assert_eq!(file.languages, vec!["English"]);
        assert_eq!(file.entries.len(), 1);
        assert_eq!(
            file.entries["welcome - a"]["English"],
            vec![TaggedString::new("Welcome %1$s", vec!["r".to_string()])]
        );
    }

    #[test]
    fn test_remote_plurals() {
        let mut key = remote_key(
            "apples",
            &[],
            &[("en", r#"{"one":"One apple","other":"[%1$d] apples","zero":"[VOID]"}"#)],
        );
        key.is_plural = true;
        let language_map = HashMap::from([("en".to_string(), "en".to_string())]);
        let file =
            RefLocFile::from_remote_keys(&[key], "ios", &language_map, &HashSet::new()).unwrap();
        let values: Vec<_> = file.entries["apples"]["en"]
            .iter()
            .map(|c| (c.value.as_str(), c.tags[0].as_str()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("", "p0"),
                ("One apple", "p1"),
                ("---", "p2"),
                ("---", "pf"),
                ("---", "pm"),
                ("%1$d apples", "px"),
            ]
        );
    }

    #[test]
    fn test_paged_source() {
        let mut pages = vec![
            RemoteKeysPage {
                keys: vec![remote_key("a", &[], &[("en", "A")])],
            },
            RemoteKeysPage {
                keys: vec![remote_key("b", &[], &[("en", "B")])],
            },
        ];
        let language_map = HashMap::from([("en".to_string(), "en".to_string())]);
        let file =
            RefLocFile::from_remote(&mut pages, "ios", &language_map, &HashSet::new()).unwrap();
        assert_eq!(file.entries.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_remote_page_decoding() {
        let page: RemoteKeysPage = serde_json::from_str(
            r#"{"keys":[{"key_name":{"ios":"k"},"is_plural":false,"translations":[{"language_iso":"en","translation":"v"}]}]}"#,
        )
        .unwrap();
        assert_eq!(page.keys[0].translations[0].translation, "v");
        assert!(page.keys[0].tags.is_empty());
    }
}
