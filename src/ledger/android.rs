//! Merge and export of Android string resources.
//!
//! The first character of a key's `loc_key` tells which node it stands for:
//!
//! | prefix | node | rest of the key |
//! |---|---|---|
//! | `o` | group opening (`<resources>`, `<string-array>`) | full opening tag |
//! | `c` | group closing | group name, then a space and the `name` attribute if any |
//! | `k` | `<string>` | `name` attribute |
//! | `a` | `<string-array>` item | array name, `"`, index |
//! | `s` | `<plurals>` opening | `name` attribute |
//! | `p` | `<plurals>` item | plurals name, `"`, quantity |
//!
//! Structural keys (`o`, `c`, `s`) and missing plural quantities hold `---`.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::{
    Ledger, MergeState, RenderedFiles, ResolutionError, Trivia, localized_filename, sorted_folders,
};
use crate::{
    formats::{
        AndroidStringsFormat, LocatedFile,
        android_strings::{
            ArrayItem, Component, GroupClosing, PluralGroup, PluralItem, QUANTITIES, StringValue,
        },
    },
    traits::Parser,
    types::{LineKey, NOT_EXPORTED, env},
};

pub const CDATA_INFO: &str = "DTA";
pub const ATTRIBUTE_INFO_PREFIX: &str = "attr:";

const PLURALS_GROUP: &str = "plurals";

fn attributes_info(attributes: &[(String, String)]) -> BTreeMap<String, String> {
    attributes
        .iter()
        .map(|(name, value)| (format!("{}{}", ATTRIBUTE_INFO_PREFIX, name), value.clone()))
        .collect()
}

fn info_attributes(key: &LineKey) -> Vec<(String, String)> {
    key.user_info()
        .iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(ATTRIBUTE_INFO_PREFIX)
                .map(|name| (name.to_string(), value.clone()))
        })
        .collect()
}

fn cdata_info(cdata: bool) -> (String, String) {
    (
        CDATA_INFO.to_string(),
        if cdata { "1" } else { "0" }.to_string(),
    )
}

fn push_trivia(trivia: &mut Trivia, component: &Component) {
    match component {
        Component::Whitespace(white) => trivia.push_whitespace(white),
        Component::Comment(content) => trivia.push_comment(&component.to_string(), content),
        other => trivia.push_raw(&other.to_string()),
    }
}

impl Ledger {
    /// Merges parsed Android resource files into the `Android` environment.
    pub fn merge_android_files(
        &mut self,
        files: &[LocatedFile<AndroidStringsFormat>],
        folder_to_language: &HashMap<String, String>,
    ) {
        let mut state = MergeState::begin(self, env::ANDROID);

        for file in files {
            let (filename, language) =
                self.language_agnostic_filename(&file.path_string(), folder_to_language);
            debug!(path = %file.path.display(), %filename, %language, "merging android file");

            let mut trivia = Trivia::default();
            let add = |ledger: &mut Ledger,
                           state: &mut MergeState,
                           key: LineKey,
                           value: &str,
                           fill_empty_comment: bool| {
                let key = state.key_for(ledger, key, fill_empty_comment);
                state.set_value(ledger, key, &language, value);
            };

            for component in &file.format.components {
                match component {
                    Component::Whitespace(_) | Component::Comment(_) | Component::Opaque(_) => {
                        push_trivia(&mut trivia, component)
                    }
                    Component::GroupOpening(opening) => {
                        let key = trivia.key(format!("o{}", opening), env::ANDROID, &filename);
                        add(self, &mut state, key, NOT_EXPORTED, false);
                    }
                    Component::GroupClosing(closing) => {
                        let loc_key = match &closing.name_attr {
                            Some(name) => format!("c{} {}", closing.name, name),
                            None => format!("c{}", closing.name),
                        };
                        let key = trivia.key(loc_key, env::ANDROID, &filename);
                        add(self, &mut state, key, NOT_EXPORTED, false);
                    }
                    Component::StringValue(string) => {
                        let mut user_info = attributes_info(&string.attributes);
                        user_info.extend([cdata_info(string.cdata)]);
                        let key = trivia
                            .key(format!("k{}", string.key), env::ANDROID, &filename)
                            .with_user_info(user_info);
                        add(self, &mut state, key, &string.value, false);
                    }
                    Component::ArrayItem(item) => {
                        let loc_key = format!("a{}\"{}", item.parent, item.index);
                        let key = trivia.key(loc_key, env::ANDROID, &filename);
                        add(self, &mut state, key, &item.value, false);
                    }
                    Component::PluralGroup(group) => {
                        let key = trivia
                            .key(format!("s{}", group.name), env::ANDROID, &filename)
                            .with_user_info(attributes_info(&group.attributes));
                        add(self, &mut state, key, NOT_EXPORTED, false);

                        for item in &group.items {
                            let mut item_trivia = Trivia::default();
                            for leading in &item.leading {
                                push_trivia(&mut item_trivia, leading);
                            }
                            let loc_key = format!("p{}\"{}", group.name, item.quantity);
                            let key = item_trivia
                                .key(loc_key, env::ANDROID, &filename)
                                .with_user_info(BTreeMap::from([cdata_info(item.cdata)]));
                            add(self, &mut state, key, &item.value, true);
                        }
                        for quantity in QUANTITIES {
                            if group.item(quantity).is_none() {
                                let loc_key = format!("p{}\"{}", group.name, quantity);
                                let key = LineKey::new(loc_key, env::ANDROID, filename.as_str())
                                    .with_user_info(BTreeMap::from([cdata_info(false)]));
                                add(self, &mut state, key, NOT_EXPORTED, true);
                            }
                        }
                    }
                }
            }
        }

        state.finish(self);
    }

    pub(crate) fn render_android_files(
        &self,
        folder_to_language: &HashMap<String, String>,
    ) -> RenderedFiles {
        let folders = sorted_folders(folder_to_language);
        let mut rendered = RenderedFiles::default();
        let mut files: BTreeMap<String, AndroidExport> = BTreeMap::new();

        for key in self.sorted_keys_in_env(env::ANDROID) {
            let trivia = comment_components(key.comment());
            for (folder, language) in &folders {
                let export = files
                    .entry(localized_filename(key.filename(), folder))
                    .or_default();
                export.add(self, key, trivia.clone(), language, &mut rendered.errors);
            }
        }

        for (filename, export) in files {
            if let Some(group) = &export.plurals {
                warn!(%filename, plurals = %group.name, "plurals group never closed, dropping it");
            }
            let format = AndroidStringsFormat::with_components(export.components);
            match format.to_text() {
                Ok(text) => {
                    rendered.files.insert(filename, text);
                }
                Err(err) => warn!(%filename, error = %err, "cannot render android file"),
            }
        }
        rendered
    }
}

/// Components of one exported file and the plurals group being rebuilt.
#[derive(Default)]
struct AndroidExport {
    components: Vec<Component>,
    plurals: Option<PluralGroup>,
}

impl AndroidExport {
    fn add(
        &mut self,
        ledger: &Ledger,
        key: &LineKey,
        trivia: Vec<Component>,
        language: &str,
        errors: &mut Vec<ResolutionError>,
    ) {
        let loc_key = key.loc_key();
        let mut chars = loc_key.chars();
        let (Some(kind), rest) = (chars.next(), chars.as_str()) else {
            warn!("empty android key");
            return;
        };
        let cdata = key.user_info_value(CDATA_INFO) == Some("1");

        match kind {
            'o' => {
                self.components.extend(trivia);
                self.components.push(Component::GroupOpening(rest.to_string()));
            }
            's' => {
                self.components.extend(trivia);
                if let Some(previous) = self.plurals.take() {
                    warn!(plurals = %previous.name, "plurals group never closed, dropping it");
                }
                self.plurals = Some(PluralGroup {
                    name: rest.to_string(),
                    attributes: info_attributes(key),
                    items: Vec::new(),
                });
            }
            'c' => {
                let parts: Vec<&str> = rest.split(' ').collect();
                if let Some(mut group) = self.plurals.take() {
                    if parts.len() == 2 && parts[0] == PLURALS_GROUP {
                        group.sort_items();
                        self.components.push(Component::PluralGroup(group));
                    } else {
                        warn!(key = %loc_key, "invalid plurals closing key, dropping the whole group");
                    }
                }
                self.components.extend(trivia);
                if (1..=2).contains(&parts.len()) {
                    self.components.push(Component::GroupClosing(GroupClosing {
                        name: parts[0].to_string(),
                        name_attr: parts.get(1).map(|s| s.to_string()),
                    }));
                } else {
                    warn!(key = %loc_key, "invalid closing key");
                }
            }
            'k' => {
                if let Some(value) = ledger.exported_value_or_error(key, language, errors) {
                    self.components.extend(trivia);
                    self.components.push(Component::StringValue(StringValue {
                        key: rest.to_string(),
                        value,
                        cdata,
                        attributes: info_attributes(key),
                    }));
                }
            }
            'a' => {
                let Some(value) = ledger.exported_value_or_error(key, language, errors) else {
                    return;
                };
                let parsed = rest
                    .rsplit_once('"')
                    .and_then(|(parent, index)| index.parse().ok().map(|index| (parent, index)));
                match parsed {
                    Some((parent, index)) => {
                        self.components.extend(trivia);
                        self.components.push(Component::ArrayItem(ArrayItem {
                            value,
                            index,
                            parent: parent.to_string(),
                        }));
                    }
                    None => warn!(key = %loc_key, "invalid array item key"),
                }
            }
            'p' => {
                let Some(group) = self.plurals.as_mut() else {
                    warn!(key = %loc_key, "plural item outside of a plurals group");
                    return;
                };
                let Some((name, quantity)) = rest.split_once('"') else {
                    warn!(key = %loc_key, "invalid plural item key");
                    return;
                };
                if name != group.name {
                    warn!(key = %loc_key, plurals = %group.name, "plural item of another plurals group");
                    return;
                }
                if let Some(value) = ledger.exported_value_or_error(key, language, errors) {
                    group.insert(PluralItem {
                        quantity: quantity.to_string(),
                        value,
                        cdata,
                        leading: trivia,
                    });
                }
            }
            _ => warn!(key = %loc_key, "unknown android key kind"),
        }
    }
}

/// Splits stored trivia back into whitespace, comments and opaque markup.
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
        if let Some(after) = rest.strip_prefix("<!--") {
            if let Some(end) = after.find("-->") {
                components.push(Component::Comment(after[..end].to_string()));
                rest = &after[end + 3..];
                continue;
            }
        }
        let first = rest.chars().next().map_or(1, char::len_utf8);
        let end = rest[first..].find("<!--").map_or(rest.len(), |i| i + first);
        let opaque = rest[..end].trim_end();
        components.push(Component::Opaque(opaque.to_string()));
        rest = &rest[opaque.len()..];
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::Platform, types::LineValue};
    use indoc::indoc;

    const ENGLISH: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <resources>
            <!-- Greeting -->
            <string name="hello">Hello</string>
            <string name="raw" translatable="false"><![CDATA[<b>raw</b>]]></string>
            <bool name="flag">true</bool>
            <string-array name="days">
                <item>Mon</item>
                <item>Tue</item>
            </string-array>
            <plurals name="apples">
                <item quantity="one">One apple</item>
                <item quantity="other">%d apples</item>
            </plurals>
        </resources>
    "#};

    fn folders() -> HashMap<String, String> {
        HashMap::from([("values".to_string(), "en".to_string())])
    }

    fn merged() -> Ledger {
        let mut ledger = Ledger::new();
        let files = vec![LocatedFile::new(
            "res/values/strings.xml",
            AndroidStringsFormat::from_str(ENGLISH).unwrap(),
        )];
        ledger.merge_android_files(&files, &folders());
        ledger
    }

    fn key(loc_key: &str) -> LineKey {
        LineKey::new(loc_key, env::ANDROID, "res//LANGUAGE//strings.xml")
    }

    #[test]
    fn test_merge_keys() {
        let ledger = merged();
        assert_eq!(ledger.value(&key("khello")), Some(&LineValue::single("en", "Hello")));
        assert_eq!(
            ledger.value(&key("o<resources>")),
            Some(&LineValue::single("en", NOT_EXPORTED))
        );
        assert_eq!(ledger.value(&key("adays\"1")), Some(&LineValue::single("en", "Tue")));
        assert!(ledger.value(&key("cstring-array days")).is_some());
        assert!(ledger.value(&key("capples")).is_none());
        assert!(ledger.value(&key("cplurals apples")).is_some());
        assert_eq!(
            ledger.value(&key("papples\"few")),
            Some(&LineValue::single("en", NOT_EXPORTED))
        );

        let raw = ledger.key(&key("kraw")).unwrap();
        assert_eq!(raw.user_info_value("DTA"), Some("1"));
        assert_eq!(raw.user_info_value("attr:translatable"), Some("false"));

        let hello = ledger.key(&key("khello")).unwrap();
        assert_eq!(hello.comment(), "\n    <!-- Greeting -->\n    ");
        assert_eq!(hello.user_readable_comment(), "Greeting");
    }

    #[test]
    fn test_export_is_byte_identical() {
        let ledger = merged();
        let rendered = ledger.render_platform_files(Platform::Android, &folders());
        assert!(rendered.errors.is_empty());
        assert_eq!(rendered.files["res/values/strings.xml"], ENGLISH);
    }

    #[test]
    fn test_comment_components() {
        assert_eq!(
            comment_components("\n  <!-- a --><bool name=\"b\">true</bool>\n  "),
            vec![
                Component::Whitespace("\n  ".to_string()),
                Component::Comment(" a ".to_string()),
                Component::Opaque("<bool name=\"b\">true</bool>".to_string()),
                Component::Whitespace("\n  ".to_string()),
            ]
        );
    }
}
