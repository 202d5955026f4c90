use std::collections::{BTreeMap, HashMap};

use locledger::formats::{AndroidStringsFormat, StringsFormat};
use locledger::traits::Parser;
use locledger::{Ledger, LocatedFile, Platform, PlatformFiles, TableOptions};
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("valid key regex")
}

fn value_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 _\\-\\.,!\\?]{1,30}").expect("valid value regex")
}

fn comment_strategy() -> impl Strategy<Value = Option<String>> {
    proptest::option::of(
        proptest::string::string_regex("[A-Za-z0-9 ,\\.]{0,20}").expect("valid comment regex"),
    )
}

fn dataset_strategy() -> impl Strategy<Value = BTreeMap<String, (String, Option<String>)>> {
    prop::collection::btree_map(key_strategy(), (value_strategy(), comment_strategy()), 1..8)
}

fn strings_text(values: &BTreeMap<String, (String, Option<String>)>) -> String {
    values
        .iter()
        .map(|(key, (value, comment))| match comment {
            Some(comment) => format!("/*{}*/\n\"{}\" = \"{}\";\n", comment, key, value),
            None => format!("\"{}\" = \"{}\";\n", key, value),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn android_text(values: &BTreeMap<String, (String, Option<String>)>) -> String {
    let mut text = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n");
    for (key, (value, comment)) in values {
        if let Some(comment) = comment.as_deref().filter(|c| !c.is_empty()) {
            text.push_str(&format!("    <!--{}-->\n", comment));
        }
        text.push_str(&format!("    <string name=\"{}\">{}</string>\n", key, value));
    }
    text.push_str("</resources>\n");
    text
}

fn folders() -> HashMap<String, String> {
    HashMap::from([
        ("en.lproj".to_string(), "en".to_string()),
        ("values".to_string(), "en".to_string()),
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn strings_file_survives_ledger_round_trip(values in dataset_strategy()) {
        let text = strings_text(&values);
        let files = vec![LocatedFile::new(
            "en.lproj/Localizable.strings",
            StringsFormat::from_str(&text).unwrap(),
        )];
        let mut ledger = Ledger::new();
        ledger.merge_platform_files(&PlatformFiles::Strings(files), &folders());
        prop_assert_eq!(ledger.len(), values.len());

        let mut table = Vec::new();
        ledger.write_table(&mut table, &TableOptions::default()).unwrap();
        let loaded = Ledger::read_table(table.as_slice(), &TableOptions::default()).unwrap();

        let rendered = loaded.render_platform_files(Platform::Apple, &folders());
        prop_assert!(rendered.errors.is_empty());
        prop_assert_eq!(&rendered.files["/en.lproj/Localizable.strings"], &text);
    }

    #[test]
    fn android_file_survives_ledger_round_trip(values in dataset_strategy()) {
        let text = android_text(&values);
        let files = vec![LocatedFile::new(
            "res/values/strings.xml",
            AndroidStringsFormat::from_str(&text).unwrap(),
        )];
        let mut ledger = Ledger::new();
        ledger.merge_platform_files(&PlatformFiles::Android(files), &folders());

        let rendered = ledger.render_platform_files(Platform::Android, &folders());
        prop_assert!(rendered.errors.is_empty());
        prop_assert_eq!(&rendered.files["res/values/strings.xml"], &text);
    }

    #[test]
    fn merging_twice_changes_nothing(values in dataset_strategy()) {
        let text = strings_text(&values);
        let files = PlatformFiles::Strings(vec![LocatedFile::new(
            "en.lproj/Localizable.strings",
            StringsFormat::from_str(&text).unwrap(),
        )]);
        let mut ledger = Ledger::new();
        ledger.merge_platform_files(&files, &folders());
        let first = ledger.clone();
        ledger.merge_platform_files(&files, &folders());

        prop_assert_eq!(ledger.entries(), first.entries());
        for key in first.entries().keys() {
            prop_assert_eq!(ledger.key(key).unwrap().index(), first.key(key).unwrap().index());
        }
    }
}
