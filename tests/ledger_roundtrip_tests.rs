use std::collections::HashMap;

use locledger::formats::StringsFormat;
use locledger::traits::Parser;
use locledger::types::{TODO_LOC, UNKNOWN_LANGUAGE, env};
use locledger::{
    KeyMapping, Ledger, LineKey, LineValue, LocatedFile, MappingComponent, Platform,
    PlatformFiles, TableOptions,
};

fn strings_files(files: &[(&str, &str)]) -> PlatformFiles {
    PlatformFiles::Strings(
        files
            .iter()
            .map(|(path, text)| LocatedFile::new(*path, StringsFormat::from_str(text).unwrap()))
            .collect(),
    )
}

fn folders(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(folder, language)| (folder.to_string(), language.to_string()))
        .collect()
}

fn export(ledger: &Ledger, folder_to_language: &HashMap<String, String>) -> Vec<(String, String)> {
    let rendered = ledger.render_platform_files(Platform::Apple, folder_to_language);
    assert!(rendered.errors.is_empty());
    rendered.files.into_iter().collect()
}

#[test]
fn test_unmapped_file_exports_todo_for_other_languages() {
    let mut ledger = Ledger::new();
    ledger.merge_platform_files(
        &strings_files(&[(
            "Localizable.strings",
            "\"hello\"/*yeay*//*super happy*/=//oneline comment\n\"Hello!\";",
        )]),
        &HashMap::new(),
    );
    assert_eq!(ledger.languages(), [UNKNOWN_LANGUAGE]);

    let files = export(&ledger, &folders(&[("dummy.lproj", "dummy")]));
    assert_eq!(
        files,
        vec![(
            "Localizable.strings".to_string(),
            format!(
                "\"hello\"/*yeay*//*super happy*/=//oneline comment\n\"{}\";\n",
                TODO_LOC
            )
        )]
    );
}

#[test]
fn test_weird_but_valid_statement() {
    let mapping = folders(&[("en.lproj", "en")]);
    let mut ledger = Ledger::new();
    ledger.merge_platform_files(
        &strings_files(&[("en.lproj/Localizable.strings", "this_is_weird_but_valid;")]),
        &mapping,
    );
    assert_eq!(
        export(&ledger, &mapping)[0].1,
        "this_is_weird_but_valid;\n"
    );

    let key = LineKey::new(
        "this_is_weird_but_valid",
        env::APPLE_STRINGS,
        "//LANGUAGE//Localizable.strings",
    );
    ledger.set_value(&key, "en", "Now with a value");
    assert_eq!(
        export(&ledger, &mapping)[0].1,
        "this_is_weird_but_valid = \"Now with a value\";\n"
    );

    ledger.set_mapping(
        &key,
        KeyMapping::new(vec![MappingComponent::constant("this_is_weird_but_valid")]),
    );
    assert_eq!(
        export(&ledger, &mapping)[0].1,
        "this_is_weird_but_valid;\n"
    );
}

#[test]
fn test_merge_is_idempotent() {
    let mapping = folders(&[("en.lproj", "en"), ("fr.lproj", "fr")]);
    let files = strings_files(&[
        (
            "en.lproj/Localizable.strings",
            "/* Title */\n\"title\" = \"Title\";\n\n/* Buttons */\n\n\"ok\" = \"OK\";\n",
        ),
        ("fr.lproj/Localizable.strings", "\"title\" = \"Titre\";\n\"ok\" = \"OK\";\n"),
    ]);

    let mut ledger = Ledger::new();
    ledger.merge_platform_files(&files, &mapping);
    let first = ledger.clone();
    ledger.merge_platform_files(&files, &mapping);

    assert_eq!(ledger.entries(), first.entries());
    for key in first.entries().keys() {
        assert_eq!(ledger.key(key).unwrap().index(), first.key(key).unwrap().index());
        assert_eq!(ledger.key(key).unwrap().comment(), first.key(key).unwrap().comment());
    }

    let ok = ledger
        .key(&LineKey::new("ok", env::APPLE_STRINGS, "//LANGUAGE//Localizable.strings"))
        .unwrap();
    assert_eq!(ok.user_readable_group_comment(), "Buttons");
    assert_eq!(ok.user_readable_comment(), "");
}

#[test]
fn test_keys_keep_file_order() {
    let mapping = folders(&[("en.lproj", "en")]);
    let mut ledger = Ledger::new();
    ledger.merge_platform_files(
        &strings_files(&[
            ("en.lproj/B.strings", "\"z\" = \"Z\";\n\"a\" = \"A\";\n"),
            ("en.lproj/A.strings", "\"m\" = \"M\";\n"),
        ]),
        &mapping,
    );

    let order: Vec<(&str, &str)> = ledger
        .sorted_keys()
        .into_iter()
        .map(|k| (k.filename(), k.loc_key()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("//LANGUAGE//A.strings", "m"),
            ("//LANGUAGE//B.strings", "z"),
            ("//LANGUAGE//B.strings", "a"),
        ]
    );
}

#[test]
fn test_obsolete_keys_are_pruned_per_environment() {
    let mapping = folders(&[("en.lproj", "en")]);
    let mut ledger = Ledger::new();
    ledger.merge_platform_files(
        &strings_files(&[("en.lproj/Localizable.strings", "\"a\" = \"A\";\n\"b\" = \"B\";\n")]),
        &mapping,
    );
    let reference = LineKey::new("greeting", env::REFERENCE, "RefLoc.strings");
    ledger.set_mapping(
        &reference,
        KeyMapping::new(vec![MappingComponent::constant("Hi")]),
    );

    ledger.merge_platform_files(
        &strings_files(&[("en.lproj/Localizable.strings", "\"b\" = \"B2\";\n")]),
        &mapping,
    );

    let filename = "//LANGUAGE//Localizable.strings";
    assert!(ledger.value(&LineKey::new("a", env::APPLE_STRINGS, filename)).is_none());
    // The ledger owns the translation of a key that is still present.
    assert_eq!(
        ledger.value(&LineKey::new("b", env::APPLE_STRINGS, filename)),
        Some(&LineValue::single("en", "B"))
    );
    assert!(ledger.value(&reference).is_some());
    assert_eq!(ledger.len(), 2);
}

#[test]
fn test_table_round_trip_preserves_export() {
    let mapping = folders(&[("en.lproj", "en"), ("fr.lproj", "fr")]);
    let english = "/* Greeting */\n\"hello\" = \"Hello\";\n\n// Farewell\nbye = \"Bye\" ;\n";
    let mut ledger = Ledger::new();
    ledger.merge_platform_files(
        &strings_files(&[
            ("en.lproj/Localizable.strings", english),
            ("fr.lproj/Localizable.strings", "\"hello\" = \"Bonjour\";\n"),
        ]),
        &mapping,
    );
    let exported = export(&ledger, &mapping);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    ledger.save(&path, &TableOptions::default()).unwrap();
    let loaded = Ledger::load(&path, &TableOptions::default()).unwrap();

    assert_eq!(export(&loaded, &mapping), exported);
    assert_eq!(exported[0].1, english);
    assert_eq!(
        exported[1].1,
        format!(
            "/* Greeting */\n\"hello\" = \"Bonjour\";\n\n// Farewell\nbye = \"{}\" ;\n",
            TODO_LOC
        )
    );
}
