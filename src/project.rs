//! File-system glue: reading and writing encoded files, finding the localization files of a
//! project and importing them into a ledger.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, info, warn};
use unic_langid::LanguageIdentifier;

use crate::{
    error::Error,
    formats::{AndroidStringsFormat, LocatedFile, StringsFormat},
    ledger::{Ledger, PlatformFiles},
    options::StringsEncoding,
    provenance::{ImportRecord, set_import_record},
    traits::Parser,
    types::env,
};

const LPROJ_SUFFIX: &str = ".lproj";
const STRINGS_EXTENSION: &str = "strings";
const ANDROID_VALUES_FOLDER: &str = "values";

/// Reads a text file, decoding it according to its byte order mark (UTF-8 when absent).
pub fn read_text(path: &Path) -> Result<String, Error> {
    let bytes = fs::read(path)?;
    let (encoding, bom_length) = Encoding::for_bom(&bytes).unwrap_or((UTF_8, 0));
    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
    if had_errors {
        warn!(path = %path.display(), encoding = encoding.name(), "invalid byte sequences replaced while decoding");
    }
    Ok(text.into_owned())
}

/// Encodes `text` for a strings file. UTF-16 output is little-endian with a byte order mark.
pub fn encode_text(text: &str, encoding: StringsEncoding) -> Vec<u8> {
    match encoding {
        StringsEncoding::Utf8 => text.as_bytes().to_vec(),
        StringsEncoding::Utf16 => {
            let mut bytes = Vec::with_capacity(2 + text.len() * 2);
            bytes.extend_from_slice(&[0xFF, 0xFE]);
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            bytes
        }
    }
}

pub fn write_file(path: &Path, bytes: &[u8], create_directories: bool) -> Result<(), Error> {
    if create_directories {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn relative_path(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

fn collect_strings_paths(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), Error> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            collect_strings_paths(&path, out)?;
        } else if path.extension().is_some_and(|e| e == STRINGS_EXTENSION)
            && path
                .parent()
                .and_then(Path::file_name)
                .is_some_and(|p| p.to_string_lossy().ends_with(LPROJ_SUFFIX))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Parses every `*.lproj/*.strings` file under `root`. Files that fail to parse are logged
/// and skipped.
pub fn strings_files_in_project(root: &Path) -> Result<Vec<LocatedFile<StringsFormat>>, Error> {
    let mut paths = Vec::new();
    collect_strings_paths(root, &mut paths)?;
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match StringsFormat::read_from(&path) {
            Ok(format) => files.push(LocatedFile::new(relative_path(root, &path), format)),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable strings file"),
        }
    }
    debug!(root = %root.display(), count = files.len(), "found strings files");
    Ok(files)
}

/// Parses `root/<res folder>/<language folder>/<filename>` for every combination. Missing
/// files are ignored; files that fail to parse are logged and skipped.
pub fn android_files_in_project(
    root: &Path,
    res_folders: &[&str],
    filenames: &[&str],
    language_folders: &[&str],
) -> Vec<LocatedFile<AndroidStringsFormat>> {
    let mut files = Vec::new();
    for res_folder in res_folders {
        for language_folder in language_folders {
            for filename in filenames {
                let relative: PathBuf = [*res_folder, *language_folder, *filename].iter().collect();
                let path = root.join(&relative);
                if !path.is_file() {
                    continue;
                }
                match AndroidStringsFormat::read_from(&path) {
                    Ok(format) => files.push(LocatedFile::new(relative, format)),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unreadable android file")
                    }
                }
            }
        }
    }
    files
}

/// Merges the strings files of the project at `root` and records the import in the ledger
/// metadata.
pub fn import_strings_project(
    ledger: &mut Ledger,
    root: &Path,
    folder_to_language: &HashMap<String, String>,
) -> Result<(), Error> {
    let files = strings_files_in_project(root)?;
    info!(root = %root.display(), files = files.len(), "importing strings files");
    ledger.merge_platform_files(&PlatformFiles::Strings(files), folder_to_language);
    record_import(ledger, env::APPLE_STRINGS, root, folder_to_language);
    Ok(())
}

/// Merges the Android resource files of the project at `root` and records the import in the
/// ledger metadata. The language folders are the keys of `folder_to_language`.
pub fn import_android_project(
    ledger: &mut Ledger,
    root: &Path,
    res_folders: &[&str],
    filenames: &[&str],
    folder_to_language: &HashMap<String, String>,
) {
    let mut language_folders: Vec<&str> = folder_to_language.keys().map(String::as_str).collect();
    language_folders.sort();
    let files = android_files_in_project(root, res_folders, filenames, &language_folders);
    info!(root = %root.display(), files = files.len(), "importing android files");
    ledger.merge_platform_files(&PlatformFiles::Android(files), folder_to_language);
    record_import(ledger, env::ANDROID, root, folder_to_language);
}

fn record_import(
    ledger: &mut Ledger,
    env: &str,
    root: &Path,
    folder_to_language: &HashMap<String, String>,
) {
    let record = ImportRecord {
        import_path: Some(root.display().to_string()),
        language_folders: folder_to_language
            .iter()
            .map(|(f, l)| (f.clone(), l.clone()))
            .collect::<BTreeMap<_, _>>(),
    };
    set_import_record(ledger.metadata_mut(), env, &record);
}

/// Validates a language candidate (underscores accepted) and returns its canonical form.
fn normalize_language(candidate: &str) -> Option<String> {
    let id: LanguageIdentifier = candidate.replace('_', "-").parse().ok()?;
    // Longer language subtags are legacy names (`English.lproj`) or Android qualifiers.
    if !(2..=3).contains(&id.language.as_str().len()) {
        return None;
    }
    Some(id.to_string())
}

/// Language of an Android `values-…` folder: `values-fr`, `values-pt-rBR`, `values-b+zh+Hans`.
fn android_folder_language(folder: &str) -> Option<String> {
    let rest = folder.strip_prefix("values-")?;
    if let Some(tags) = rest.strip_prefix("b+") {
        return normalize_language(&tags.replace('+', "-"));
    }
    let mut tokens = rest.split('-');
    let language = tokens.next()?;
    let tag = match tokens.next() {
        None => language.to_string(),
        Some(region) => {
            let region = region.strip_prefix('r')?;
            if tokens.next().is_some() {
                return None;
            }
            format!("{}-{}", language, region)
        }
    };
    normalize_language(&tag)
}

/// Builds a folder-to-language mapping from folder names (`fr.lproj`, `values-fr`).
///
/// Folders that do not name a language are left out, except `Base.lproj` and `values`,
/// which map to `default_language` when one is given.
pub fn infer_folder_languages<S: AsRef<str>>(
    folders: &[S],
    default_language: Option<&str>,
) -> HashMap<String, String> {
    let mut mapping = HashMap::new();
    for folder in folders {
        let folder = folder.as_ref();
        let language = if folder == ANDROID_VALUES_FOLDER || folder == "Base.lproj" {
            default_language.map(str::to_string)
        } else if let Some(stem) = folder.strip_suffix(LPROJ_SUFFIX) {
            normalize_language(stem)
        } else {
            android_folder_language(folder)
        };
        match language {
            Some(language) => {
                mapping.insert(folder.to_string(), language);
            }
            None => debug!(folder, "folder does not name a language"),
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::Platform, options::ExportOptions, provenance::import_record};

    #[test]
    fn test_infer_folder_languages() {
        let mapping = infer_folder_languages(
            &[
                "fr.lproj",
                "zh_Hant.lproj",
                "English.lproj",
                "Base.lproj",
                "values",
                "values-pt-rBR",
                "values-b+sr+Latn",
                "values-land",
                "values-v21",
                "values-fr-rCA-night",
            ],
            Some("en"),
        );
        assert_eq!(mapping["fr.lproj"], "fr");
        assert_eq!(mapping["zh_Hant.lproj"], "zh-Hant");
        assert_eq!(mapping["Base.lproj"], "en");
        assert_eq!(mapping["values"], "en");
        assert_eq!(mapping["values-pt-rBR"], "pt-BR");
        assert_eq!(mapping["values-b+sr+Latn"], "sr-Latn");
        assert!(!mapping.contains_key("English.lproj"));
        assert!(!mapping.contains_key("values-land"));
        assert!(!mapping.contains_key("values-v21"));
        assert!(!mapping.contains_key("values-fr-rCA-night"));
    }

    #[test]
    fn test_utf16_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.strings");
        write_file(&path, &encode_text("\"k\" = \"é\";\n", StringsEncoding::Utf16), false).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        assert_eq!(read_text(&path).unwrap(), "\"k\" = \"é\";\n");
    }

    #[test]
    fn test_import_and_export_strings_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let text = "/* Title */\n\"title\" = \"Titre\";\n";
        write_file(&root.join("App/fr.lproj/Localizable.strings"), text.as_bytes(), true).unwrap();
        write_file(&root.join("App/fr.lproj/.hidden.strings"), b"broken", true).unwrap();
        write_file(&root.join("App/fr.lproj/notes.txt"), b"ignored", true).unwrap();

        let folders = HashMap::from([("fr.lproj".to_string(), "fr".to_string())]);
        let mut ledger = Ledger::new();
        import_strings_project(&mut ledger, root, &folders).unwrap();
        assert_eq!(ledger.len(), 1);
        let record = import_record(ledger.metadata(), env::APPLE_STRINGS).unwrap();
        assert_eq!(record.language_folders["fr.lproj"], "fr");

        let out = tempfile::tempdir().unwrap();
        let report =
            ledger.export_platform_files(Platform::Apple, out.path(), &folders, &ExportOptions::default());
        assert!(report.failures.is_empty());
        assert_eq!(report.written, vec![out.path().join("App/fr.lproj/Localizable.strings")]);
        assert_eq!(
            read_text(&out.path().join("App/fr.lproj/Localizable.strings")).unwrap(),
            text
        );
    }

    #[test]
    fn test_android_files_in_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let xml = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    <string name=\"a\">A</string>\n</resources>\n";
        write_file(&root.join("app/res/values/strings.xml"), xml.as_bytes(), true).unwrap();
        write_file(&root.join("app/res/values-fr/strings.xml"), b"<resources>", true).unwrap();

        let files = android_files_in_project(
            root,
            &["app/res"],
            &["strings.xml"],
            &["values", "values-fr", "values-de"],
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path_string(), "app/res/values/strings.xml");
    }
}
