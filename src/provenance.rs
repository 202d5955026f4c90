//! Helpers for recording where each environment was last imported from.
//!
//! Provenance is stored in the ledger metadata map under reserved key prefixes, so the
//! metadata stays a flat string map that other tools can carry along untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PROVENANCE_PREFIX: &str = "locledger.provenance.";
const IMPORT_PATH_SUFFIX: &str = ".import_path";
const LANGUAGE_FOLDERS_SUFFIX: &str = ".language_folders";

/// The latest import of one environment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Project root the files were read from.
    pub import_path: Option<String>,
    /// Folder name to language mapping used for the import.
    pub language_folders: BTreeMap<String, String>,
}

impl ImportRecord {
    pub fn is_empty(&self) -> bool {
        self.import_path.is_none() && self.language_folders.is_empty()
    }
}

fn key(env: &str, suffix: &str) -> String {
    format!("{}{}{}", PROVENANCE_PREFIX, env, suffix)
}

/// Stores `record` as the latest import of `env`, replacing the previous one.
pub fn set_import_record(
    metadata: &mut BTreeMap<String, String>,
    env: &str,
    record: &ImportRecord,
) {
    let path_key = key(env, IMPORT_PATH_SUFFIX);
    match &record.import_path {
        Some(path) => {
            metadata.insert(path_key, path.clone());
        }
        None => {
            metadata.remove(&path_key);
        }
    }

    let folders_key = key(env, LANGUAGE_FOLDERS_SUFFIX);
    match serde_json::to_string(&record.language_folders) {
        Ok(json) if !record.language_folders.is_empty() => {
            metadata.insert(folders_key, json);
        }
        _ => {
            metadata.remove(&folders_key);
        }
    }
}

/// Reads the latest import of `env`.
pub fn import_record(metadata: &BTreeMap<String, String>, env: &str) -> Option<ImportRecord> {
    let record = ImportRecord {
        import_path: metadata.get(&key(env, IMPORT_PATH_SUFFIX)).cloned(),
        language_folders: metadata
            .get(&key(env, LANGUAGE_FOLDERS_SUFFIX))
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default(),
    };
    if record.is_empty() { None } else { Some(record) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::env;

    #[test]
    fn test_import_record_roundtrip() {
        let mut metadata = BTreeMap::from([("user.note".to_string(), "keep me".to_string())]);
        let record = ImportRecord {
            import_path: Some("/work/app".to_string()),
            language_folders: BTreeMap::from([("fr.lproj".to_string(), "French".to_string())]),
        };

        set_import_record(&mut metadata, env::APPLE_STRINGS, &record);
        assert_eq!(import_record(&metadata, env::APPLE_STRINGS), Some(record));
        assert_eq!(import_record(&metadata, env::ANDROID), None);
        assert_eq!(metadata["user.note"], "keep me");
    }

    #[test]
    fn test_clearing_record() {
        let mut metadata = BTreeMap::new();
        let record = ImportRecord {
            import_path: Some("/work/app".to_string()),
            language_folders: BTreeMap::new(),
        };
        set_import_record(&mut metadata, env::ANDROID, &record);
        assert_eq!(metadata.len(), 1);

        set_import_record(&mut metadata, env::ANDROID, &ImportRecord::default());
        assert!(metadata.is_empty());
    }
}
