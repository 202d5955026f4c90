//! The ledger stored as a delimited table, one row per key.
//!
//! ```text
//! __Key,__Env,__Filename,__Comment,__UserInfo,__GroupComment,__ReadableComment,__Mapping,en,fr
//! ```
//!
//! Rows are written in export order and the index of a key is its row position when the
//! table is read back. An empty language cell is an untranslated value; an empty translation
//! is written as [`EMPTY_VALUE`]. Metadata lives next to the table in a JSON file.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::{BufWriter, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use super::Ledger;
use crate::{
    error::Error,
    mapping::KeyMapping,
    options::TableOptions,
    project,
    types::{LineKey, LineValue},
};

/// Written for translations that are the empty string.
pub const EMPTY_VALUE: &str = "!¡!EMPTY!¡!";

pub const FIXED_HEADERS: [&str; 8] = [
    "__Key",
    "__Env",
    "__Filename",
    "__Comment",
    "__UserInfo",
    "__GroupComment",
    "__ReadableComment",
    "__Mapping",
];

/// Path of the metadata file of a table.
pub fn metadata_path(table: &Path) -> PathBuf {
    let mut name = table.file_name().unwrap_or_default().to_os_string();
    name.push(".meta.json");
    table.with_file_name(name)
}

impl Ledger {
    /// Every language of the ledger, including languages only found in values.
    fn table_languages(&self) -> Vec<String> {
        let mut languages: BTreeSet<&str> = self.languages.iter().map(String::as_str).collect();
        for value in self.entries.values() {
            if let LineValue::Entries(values) = value {
                languages.extend(values.keys().map(String::as_str));
            }
        }
        languages.into_iter().map(str::to_string).collect()
    }

    pub fn write_table<W: Write>(&self, writer: W, options: &TableOptions) -> Result<(), Error> {
        let languages = self.table_languages();
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .from_writer(writer);

        let mut header: Vec<&str> = FIXED_HEADERS.to_vec();
        header.extend(languages.iter().map(String::as_str));
        wtr.write_record(&header)?;

        for key in self.sorted_keys() {
            let user_info = if key.user_info().is_empty() {
                String::new()
            } else {
                serde_json::to_string(key.user_info())?
            };
            let mut record = vec![
                key.loc_key().to_string(),
                key.env().to_string(),
                key.filename().to_string(),
                key.comment().to_string(),
                user_info,
                key.user_readable_group_comment().to_string(),
                key.user_readable_comment().to_string(),
            ];
            match &self.entries[key] {
                LineValue::Mapping(mapping) => {
                    record.push(mapping.serialize()?);
                    record.extend(languages.iter().map(|_| String::new()));
                }
                LineValue::Entries(values) => {
                    record.push(String::new());
                    record.extend(languages.iter().map(|language| {
                        match values.get(language).map(String::as_str) {
                            None => String::new(),
                            Some("") => EMPTY_VALUE.to_string(),
                            Some(value) => value.to_string(),
                        }
                    }));
                }
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn read_table<R: Read>(reader: R, options: &TableOptions) -> Result<Ledger, Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(options.delimiter)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let fixed: Vec<&str> = headers.iter().take(FIXED_HEADERS.len()).collect();
        if fixed != FIXED_HEADERS {
            return Err(Error::InvalidResource(format!(
                "unexpected ledger header {:?}",
                fixed
            )));
        }
        let languages: Vec<String> = headers
            .iter()
            .skip(FIXED_HEADERS.len())
            .map(str::to_string)
            .collect();

        let mut ledger = Ledger::new();
        for language in &languages {
            ledger.add_language(language);
        }

        for (index, record) in rdr.records().enumerate() {
            let record = record?;
            let cell = |i: usize| record.get(i).unwrap_or_default();

            let user_info: BTreeMap<String, String> = match cell(4) {
                "" => BTreeMap::new(),
                json => serde_json::from_str(json)?,
            };
            let key = LineKey::new(cell(0), cell(1), cell(2))
                .with_index(index)
                .with_comment(cell(3))
                .with_user_info(user_info)
                .with_readable_comments(cell(5), cell(6));

            let value = match cell(7) {
                "" => LineValue::Entries(
                    languages
                        .iter()
                        .enumerate()
                        .filter_map(|(i, language)| match cell(FIXED_HEADERS.len() + i) {
                            "" => None,
                            EMPTY_VALUE => Some((language.clone(), String::new())),
                            value => Some((language.clone(), value.to_string())),
                        })
                        .collect(),
                ),
                mapping => LineValue::Mapping(KeyMapping::from_serialized(mapping)),
            };

            if ledger.entries.contains_key(&key) {
                warn!(key = %key.loc_key(), env = %key.env(), filename = %key.filename(), "duplicate ledger row, keeping the last one");
            }
            ledger.replace_entry(key, value);
        }

        debug!(keys = ledger.len(), "read ledger table");
        Ok(ledger)
    }

    /// Writes the table to `path` and the metadata next to it.
    pub fn save(&self, path: &Path, options: &TableOptions) -> Result<(), Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_table(&mut writer, options)?;
        writer.flush()?;

        let meta_path = metadata_path(path);
        if self.metadata.is_empty() {
            match fs::remove_file(&meta_path) {
                Err(err) if err.kind() != ErrorKind::NotFound => return Err(err.into()),
                _ => {}
            }
        } else {
            fs::write(&meta_path, serde_json::to_string_pretty(&self.metadata)?)?;
        }
        Ok(())
    }

    /// Reads a table saved with [`Ledger::save`], decoding it according to its BOM.
    pub fn load(path: &Path, options: &TableOptions) -> Result<Ledger, Error> {
        let text = project::read_text(path)?;
        let mut ledger = Ledger::read_table(text.as_bytes(), options)?;

        let meta_path = metadata_path(path);
        if meta_path.exists() {
            ledger.metadata = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
        }
        Ok(ledger)
    }
}
