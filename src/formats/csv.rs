//! Delimited reference-translation exports.
//!
//! The first line is a header naming the columns: `KEY`, an optional `LCM:TAGS` and one
//! column per language. Any other column is kept in [`Row::values`] as well; the reader does
//! not know which columns are languages.

use std::{
    collections::BTreeMap,
    io::{BufRead, Write},
};

use crate::{error::Error, traits::Parser};

pub const KEY_HEADER: &str = "KEY";
pub const TAGS_HEADER: &str = "LCM:TAGS";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    pub key: String,
    /// Raw content of the tags cell, `None` when the file has no tags column.
    pub tags: Option<String>,
    /// Remaining cells by column name. Missing trailing cells are absent.
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    /// Value columns, in file order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Format {
    pub fn from_reader_with_delimiter<R: BufRead>(reader: R, delimiter: u8) -> Result<Self, Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let key_column = headers
            .iter()
            .position(|h| h == KEY_HEADER)
            .ok_or_else(|| Error::InvalidResource(format!("missing `{}` column", KEY_HEADER)))?;
        let tags_column = headers.iter().position(|h| h == TAGS_HEADER);
        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_column && Some(*i) != tags_column)
            .map(|(_, h)| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row = Row {
                key: record.get(key_column).unwrap_or_default().to_string(),
                tags: tags_column.map(|i| record.get(i).unwrap_or_default().to_string()),
                values: BTreeMap::new(),
            };
            for (i, (header, cell)) in headers.iter().zip(record.iter()).enumerate() {
                if i != key_column && Some(i) != tags_column {
                    row.values.insert(header.to_string(), cell.to_string());
                }
            }
            rows.push(row);
        }

        Ok(Format { columns, rows })
    }

    pub fn to_writer_with_delimiter<W: Write>(&self, writer: W, delimiter: u8) -> Result<(), Error> {
        let has_tags = self.rows.iter().any(|r| r.tags.is_some());
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        let mut header = vec![KEY_HEADER];
        if has_tags {
            header.push(TAGS_HEADER);
        }
        header.extend(self.columns.iter().map(String::as_str));
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.key.as_str()];
            if has_tags {
                record.push(row.tags.as_deref().unwrap_or_default());
            }
            record.extend(
                self.columns
                    .iter()
                    .map(|c| row.values.get(c).map(String::as_str).unwrap_or_default()),
            );
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        Self::from_reader_with_delimiter(reader, b',')
    }

    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        self.to_writer_with_delimiter(writer, b',')
    }
}

/// Splits a tags cell. The cell is itself a CSV document made of a single header line.
pub fn parse_tags_cell(cell: &str) -> Result<Vec<String>, Error> {
    if cell.is_empty() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(cell.as_bytes());

    let tags: Vec<String> = rdr
        .headers()?
        .iter()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if rdr.records().next().is_some() {
        return Err(Error::InvalidResource(format!(
            "tags cell spans several lines: {:?}",
            cell
        )));
    }
    if tags.is_empty() {
        return Err(Error::InvalidResource(format!("unreadable tags cell: {:?}", cell)));
    }
    Ok(tags)
}
