//! All error types for the locledger crate.
//!
//! These are returned from all fallible operations (parsing, merging, mapping resolution, export).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown format `{0}`")]
    UnknownFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("CSV parse error: {0}")]
    CsvParse(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("strings syntax error at line {line}: {message}")]
    StringsSyntax { line: usize, message: String },

    #[error("invalid data: {0}")]
    DataMismatch(String),

    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("invalid mapping")]
    InvalidMapping,

    #[error("unresolved mapping: {0}")]
    Unresolved(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Creates a new strings syntax error at the given (1-based) line.
    pub fn strings_syntax(line: usize, message: impl Into<String>) -> Self {
        Error::StringsSyntax {
            line,
            message: message.into(),
        }
    }

    /// Creates a new unresolved-mapping error.
    pub fn unresolved(message: impl Into<String>) -> Self {
        Error::Unresolved(message.into())
    }

    /// Creates a new validation error
    pub fn validation_error(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}
