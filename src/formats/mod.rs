pub mod android_strings;
pub mod csv;
pub mod strings;

use std::{fmt, path::PathBuf, str::FromStr};

use crate::error::Error;

// Reexporting the formats for easier access
pub use android_strings::Format as AndroidStringsFormat;
pub use csv::Format as ReferenceCsvFormat;
pub use strings::Format as StringsFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatType {
    Strings,
    AndroidStrings,
    ReferenceCsv,
}

impl FormatType {
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Strings => "strings",
            FormatType::AndroidStrings => "xml",
            FormatType::ReferenceCsv => "csv",
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormatType::Strings => "strings",
            FormatType::AndroidStrings => "android",
            FormatType::ReferenceCsv => "refloc-csv",
        })
    }
}

impl FromStr for FormatType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strings" | "xcode" => Ok(FormatType::Strings),
            "android" | "androidstrings" | "xml" => Ok(FormatType::AndroidStrings),
            "refloc-csv" | "csv" => Ok(FormatType::ReferenceCsv),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// A parsed file together with its path relative to the project root.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFile<F> {
    pub path: PathBuf,
    pub format: F,
}

impl<F> LocatedFile<F> {
    pub fn new(path: impl Into<PathBuf>, format: F) -> Self {
        LocatedFile {
            path: path.into(),
            format,
        }
    }

    /// The path with `/` separators, as stored in ledger filenames.
    pub fn path_string(&self) -> String {
        self.path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
