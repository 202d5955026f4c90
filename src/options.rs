//! Options for exporting platform files and storing the ledger table.

/// Text encoding of exported strings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringsEncoding {
    #[default]
    Utf8,
    /// Little-endian UTF-16 with a byte order mark.
    Utf16,
}

/// Export behavior for [`crate::Ledger::export_platform_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Encoding of Apple strings files. Android files are always UTF-8.
    pub strings_encoding: StringsEncoding,
    /// Whether missing parent folders are created.
    pub create_directories: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            strings_encoding: StringsEncoding::Utf8,
            create_directories: true,
        }
    }
}

impl ExportOptions {
    /// Creates default export options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encoding of strings files.
    pub fn with_strings_encoding(mut self, encoding: StringsEncoding) -> Self {
        self.strings_encoding = encoding;
        self
    }

    /// Enables/disables creation of missing folders.
    pub fn with_create_directories(mut self, create_directories: bool) -> Self {
        self.create_directories = create_directories;
        self
    }
}

/// Layout of the serialized ledger table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub delimiter: u8,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions { delimiter: b',' }
    }
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}
