//! The parser seam shared by every file format of the crate.

use std::{
    fs::File,
    io::{BufRead, Cursor, Read, Write},
    path::Path,
};

use crate::error::Error;

/// Reading and rendering of one localization file.
///
/// Implementors only provide [`Parser::from_reader`] and [`Parser::to_writer`]; rendering must
/// reproduce the parsed input byte for byte.
///
/// ```rust,no_run
/// use locledger::{formats::StringsFormat, traits::Parser};
///
/// let format = StringsFormat::read_from("fr.lproj/Localizable.strings")?;
/// assert_eq!(format.to_text()?, std::fs::read_to_string("fr.lproj/Localizable.strings")?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Parser {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error>
    where
        Self: Sized;

    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error>;

    /// Reads a file, decoding it according to its byte order mark (UTF-8 when absent), so
    /// UTF-16 strings files parse like UTF-8 ones.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let file = File::open(path)?;
        let mut decoded = String::new();
        encoding_rs_io::DecodeReaderBytesBuilder::new()
            .bom_override(true)
            .build(file)
            .read_to_string(&mut decoded)?;
        Self::from_str(&decoded)
    }

    fn to_text(&self) -> Result<String, Error> {
        let mut out = Vec::new();
        self.to_writer(&mut out)?;
        String::from_utf8(out).map_err(|e| Error::DataMismatch(e.to_string()))
    }

    fn from_str(s: &str) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(s))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(bytes))
    }
}
