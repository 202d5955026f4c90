//! Support for Android `strings.xml` resource files.
//!
//! Strings, string arrays and plurals are parsed into structural components; whitespace,
//! comments and elements the ledger does not know about are kept as raw trivia so a file
//! renders back as it was read. Values are unescaped on read and re-escaped on write, which
//! means inline markup inside a value (`<b>`, `<xliff:g>`…) is read as text and written back
//! escaped.

use std::{
    fmt::{self, Display, Formatter},
    io::{BufRead, Write},
};

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use tracing::warn;

use crate::{error::Error, traits::Parser};

/// Declaration written at the top of exported files.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Plural quantities in the order they are written.
pub const QUANTITIES: [&str; 6] = ["zero", "one", "two", "few", "many", "other"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Raw text before the `<resources>` element.
    pub prolog: String,
    pub components: Vec<Component>,
    /// Raw text after the `</resources>` element.
    pub epilog: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Whitespace(String),
    /// Content of a `<!--…-->` comment.
    Comment(String),
    /// Markup kept verbatim (elements of unsupported resource types).
    Opaque(String),
    /// Full opening tag of `<resources>` or `<string-array>`.
    GroupOpening(String),
    GroupClosing(GroupClosing),
    StringValue(StringValue),
    ArrayItem(ArrayItem),
    PluralGroup(PluralGroup),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupClosing {
    pub name: String,
    pub name_attr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringValue {
    pub key: String,
    pub value: String,
    pub cdata: bool,
    /// Attributes other than `name`, in source order.
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayItem {
    pub value: String,
    pub index: usize,
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralGroup {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub items: Vec<PluralItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralItem {
    pub quantity: String,
    pub value: String,
    pub cdata: bool,
    /// Whitespace and comments preceding the item.
    pub leading: Vec<Component>,
}

impl PluralGroup {
    pub fn item(&self, quantity: &str) -> Option<&PluralItem> {
        self.items.iter().find(|i| i.quantity == quantity)
    }

    /// Adds an item; an item already present for the quantity is replaced.
    pub fn insert(&mut self, item: PluralItem) {
        if let Some(pos) = self.items.iter().position(|i| i.quantity == item.quantity) {
            warn!(
                plurals = %self.name,
                quantity = %item.quantity,
                "duplicate plural quantity, keeping the last one"
            );
            self.items.remove(pos);
        }
        self.items.push(item);
    }

    /// Sorts items canonically: known quantities first, then unknown ones lexically.
    pub fn sort_items(&mut self) {
        self.items
            .sort_by(|a, b| quantity_rank(&a.quantity).cmp(&quantity_rank(&b.quantity)));
    }
}

/// Sort key of a plural quantity.
pub fn quantity_rank(quantity: &str) -> (usize, &str) {
    match QUANTITIES.iter().position(|q| *q == quantity) {
        Some(pos) => (pos, ""),
        None => (QUANTITIES.len(), quantity),
    }
}

/// Escapes `&`, `<` and `>`; quotes and apostrophes are left alone.
pub fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn write_attributes(f: &mut Formatter<'_>, attributes: &[(String, String)]) -> fmt::Result {
    for (name, value) in attributes {
        write!(f, " {}=\"{}\"", name, escape_attribute(value))?;
    }
    Ok(())
}

fn write_element(
    f: &mut Formatter<'_>,
    tag: &str,
    attributes: &[(String, String)],
    value: &str,
    cdata: bool,
) -> fmt::Result {
    write!(f, "<{}", tag)?;
    write_attributes(f, attributes)?;
    if value.is_empty() {
        return f.write_str("/>");
    }
    if cdata {
        write!(f, "><![CDATA[{}]]></{}>", value, tag)
    } else {
        write!(f, ">{}</{}>", escape_text(value), tag)
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Component::Whitespace(text) | Component::Opaque(text) => f.write_str(text),
            Component::Comment(content) => write!(f, "<!--{}-->", content),
            Component::GroupOpening(full) => f.write_str(full),
            Component::GroupClosing(closing) => write!(f, "</{}>", closing.name),
            Component::StringValue(string) => {
                let mut attributes = vec![("name".to_string(), string.key.clone())];
                attributes.extend(string.attributes.iter().cloned());
                write_element(f, "string", &attributes, &string.value, string.cdata)
            }
            Component::ArrayItem(item) => write!(f, "<item>{}</item>", escape_text(&item.value)),
            Component::PluralGroup(group) => {
                write!(f, "<plurals name=\"{}\"", escape_attribute(&group.name))?;
                write_attributes(f, &group.attributes)?;
                f.write_str(">")?;
                for item in &group.items {
                    for component in &item.leading {
                        component.fmt(f)?;
                    }
                    let attributes = [("quantity".to_string(), item.quantity.clone())];
                    write_element(f, "item", &attributes, &item.value, item.cdata)?;
                }
                Ok(())
            }
        }
    }
}

impl Format {
    /// A document with the standard declaration and a trailing newline.
    pub fn with_components(components: Vec<Component>) -> Self {
        Format {
            prolog: XML_DECLARATION.to_string(),
            components,
            epilog: "\n".to_string(),
        }
    }

    pub fn string_values(&self) -> impl Iterator<Item = &StringValue> {
        self.components.iter().filter_map(|c| match c {
            Component::StringValue(s) => Some(s),
            _ => None,
        })
    }

    pub fn plural_groups(&self) -> impl Iterator<Item = &PluralGroup> {
        self.components.iter().filter_map(|c| match c {
            Component::PluralGroup(p) => Some(p),
            _ => None,
        })
    }
}

impl Parser for Format {
    fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, Error> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        XmlParser::new(content).parse()
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        writer.write_all(self.prolog.as_bytes())?;
        for component in &self.components {
            write!(writer, "{}", component)?;
        }
        writer.write_all(self.epilog.as_bytes())?;
        Ok(())
    }
}

struct XmlParser<'a> {
    input: &'a str,
    reader: Reader<&'a [u8]>,
    components: Vec<Component>,
}

struct Step<'a> {
    event: Event<'a>,
    start: usize,
    end: usize,
}

impl<'a> XmlParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(false);
        XmlParser {
            input,
            reader,
            components: Vec::new(),
        }
    }

    fn next(&mut self) -> Result<Step<'a>, Error> {
        let start = self.reader.buffer_position() as usize;
        let event = self.reader.read_event().map_err(Error::XmlParse)?;
        let end = self.reader.buffer_position() as usize;
        Ok(Step { event, start, end })
    }

    fn raw(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    fn trivia(&self, start: usize, end: usize) -> Component {
        let text = self.raw(start, end);
        if text.chars().all(char::is_whitespace) {
            Component::Whitespace(text.to_string())
        } else {
            Component::Opaque(text.to_string())
        }
    }

    /// Consumes an element the parser does not model, returning its raw markup.
    fn skip_element(&mut self, start: &BytesStart<'a>, from: usize) -> Result<Component, Error> {
        self.reader
            .read_to_end(start.name())
            .map_err(Error::XmlParse)?;
        let end = self.reader.buffer_position() as usize;
        Ok(Component::Opaque(self.raw(from, end).to_string()))
    }

    fn parse(mut self) -> Result<Format, Error> {
        let prolog = loop {
            let step = self.next()?;
            match step.event {
                Event::Start(ref e) if e.name().as_ref() == b"resources" => {
                    let opening = self.raw(step.start, step.end).to_string();
                    self.components.push(Component::GroupOpening(opening));
                    break self.raw(0, step.start).to_string();
                }
                Event::Empty(ref e) if e.name().as_ref() == b"resources" => {
                    self.components
                        .push(Component::GroupOpening("<resources>".to_string()));
                    self.components.push(Component::GroupClosing(GroupClosing {
                        name: "resources".to_string(),
                        name_attr: None,
                    }));
                    return Ok(Format {
                        prolog: self.raw(0, step.start).to_string(),
                        components: self.components,
                        epilog: self.input[step.end..].to_string(),
                    });
                }
                Event::Decl(_)
                | Event::Comment(_)
                | Event::Text(_)
                | Event::PI(_)
                | Event::DocType(_) => continue,
                Event::Eof => {
                    return Err(Error::InvalidResource(
                        "missing <resources> root element".to_string(),
                    ));
                }
                _ => {
                    return Err(Error::InvalidResource(
                        "expected <resources> as root element".to_string(),
                    ));
                }
            }
        };

        loop {
            let step = self.next()?;
            match step.event {
                Event::Text(_) | Event::CData(_) | Event::PI(_) | Event::DocType(_) | Event::Decl(_) => {
                    let trivia = self.trivia(step.start, step.end);
                    self.components.push(trivia);
                }
                Event::Comment(ref c) => {
                    let content = String::from_utf8_lossy(c).into_owned();
                    self.components.push(Component::Comment(content));
                }
                Event::Start(ref e) => match e.name().as_ref() {
                    b"string" => {
                        let string = self.parse_string(e)?;
                        self.components.push(Component::StringValue(string));
                    }
                    b"string-array" => self.parse_array(e, step.start, step.end)?,
                    b"plurals" => self.parse_plurals(e)?,
                    _ => {
                        let opaque = self.skip_element(e, step.start)?;
                        self.components.push(opaque);
                    }
                },
                Event::Empty(ref e) if e.name().as_ref() == b"string" => {
                    let (key, attributes) = named_attributes(e, "string")?;
                    self.components.push(Component::StringValue(StringValue {
                        key,
                        value: String::new(),
                        cdata: false,
                        attributes,
                    }));
                }
                Event::Empty(_) => {
                    let opaque = Component::Opaque(self.raw(step.start, step.end).to_string());
                    self.components.push(opaque);
                }
                Event::End(_) => {
                    self.components.push(Component::GroupClosing(GroupClosing {
                        name: "resources".to_string(),
                        name_attr: None,
                    }));
                    return Ok(Format {
                        prolog,
                        components: self.components,
                        epilog: self.input[step.end..].to_string(),
                    });
                }
                Event::Eof => {
                    return Err(Error::InvalidResource(
                        "missing </resources> closing tag".to_string(),
                    ));
                }
            }
        }
    }

    fn parse_string(&mut self, e: &BytesStart<'a>) -> Result<StringValue, Error> {
        let (key, attributes) = named_attributes(e, "string")?;
        let (value, cdata) = self.parse_value(b"string", &key)?;
        Ok(StringValue {
            key,
            value,
            cdata,
            attributes,
        })
    }

    fn parse_array(&mut self, e: &BytesStart<'a>, start: usize, end: usize) -> Result<(), Error> {
        let (name, _) = named_attributes(e, "string-array")?;
        let opening = self.raw(start, end).to_string();
        self.components.push(Component::GroupOpening(opening));

        let mut index = 0;
        loop {
            let step = self.next()?;
            match step.event {
                Event::Text(_) => {
                    let trivia = self.trivia(step.start, step.end);
                    self.components.push(trivia);
                }
                Event::Comment(ref c) => {
                    let content = String::from_utf8_lossy(c).into_owned();
                    self.components.push(Component::Comment(content));
                }
                Event::Start(ref item) if item.name().as_ref() == b"item" => {
                    let (value, _) = self.parse_value(b"item", &name)?;
                    self.components.push(Component::ArrayItem(ArrayItem {
                        value,
                        index,
                        parent: name.clone(),
                    }));
                    index += 1;
                }
                Event::Empty(ref item) if item.name().as_ref() == b"item" => {
                    self.components.push(Component::ArrayItem(ArrayItem {
                        value: String::new(),
                        index,
                        parent: name.clone(),
                    }));
                    index += 1;
                }
                Event::End(_) => {
                    self.components.push(Component::GroupClosing(GroupClosing {
                        name: "string-array".to_string(),
                        name_attr: Some(name),
                    }));
                    return Ok(());
                }
                Event::Eof => {
                    return Err(Error::InvalidResource(format!(
                        "unterminated string-array `{}`",
                        name
                    )));
                }
                Event::Start(ref other) => {
                    let opaque = self.skip_element(other, step.start)?;
                    self.components.push(opaque);
                }
                _ => {
                    let opaque = Component::Opaque(self.raw(step.start, step.end).to_string());
                    self.components.push(opaque);
                }
            }
        }
    }

    fn parse_plurals(&mut self, e: &BytesStart<'a>) -> Result<(), Error> {
        let (name, attributes) = named_attributes(e, "plurals")?;
        let mut group = PluralGroup {
            name: name.clone(),
            attributes,
            items: Vec::new(),
        };
        let mut pending = Vec::new();

        loop {
            let step = self.next()?;
            match step.event {
                Event::Text(_) => pending.push(self.trivia(step.start, step.end)),
                Event::Comment(ref c) => {
                    pending.push(Component::Comment(String::from_utf8_lossy(c).into_owned()));
                }
                Event::Start(ref item) if item.name().as_ref() == b"item" => {
                    let quantity = quantity_attribute(item, &name)?;
                    let (value, cdata) = self.parse_value(b"item", &name)?;
                    group.insert(PluralItem {
                        quantity,
                        value,
                        cdata,
                        leading: std::mem::take(&mut pending),
                    });
                }
                Event::Empty(ref item) if item.name().as_ref() == b"item" => {
                    let quantity = quantity_attribute(item, &name)?;
                    group.insert(PluralItem {
                        quantity,
                        value: String::new(),
                        cdata: false,
                        leading: std::mem::take(&mut pending),
                    });
                }
                Event::End(_) => {
                    self.components.push(Component::PluralGroup(group));
                    self.components.extend(pending);
                    self.components.push(Component::GroupClosing(GroupClosing {
                        name: "plurals".to_string(),
                        name_attr: Some(name),
                    }));
                    return Ok(());
                }
                Event::Eof => {
                    return Err(Error::InvalidResource(format!(
                        "unterminated plurals `{}`",
                        name
                    )));
                }
                Event::Start(ref other) => pending.push(self.skip_element(other, step.start)?),
                _ => pending.push(Component::Opaque(self.raw(step.start, step.end).to_string())),
            }
        }
    }

    /// Reads the content of a value element up to its closing tag.
    fn parse_value(&mut self, tag: &[u8], owner: &str) -> Result<(String, bool), Error> {
        let mut value = String::new();
        let mut cdata = false;
        let mut has_text = false;
        let mut depth = 0usize;

        loop {
            let step = self.next()?;
            match step.event {
                Event::Text(ref t) => {
                    let text = t.unescape().map_err(Error::XmlParse)?;
                    has_text |= !text.trim().is_empty();
                    value.push_str(&text);
                }
                Event::CData(ref c) => {
                    cdata = true;
                    value.push_str(&String::from_utf8_lossy(c));
                }
                Event::Start(_) => {
                    warn!(key = %owner, "markup inside value is read as text");
                    depth += 1;
                    value.push_str(self.raw(step.start, step.end));
                }
                Event::Empty(_) => {
                    warn!(key = %owner, "markup inside value is read as text");
                    value.push_str(self.raw(step.start, step.end));
                }
                Event::End(ref e) if depth == 0 && e.name().as_ref() == tag => break,
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    value.push_str(self.raw(step.start, step.end));
                }
                Event::Comment(_) => {
                    return Err(Error::InvalidResource(format!(
                        "comment inside value of `{}`",
                        owner
                    )));
                }
                Event::Eof => {
                    return Err(Error::InvalidResource(format!(
                        "unexpected end of file in value of `{}`",
                        owner
                    )));
                }
                _ => {}
            }
        }

        if cdata && has_text {
            warn!(key = %owner, "value mixes CDATA and text, writing it back as CDATA");
        }
        Ok((value, cdata))
    }
}

/// Returns the `name` attribute and the other attributes of an element.
fn named_attributes(
    e: &BytesStart<'_>,
    element: &str,
) -> Result<(String, Vec<(String, String)>), Error> {
    let mut name = None;
    let mut others = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::DataMismatch(e.to_string()))?;
        let value = attr.unescape_value()?.to_string();
        match attr.key.as_ref() {
            b"name" => name = Some(value),
            key => others.push((String::from_utf8_lossy(key).into_owned(), value)),
        }
    }
    let name = name
        .ok_or_else(|| Error::InvalidResource(format!("{} tag missing 'name'", element)))?;
    Ok((name, others))
}

fn quantity_attribute(e: &BytesStart<'_>, plurals: &str) -> Result<String, Error> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::DataMismatch(e.to_string()))?;
        if attr.key.as_ref() == b"quantity" {
            return Ok(attr.unescape_value()?.to_string());
        }
    }
    Err(Error::InvalidResource(format!(
        "item of plurals `{}` missing 'quantity'",
        plurals
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Parser;

    const SAMPLE: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    <!-- Greetings -->\n    <string name=\"hello\">Hello &amp; welcome</string>\n    <string name=\"raw\"><![CDATA[<b>bold</b>]]></string>\n    <string name=\"empty\"/>\n    <string name=\"fixed\" translatable=\"false\">Fixed</string>\n    <bool name=\"flag\">true</bool>\n    <string-array name=\"planets\">\n        <item>Mercury</item>\n        <item>Venus</item>\n    </string-array>\n    <plurals name=\"apples\">\n        <!-- one apple -->\n        <item quantity=\"one\">One apple</item>\n        <item quantity=\"other\">%d apples</item>\n    </plurals>\n</resources>\n";

    #[test]
    fn test_round_trip_is_byte_identical() {
        let format = Format::from_str(SAMPLE).unwrap();
        assert_eq!(format.to_text().unwrap(), SAMPLE);
    }

    #[test]
    fn test_parse_components() {
        let format = Format::from_str(SAMPLE).unwrap();
        assert_eq!(format.prolog, XML_DECLARATION);
        assert_eq!(format.epilog, "\n");

        let strings: Vec<_> = format.string_values().collect();
        assert_eq!(strings.len(), 4);
        assert_eq!(strings[0].value, "Hello & welcome");
        assert!(!strings[0].cdata);
        assert_eq!(strings[1].value, "<b>bold</b>");
        assert!(strings[1].cdata);
        assert_eq!(strings[2].value, "");
        assert_eq!(
            strings[3].attributes,
            vec![("translatable".to_string(), "false".to_string())]
        );

        assert!(format
            .components
            .contains(&Component::Opaque("<bool name=\"flag\">true</bool>".to_string())));

        let items: Vec<_> = format
            .components
            .iter()
            .filter_map(|c| match c {
                Component::ArrayItem(item) => Some((item.index, item.value.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(items, vec![(0, "Mercury"), (1, "Venus")]);

        let plurals: Vec<_> = format.plural_groups().collect();
        assert_eq!(plurals.len(), 1);
        let one = plurals[0].item("one").unwrap();
        assert_eq!(one.value, "One apple");
        assert_eq!(
            one.leading,
            vec![
                Component::Whitespace("\n        ".to_string()),
                Component::Comment(" one apple ".to_string()),
                Component::Whitespace("\n        ".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_quantity_last_wins() {
        let xml = "<resources><plurals name=\"p\"><item quantity=\"one\">first</item><item quantity=\"one\">second</item></plurals></resources>";
        let format = Format::from_str(xml).unwrap();
        let group = format.plural_groups().next().unwrap();
        assert_eq!(group.items.len(), 1);
        assert_eq!(group.item("one").unwrap().value, "second");
    }

    #[test]
    fn test_quantity_rank() {
        let mut group = PluralGroup {
            name: "p".to_string(),
            attributes: Vec::new(),
            items: Vec::new(),
        };
        for quantity in ["other", "zz", "one", "aa", "zero"] {
            group.insert(PluralItem {
                quantity: quantity.to_string(),
                value: quantity.to_string(),
                cdata: false,
                leading: Vec::new(),
            });
        }
        group.sort_items();
        let order: Vec<_> = group.items.iter().map(|i| i.quantity.as_str()).collect();
        assert_eq!(order, vec!["zero", "one", "other", "aa", "zz"]);
    }

    #[test]
    fn test_escaping_on_write() {
        let component = Component::StringValue(StringValue {
            key: "k".to_string(),
            value: "a < b && c > d, it's \"quoted\"".to_string(),
            cdata: false,
            attributes: Vec::new(),
        });
        assert_eq!(
            component.to_string(),
            "<string name=\"k\">a &lt; b &amp;&amp; c &gt; d, it's \"quoted\"</string>"
        );
    }

    #[test]
    fn test_missing_name_attribute() {
        let err = Format::from_str("<resources><string>No name</string></resources>").unwrap_err();
        assert!(err.to_string().contains("missing 'name'"));
    }

    #[test]
    fn test_missing_quantity_attribute() {
        let xml = "<resources><plurals name=\"p\"><item>x</item></plurals></resources>";
        assert!(Format::from_str(xml).is_err());
    }

    #[test]
    fn test_comment_inside_value_is_an_error() {
        let xml = "<resources><string name=\"a\">x<!-- no -->y</string></resources>";
        assert!(Format::from_str(xml).is_err());
    }

    #[test]
    fn test_wrong_root_and_unterminated_document() {
        assert!(Format::from_str("<foo></foo>").is_err());
        assert!(Format::from_str("<resources><string name=\"a\">b</string>").is_err());
        assert!(Format::from_str("").is_err());
    }

    #[test]
    fn test_mixed_cdata_is_accepted() {
        let xml = "<resources><string name=\"a\">x <![CDATA[<y>]]></string></resources>";
        let format = Format::from_str(xml).unwrap();
        let string = format.string_values().next().unwrap();
        assert_eq!(string.value, "x <y>");
        assert!(string.cdata);
    }
}
