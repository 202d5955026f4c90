//! Pure string transforms applied by value-transform mappings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Error;

pub const DELIMITED_VALUE_TOKEN: &str = "__DELIMITED_VALUE__";

/// One step of a value-transform chain, tagged with `__type` when serialized.
///
/// Records with an unknown or malformed `__type` are kept verbatim as [`ValueTransformer::Invalid`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueTransformer {
    ToUpper,
    ToLower,
    SimpleReplacements(SimpleReplacements),
    RegionDelimitersReplacement(RegionDelimitersReplacement),
    Invalid(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimpleReplacements {
    /// `(from, to)` pairs applied in order.
    pub replacements: Vec<(String, String)>,
}

/// Replaces every `open…close` region with `replacement`, where [`DELIMITED_VALUE_TOKEN`]
/// stands for the text between the delimiters. The escape token makes the next character
/// literal; an empty one falls back to `~`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionDelimitersReplacement {
    pub replacement: String,
    #[serde(default = "default_delimiter")]
    pub open_delimiter: String,
    #[serde(default = "default_delimiter")]
    pub close_delimiter: String,
    #[serde(default = "default_escape_token")]
    pub escape_token: String,
}

fn default_delimiter() -> String {
    "|".to_string()
}

const DEFAULT_ESCAPE_TOKEN: &str = "~";

fn default_escape_token() -> String {
    DEFAULT_ESCAPE_TOKEN.to_string()
}

impl RegionDelimitersReplacement {
    pub fn new(replacement: impl Into<String>) -> Self {
        RegionDelimitersReplacement {
            replacement: replacement.into(),
            open_delimiter: default_delimiter(),
            close_delimiter: default_delimiter(),
            escape_token: default_escape_token(),
        }
    }

    pub fn apply(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut i = 0;
        while i < value.len() {
            let rest = &value[i..];
            if let Some(len) = self.escaped_len(rest) {
                out.push_str(&rest[self.escape().len()..len]);
                i += len;
                continue;
            }
            if rest.starts_with(&self.open_delimiter) {
                let start = i + self.open_delimiter.len();
                if let Some(end) = self.find_close(value, start) {
                    let inner = self.unescape(&value[start..end]);
                    out.push_str(&self.replacement.replace(DELIMITED_VALUE_TOKEN, &inner));
                    i = end + self.close_delimiter.len();
                    continue;
                }
            }
            let c = rest.chars().next().map_or(1, char::len_utf8);
            out.push_str(&rest[..c]);
            i += c;
        }
        out
    }

    fn escape(&self) -> &str {
        if self.escape_token.is_empty() {
            DEFAULT_ESCAPE_TOKEN
        } else {
            &self.escape_token
        }
    }

    /// Length of an escape sequence at the start of `s` (token plus escaped character).
    fn escaped_len(&self, s: &str) -> Option<usize> {
        let after = s.strip_prefix(self.escape())?;
        let escaped = after.chars().next()?;
        Some(self.escape().len() + escaped.len_utf8())
    }

    fn find_close(&self, value: &str, from: usize) -> Option<usize> {
        let mut i = from;
        while i < value.len() {
            let rest = &value[i..];
            if let Some(len) = self.escaped_len(rest) {
                i += len;
            } else if rest.starts_with(&self.close_delimiter) {
                return Some(i);
            } else {
                i += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
        None
    }

    fn unescape(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut i = 0;
        while i < s.len() {
            let rest = &s[i..];
            if let Some(len) = self.escaped_len(rest) {
                out.push_str(&rest[self.escape().len()..len]);
                i += len;
            } else {
                let c = rest.chars().next().map_or(1, char::len_utf8);
                out.push_str(&rest[..c]);
                i += c;
            }
        }
        out
    }
}

impl ValueTransformer {
    pub fn is_valid(&self) -> bool {
        !matches!(self, ValueTransformer::Invalid(_))
    }

    pub fn apply(&self, value: &str) -> Result<String, Error> {
        match self {
            ValueTransformer::ToUpper => Ok(value.to_uppercase()),
            ValueTransformer::ToLower => Ok(value.to_lowercase()),
            ValueTransformer::SimpleReplacements(r) => Ok(r
                .replacements
                .iter()
                .fold(value.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))),
            ValueTransformer::RegionDelimitersReplacement(r) => Ok(r.apply(value)),
            ValueTransformer::Invalid(_) => Err(Error::InvalidMapping),
        }
    }

    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            warn!("value transformer is not an object");
            return ValueTransformer::Invalid(value);
        };
        let original = map.clone();
        let Some(Value::String(kind)) = map.remove("__type") else {
            warn!("value transformer has no `__type`");
            return ValueTransformer::Invalid(Value::Object(original));
        };

        let parsed = match kind.as_str() {
            "to_upper" if map.is_empty() => Ok(ValueTransformer::ToUpper),
            "to_lower" if map.is_empty() => Ok(ValueTransformer::ToLower),
            "simple_replacements" => serde_json::from_value(Value::Object(map.clone()))
                .map(ValueTransformer::SimpleReplacements),
            "region_delimiters_replacement" => {
                serde_json::from_value::<RegionDelimitersReplacement>(Value::Object(map.clone()))
                    .and_then(|r| {
                        if r.open_delimiter.is_empty() || r.close_delimiter.is_empty() {
                            Err(serde::de::Error::custom("empty delimiter"))
                        } else {
                            Ok(ValueTransformer::RegionDelimitersReplacement(r))
                        }
                    })
            }
            other => Err(serde::de::Error::custom(format!(
                "unknown value transformer `{}`",
                other
            ))),
        };

        parsed.unwrap_or_else(|err: serde_json::Error| {
            warn!(error = %err, "keeping invalid value transformer as is");
            ValueTransformer::Invalid(Value::Object(original))
        })
    }

    pub fn to_value(&self) -> Value {
        let (kind, data) = match self {
            ValueTransformer::Invalid(value) => return value.clone(),
            ValueTransformer::ToUpper => ("to_upper", Map::new()),
            ValueTransformer::ToLower => ("to_lower", Map::new()),
            ValueTransformer::SimpleReplacements(r) => ("simple_replacements", object_of(r)),
            ValueTransformer::RegionDelimitersReplacement(r) => {
                ("region_delimiters_replacement", object_of(r))
            }
        };
        let mut map = Map::new();
        map.insert("__type".to_string(), Value::String(kind.to_string()));
        map.extend(data);
        Value::Object(map)
    }
}

/// Serializes a plain data struct to a JSON object.
pub(crate) fn object_of<T: Serialize>(data: &T) -> Map<String, Value> {
    match serde_json::to_value(data) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl Serialize for ValueTransformer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValueTransformer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ValueTransformer::from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_transforms() {
        assert_eq!(ValueTransformer::ToUpper.apply("Hello").unwrap(), "HELLO");
        assert_eq!(ValueTransformer::ToLower.apply("Hello").unwrap(), "hello");
    }

    #[test]
    fn test_simple_replacements_apply_in_order() {
        let t = ValueTransformer::SimpleReplacements(SimpleReplacements {
            replacements: vec![
                ("%@".to_string(), "%s".to_string()),
                ("%s".to_string(), "{}".to_string()),
            ],
        });
        assert_eq!(t.apply("Hi %@").unwrap(), "Hi {}");
    }

    #[test]
    fn test_region_delimiters_replacement() {
        let r = RegionDelimitersReplacement::new("<b>__DELIMITED_VALUE__</b>");
        assert_eq!(r.apply("Hello |John|!"), "Hello <b>John</b>!");
        assert_eq!(r.apply("a ~| b |c|"), "a | b <b>c</b>");
        assert_eq!(r.apply("|a~|b|"), "<b>a|b</b>");
        assert_eq!(r.apply("dangling | bar"), "dangling | bar");
        assert_eq!(r.apply("héllo |wörld|"), "héllo <b>wörld</b>");
    }

    #[test]
    fn test_custom_delimiters() {
        let r = RegionDelimitersReplacement {
            replacement: "[__DELIMITED_VALUE__]".to_string(),
            open_delimiter: "{{".to_string(),
            close_delimiter: "}}".to_string(),
            escape_token: "\\".to_string(),
        };
        assert_eq!(r.apply("x {{y}} \\{{z"), "x [y] {{z");
    }

    #[test]
    fn test_empty_escape_token_uses_tilde() {
        let value = json!({
            "__type": "region_delimiters_replacement",
            "replacement": "<b>__DELIMITED_VALUE__</b>",
            "escape_token": ""
        });
        let t = ValueTransformer::from_value(value);
        assert!(t.is_valid());
        assert_eq!(t.apply("Hi |John|").unwrap(), "Hi <b>John</b>");
        assert_eq!(t.apply("Hi ~|John|").unwrap(), "Hi |John|");
        assert_eq!(t.to_value()["escape_token"], "");
    }

    #[test]
    fn test_deserialize_known_transformers() {
        let t = ValueTransformer::from_value(json!({"__type": "to_upper"}));
        assert_eq!(t, ValueTransformer::ToUpper);

        let t = ValueTransformer::from_value(
            json!({"__type": "region_delimiters_replacement", "replacement": "*__DELIMITED_VALUE__*"}),
        );
        assert_eq!(
            t,
            ValueTransformer::RegionDelimitersReplacement(RegionDelimitersReplacement::new(
                "*__DELIMITED_VALUE__*"
            ))
        );
    }

    #[test]
    fn test_invalid_transformers_are_preserved() {
        for value in [
            json!({"__type": "to_rot13"}),
            json!({"replacement": "x"}),
            json!({"__type": "region_delimiters_replacement", "replacement": "x", "open_delimiter": ""}),
            json!({"__type": "to_upper", "extra": 1}),
            json!("to_upper"),
        ] {
            let t = ValueTransformer::from_value(value.clone());
            assert!(!t.is_valid());
            assert_eq!(t.to_value(), value);
            assert!(matches!(t.apply("x"), Err(Error::InvalidMapping)));
        }
    }
}
