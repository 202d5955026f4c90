//! Computed ledger values.
//!
//! A [`KeyMapping`] is an ordered list of [`MappingComponent`]s whose results are concatenated.
//! Mappings are stored in the ledger table as a compact JSON array; every component is an
//! object tagged with `__type`. Components that cannot be understood are kept verbatim so that
//! saving a ledger never loses data written by a newer version.

pub mod template;
pub mod transformers;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    error::Error,
    types::{LineKey, LineValue, TaggedString},
};

pub use transformers::ValueTransformer;
use transformers::object_of;

/// How deep value-transform sources may chain before resolution gives up.
pub const MAX_RESOLUTION_DEPTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct KeyMapping {
    pub components: Vec<MappingComponent>,
    /// Cell text that does not re-serialize identically, with the components decoded from
    /// it. Written back as is while the components are unchanged.
    source: Option<(String, Vec<MappingComponent>)>,
}

impl PartialEq for KeyMapping {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MappingComponent {
    Constant(ConstantComponent),
    ValueTransforms(ValueTransformsComponent),
    PlaceholderRewrite(PlaceholderRewriteComponent),
    /// A record that could not be decoded, serialized back exactly as read.
    Invalid(Value),
}

/// A fixed string, identical in every language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantComponent {
    pub value: String,
}

/// The value of another ledger entry passed through a chain of transformers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueTransformsComponent {
    pub source_key: String,
    pub source_env: String,
    pub source_filename: String,
    #[serde(default)]
    pub transforms: Vec<ValueTransformer>,
}

/// Tagged printf candidates per language, rendered in the template dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PlaceholderRewriteComponent {
    pub tagged_values: BTreeMap<String, Vec<TaggedString>>,
}

impl ValueTransformsComponent {
    pub fn new(source: &LineKey, transforms: Vec<ValueTransformer>) -> Self {
        ValueTransformsComponent {
            source_key: source.loc_key().to_string(),
            source_env: source.env().to_string(),
            source_filename: source.filename().to_string(),
            transforms,
        }
    }

    pub fn source(&self) -> LineKey {
        LineKey::new(&self.source_key, &self.source_env, &self.source_filename)
    }
}

impl MappingComponent {
    pub fn constant(value: impl Into<String>) -> Self {
        MappingComponent::Constant(ConstantComponent {
            value: value.into(),
        })
    }

    pub fn is_valid(&self) -> bool {
        match self {
            MappingComponent::Invalid(_) => false,
            MappingComponent::ValueTransforms(c) => c.transforms.iter().all(|t| t.is_valid()),
            _ => true,
        }
    }

    fn apply(
        &self,
        language: &str,
        entries: &HashMap<LineKey, LineValue>,
        depth: usize,
    ) -> Result<String, Error> {
        match self {
            MappingComponent::Constant(c) => Ok(c.value.clone()),
            MappingComponent::ValueTransforms(c) => {
                let source = c.source();
                let value = match entries.get(&source) {
                    Some(LineValue::Entries(values)) => {
                        values.get(language).cloned().ok_or_else(|| {
                            Error::unresolved(format!(
                                "`{}` has no value for `{}`",
                                source.loc_key(),
                                language
                            ))
                        })?
                    }
                    Some(LineValue::Mapping(mapping)) => {
                        if depth >= MAX_RESOLUTION_DEPTH {
                            return Err(Error::unresolved(format!(
                                "too many chained mappings resolving `{}`",
                                source.loc_key()
                            )));
                        }
                        mapping.apply_at_depth(language, entries, depth + 1)?
                    }
                    None => {
                        return Err(Error::unresolved(format!(
                            "source key `{}` not found",
                            source.loc_key()
                        )));
                    }
                };
                c.transforms
                    .iter()
                    .try_fold(value, |acc, transform| transform.apply(&acc))
            }
            MappingComponent::PlaceholderRewrite(c) => match c.tagged_values.get(language) {
                Some(candidates) => template::render(candidates),
                None => Err(Error::unresolved(format!("no candidates for `{}`", language))),
            },
            MappingComponent::Invalid(_) => Err(Error::InvalidMapping),
        }
    }

    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            warn!("mapping component is not an object");
            return MappingComponent::Invalid(value);
        };
        let original = map.clone();
        let Some(Value::String(kind)) = map.remove("__type") else {
            warn!("mapping component has no `__type`");
            return MappingComponent::Invalid(Value::Object(original));
        };

        let data = Value::Object(map);
        let parsed = match kind.as_str() {
            "constant" => serde_json::from_value(data).map(MappingComponent::Constant),
            "value_transforms" => serde_json::from_value(data).map(MappingComponent::ValueTransforms),
            "placeholder_rewrite" => {
                serde_json::from_value(data).map(MappingComponent::PlaceholderRewrite)
            }
            other => Err(serde::de::Error::custom(format!(
                "unknown mapping component `{}`",
                other
            ))),
        };

        parsed.unwrap_or_else(|err: serde_json::Error| {
            warn!(error = %err, "keeping invalid mapping component as is");
            MappingComponent::Invalid(Value::Object(original))
        })
    }

    pub fn to_value(&self) -> Value {
        let (kind, data) = match self {
            MappingComponent::Invalid(value) => return value.clone(),
            MappingComponent::Constant(c) => ("constant", object_of(c)),
            MappingComponent::ValueTransforms(c) => ("value_transforms", object_of(c)),
            MappingComponent::PlaceholderRewrite(c) => ("placeholder_rewrite", object_of(c)),
        };
        let mut map = Map::new();
        map.insert("__type".to_string(), Value::String(kind.to_string()));
        map.extend(data);
        Value::Object(map)
    }
}

impl Serialize for MappingComponent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MappingComponent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(MappingComponent::from_value)
    }
}

impl KeyMapping {
    pub fn new(components: Vec<MappingComponent>) -> Self {
        KeyMapping {
            components,
            source: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.components.iter().all(MappingComponent::is_valid)
    }

    /// Resolves the mapping for `language` against the ledger entries.
    pub fn apply(
        &self,
        language: &str,
        entries: &HashMap<LineKey, LineValue>,
    ) -> Result<String, Error> {
        self.apply_at_depth(language, entries, 0)
    }

    fn apply_at_depth(
        &self,
        language: &str,
        entries: &HashMap<LineKey, LineValue>,
        depth: usize,
    ) -> Result<String, Error> {
        self.components
            .iter()
            .map(|c| c.apply(language, entries, depth))
            .collect()
    }

    /// Keys whose values this mapping reads.
    pub fn linked_keys(&self) -> Vec<LineKey> {
        self.components
            .iter()
            .filter_map(|c| match c {
                MappingComponent::ValueTransforms(c) => Some(c.source()),
                _ => None,
            })
            .collect()
    }

    /// Compact JSON array form, as stored in the ledger table. A mapping read from a cell
    /// that was not in that form and not modified since is written back verbatim.
    pub fn serialize(&self) -> Result<String, Error> {
        if let Some((text, components)) = &self.source {
            if *components == self.components {
                return Ok(text.clone());
            }
        }
        Ok(serde_json::to_string(&self.components)?)
    }

    /// Never fails: a non-array document becomes one invalid component, and text that is
    /// not JSON at all is kept as an invalid string component.
    pub fn from_serialized(text: &str) -> Self {
        let components = match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(values)) => {
                values.into_iter().map(MappingComponent::from_value).collect()
            }
            Ok(other) => {
                warn!("mapping is not a JSON array");
                vec![MappingComponent::Invalid(other)]
            }
            Err(err) => {
                warn!(error = %err, "mapping is not valid JSON");
                vec![MappingComponent::Invalid(Value::String(text.to_string()))]
            }
        };
        let mut mapping = KeyMapping::new(components);
        if mapping.serialize().ok().as_deref() != Some(text) {
            mapping.source = Some((text.to_string(), mapping.components.clone()));
        }
        mapping
    }
}
