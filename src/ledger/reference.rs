//! Merge of reference translations into the `RefLoc` environment.

use tracing::{info, warn};

use super::Ledger;
use crate::{
    mapping::{KeyMapping, MappingComponent, PlaceholderRewriteComponent},
    reference::RefLocFile,
    types::{LineKey, LineValue, env},
};

/// Filename of every reference key.
pub const REFERENCE_FILENAME: &str = "RefLoc.strings";

/// How incoming candidates combine with the ones already in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStyle {
    /// Incoming candidates are appended to the existing ones.
    #[default]
    Add,
    /// Incoming candidates replace the existing ones of the same key and language.
    Replace,
}

impl Ledger {
    /// Stores every key of `file` as a placeholder-rewrite mapping of the `RefLoc`
    /// environment. Keys and languages absent from `file` are left alone, and so are keys
    /// whose stored value is anything other than a single placeholder rewrite.
    pub fn merge_reference_translations(&mut self, file: &RefLocFile, style: MergeStyle) {
        for language in &file.languages {
            self.add_language(language);
        }

        let mut added = 0;
        let mut skipped = 0;
        for (loc_key, languages) in &file.entries {
            let lookup = LineKey::new(loc_key.as_str(), env::REFERENCE, REFERENCE_FILENAME);
            let (key, mut rewrite) = match self.entries.get_key_value(&lookup) {
                Some((key, value)) => match placeholder_rewrite(value) {
                    Some(rewrite) => (key.clone(), rewrite),
                    None => {
                        warn!(
                            key = %loc_key,
                            "reference value is not a placeholder rewrite, leaving it alone"
                        );
                        skipped += 1;
                        continue;
                    }
                },
                None => {
                    added += 1;
                    let index = self.next_index(env::REFERENCE);
                    (lookup.with_index(index), PlaceholderRewriteComponent::default())
                }
            };

            for (language, candidates) in languages {
                self.add_language(language);
                let stored = rewrite.tagged_values.entry(language.clone()).or_default();
                if style == MergeStyle::Replace {
                    stored.clear();
                }
                stored.extend(candidates.iter().cloned());
            }

            self.replace_entry(
                key,
                LineValue::Mapping(KeyMapping::new(vec![MappingComponent::PlaceholderRewrite(
                    rewrite,
                )])),
            );
        }

        info!(
            keys = file.entries.len(),
            added,
            skipped,
            ?style,
            "merged reference translations"
        );
    }
}

/// The candidates of a stored reference value, when it is a single placeholder rewrite.
fn placeholder_rewrite(value: &LineValue) -> Option<PlaceholderRewriteComponent> {
    match value {
        LineValue::Mapping(mapping) => match mapping.components.as_slice() {
            [MappingComponent::PlaceholderRewrite(rewrite)] => Some(rewrite.clone()),
            _ => None,
        },
        LineValue::Entries(_) => None,
    }
}
