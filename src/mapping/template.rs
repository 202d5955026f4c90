//! Rendering of tagged printf candidates into the gender/plurality template dialect.
//!
//! ```text
//! `male¦female`                   gender of the other person (tags gm, gf)
//! {male¦female}                   gender of the speaker (tags g{₋}m, g{₋}f)
//! <zero¦one¦two¦few¦many¦other>   plurality (tags p0, p1, p2, pf, pm, px)
//! |%1$@|  #%2$d#                  string (tag r) and number (tag r##) placeholders
//! ```

use tracing::warn;

use crate::{
    error::Error,
    placeholder::{Delimited, to_template},
    types::{NOT_EXPORTED, TaggedString},
};

pub const OTHER_GENDER_TAGS: [&str; 2] = ["gm", "gf"];
pub const MY_GENDER_TAGS: [&str; 2] = ["g{₋}m", "g{₋}f"];
pub const PLURAL_TAGS: [&str; 6] = ["p0", "p1", "p2", "pf", "pm", "px"];
pub const STRING_PLACEHOLDER_TAG: &str = "r";
pub const NUMBER_PLACEHOLDER_TAG: &str = "r##";

const PLURAL_OTHER_TAG: &str = "px";

type Dimension = &'static [&'static str];

const DIMENSIONS: [(Dimension, &str, &str); 3] = [
    (&OTHER_GENDER_TAGS, "`", "`"),
    (&MY_GENDER_TAGS, "{", "}"),
    (&PLURAL_TAGS, "<", ">"),
];

/// Renders the candidates of one language as a single template string.
///
/// Each variant uses the last compatible candidate; a missing plural form falls back to the
/// `other` form.
pub fn render(candidates: &[TaggedString]) -> Result<String, Error> {
    if candidates.is_empty() {
        return Err(Error::unresolved("no candidate value"));
    }
    let dimensions: Vec<_> = DIMENSIONS
        .iter()
        .filter(|(tags, _, _)| {
            candidates
                .iter()
                .any(|c| tags.iter().any(|tag| c.has_tag(tag)))
        })
        .collect();
    render_dimensions(candidates, &dimensions, &mut Vec::new())
}

fn render_dimensions(
    candidates: &[TaggedString],
    dimensions: &[&(Dimension, &str, &str)],
    selected: &mut Vec<&'static str>,
) -> Result<String, Error> {
    let Some(((tags, open, close), rest)) = dimensions.split_first().map(|(d, r)| (*d, r)) else {
        return select(candidates, selected).map(render_candidate);
    };

    let mut parts = Vec::with_capacity(tags.len());
    for tag in tags.iter() {
        selected.push(*tag);
        let part = render_dimensions(candidates, rest, selected);
        selected.pop();
        parts.push(part?);
    }
    Ok(format!("{}{}{}", open, parts.join("¦"), close))
}

fn dimension_of(tag: &str) -> Option<Dimension> {
    DIMENSIONS
        .iter()
        .map(|(tags, _, _)| *tags)
        .find(|tags| tags.iter().any(|t| *t == tag))
}

/// A candidate is compatible when, for every selected tag, it either carries the tag or
/// carries no tag of the same dimension.
fn is_compatible(candidate: &TaggedString, selected: &[&str]) -> bool {
    selected.iter().all(|tag| {
        candidate.has_tag(tag)
            || dimension_of(tag)
                .is_none_or(|dimension| !dimension.iter().any(|t| candidate.has_tag(t)))
    })
}

fn select<'a>(candidates: &'a [TaggedString], selected: &[&str]) -> Result<&'a TaggedString, Error> {
    let matching: Vec<_> = candidates
        .iter()
        .filter(|c| c.value != NOT_EXPORTED && is_compatible(c, selected))
        .collect();

    if let Some(chosen) = matching.last() {
        if matching.iter().filter(|c| c.tags == chosen.tags).count() > 1 {
            warn!(variant = ?selected, "several candidates for the same variant, keeping the last one");
        }
        return Ok(chosen);
    }

    if let Some(pos) = selected
        .iter()
        .position(|t| PLURAL_TAGS.iter().any(|p| p == t) && *t != PLURAL_OTHER_TAG)
    {
        let mut fallback = selected.to_vec();
        fallback[pos] = PLURAL_OTHER_TAG;
        return select(candidates, &fallback);
    }

    Err(Error::unresolved(format!(
        "no candidate for variant {:?}",
        selected
    )))
}

fn render_candidate(candidate: &TaggedString) -> String {
    let delimited = if candidate.has_tag(NUMBER_PLACEHOLDER_TAG) {
        Delimited::Numbers
    } else if candidate.has_tag(STRING_PLACEHOLDER_TAG) {
        Delimited::Strings
    } else {
        Delimited::None
    };
    to_template(&candidate.value, delimited)
}
