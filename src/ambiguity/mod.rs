//! Ambiguity Resolver (`spec.md` §4.5). All `redbiom_id`/`public_id`/`sample_id`
//! splitting lives here; no other module should split on `_` or `.`
//! (`spec.md` §9).

mod error;
pub use error::AmbiguityError;

use std::collections::{BTreeMap, BTreeSet};

pub const UNTAGGED: &str = "UNTAGGED";

/// Splits a `redbiom_id` (`"<tag>_<sample_id>"`) into `(tag, sample_id)`, on the
/// first `_`. Grounded on
/// `original_source/redbiom/util.py::partition_samples_by_tags`.
pub fn split_redbiom_id(redbiom_id: &str) -> Option<(&str, &str)> {
    redbiom_id.split_once('_')
}

pub fn public_id(redbiom_id: &str) -> Option<String> {
    let (tag, sample_id) = split_redbiom_id(redbiom_id)?;
    Some(format!("{sample_id}.{tag}"))
}

pub fn redbiom_id(sample_id: &str, tag: &str) -> String {
    format!("{tag}_{sample_id}")
}

/// Whether `id` was supplied already tag-qualified (contains a `_`), as opposed
/// to a bare `sample_id`.
fn is_tagged_form(id: &str) -> bool {
    id.contains('_')
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// public_id -> the redbiom_id it was materialized from.
    pub stable: BTreeMap<String, String>,
    /// redbiom_id -> public_id, the inverse of `stable`.
    pub rename: BTreeMap<String, String>,
    /// stripped sample_id -> candidate redbiom_ids. Callers treat `len() > 1`
    /// as "ambiguous"; length-1 entries are kept too (`spec.md` §4.5).
    pub ambiguous: BTreeMap<String, Vec<String>>,
    /// Identifiers that matched nothing in the context.
    pub unobserved: Vec<String>,
}

impl Resolution {
    fn emit(&mut self, redbiom_id: &str) {
        if self.rename.contains_key(redbiom_id) {
            return;
        }
        if let Some(public) = public_id(redbiom_id) {
            self.rename.insert(redbiom_id.to_string(), public.clone());
            self.stable.insert(public, redbiom_id.to_string());
        }
    }
}

/// Resolves `ids` (a mix of bare `sample_id`s and tag-qualified `redbiom_id`s)
/// against `represented`, the context's full set of known `redbiom_id`s.
pub fn resolve<S: AsRef<str>>(represented: &BTreeSet<String>, ids: &[S]) -> Resolution {
    // Partition the context's own represented set the same way user input is
    // partitioned, building the stripped-id -> [redbiom_id...] ambiguity map.
    let mut ambiguity_map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for rid in represented {
        if let Some((_, stripped)) = split_redbiom_id(rid) {
            ambiguity_map
                .entry(stripped.to_string())
                .or_default()
                .push(rid.clone());
        }
    }

    let mut out = Resolution::default();

    for id in ids {
        let id = id.as_ref();
        if is_tagged_form(id) {
            if represented.contains(id) {
                out.emit(id);
            } else {
                out.unobserved.push(id.to_string());
                let (_, stripped) = split_redbiom_id(id).expect("tagged form has a delimiter");
                out.ambiguous
                    .entry(stripped.to_string())
                    .or_default()
                    .push(id.to_string());
            }
        } else {
            match ambiguity_map.get(id) {
                Some(candidates) => {
                    out.ambiguous.insert(id.to_string(), candidates.clone());
                    for rid in candidates {
                        out.emit(rid);
                    }
                }
                None => out.unobserved.push(id.to_string()),
            }
        }
    }

    out
}
