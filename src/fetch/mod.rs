//! Fetcher (`spec.md` §4.10): resolves ambiguity, assembles a sparse feature
//! x sample table, optionally attaches taxonomy lineages, and optionally
//! collapses ambiguous samples under a chosen policy.

mod error;
pub use error::FetchError;

use std::collections::{BTreeMap, BTreeSet};

use crate::ambiguity::{self, Resolution};
use crate::context::ContextStore;
use crate::kv::KvAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityPolicy {
    /// Sum rows that map to the same unambiguous (stripped) sample id.
    Merge,
    /// Keep the single redbiom_id with the highest total count per stripped
    /// sample id (ties broken by first-seen). `retain_public_id` labels the
    /// surviving column with its tag-qualified public id instead of the bare
    /// stripped id.
    MostReads { retain_public_id: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseTable {
    /// Row labels, assigned in first-seen order across fetched samples.
    pub feature_ids: Vec<String>,
    /// Column labels (public ids, or policy-collapsed labels).
    pub sample_ids: Vec<String>,
    /// `data[i]` is sample `sample_ids[i]`'s sparse row: feature_id -> count.
    pub data: Vec<BTreeMap<String, u32>>,
    /// feature_id -> ancestor lineage, populated only when taxonomy was
    /// requested and the context has one.
    pub lineages: Option<BTreeMap<String, Vec<String>>>,
}

/// Resolves `ids` against `ctx`'s represented samples and fetches a sparse
/// table. See [`fetch_with_resolution`] for the core assembly logic.
pub fn fetch<S: AsRef<str>>(
    kv: &KvAdapter,
    ctx: &str,
    ids: &[S],
    taxonomy: bool,
    ambiguity_policy: Option<AmbiguityPolicy>,
) -> Result<(SparseTable, Resolution), FetchError> {
    let context = ContextStore::new(kv, ctx);
    if !context.exists()? {
        return Err(FetchError::UnknownContext(ctx.to_string()));
    }
    let represented = context.samples_in_context(true)?;
    let resolution = ambiguity::resolve(&represented, ids);
    let table = fetch_with_resolution(kv, ctx, &resolution, taxonomy, ambiguity_policy)?;
    Ok((table, resolution))
}

/// Core assembly: given an already-computed [`Resolution`], fetches every
/// referenced `redbiom_id`'s vector, builds feature-first-seen ordering, and
/// applies `ambiguity_policy` to groups in `resolution.ambiguous` with more
/// than one candidate.
pub fn fetch_with_resolution(
    kv: &KvAdapter,
    ctx: &str,
    resolution: &Resolution,
    taxonomy: bool,
    ambiguity_policy: Option<AmbiguityPolicy>,
) -> Result<SparseTable, FetchError> {
    let context = ContextStore::new(kv, ctx);
    if !context.exists()? {
        return Err(FetchError::UnknownContext(ctx.to_string()));
    }
    let represented = context.samples_in_context(true)?;

    let mut rows: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
    for redbiom_id in resolution.stable.values() {
        if !represented.contains(redbiom_id) {
            return Err(FetchError::InconsistentAmbiguity(redbiom_id.clone()));
        }
        if !rows.contains_key(redbiom_id) {
            rows.insert(redbiom_id.clone(), context.fetch_by_sample(redbiom_id)?);
        }
    }
    for candidates in resolution.ambiguous.values() {
        for redbiom_id in candidates {
            if !represented.contains(redbiom_id) {
                return Err(FetchError::InconsistentAmbiguity(redbiom_id.clone()));
            }
        }
    }

    let mut suppressed: BTreeSet<String> = BTreeSet::new();
    let mut columns: Vec<(String, BTreeMap<String, u32>)> = Vec::new();

    if let Some(policy) = ambiguity_policy {
        for (stripped_id, candidates) in &resolution.ambiguous {
            if candidates.len() <= 1 {
                continue;
            }
            for c in candidates {
                suppressed.insert(c.clone());
            }
            match policy {
                AmbiguityPolicy::Merge => {
                    let mut merged = BTreeMap::new();
                    for redbiom_id in candidates {
                        if let Some(row) = rows.get(redbiom_id) {
                            for (feature_id, count) in row {
                                *merged.entry(feature_id.clone()).or_insert(0) += count;
                            }
                        }
                    }
                    columns.push((stripped_id.clone(), merged));
                }
                AmbiguityPolicy::MostReads { retain_public_id } => {
                    let mut best: Option<(&String, u32)> = None;
                    for redbiom_id in candidates {
                        let total: u32 = rows.get(redbiom_id).map(|r| r.values().sum()).unwrap_or(0);
                        let beats_current = match best {
                            None => true,
                            Some((_, best_total)) => total > best_total,
                        };
                        if beats_current {
                            best = Some((redbiom_id, total));
                        }
                    }
                    if let Some((redbiom_id, _)) = best {
                        let row = rows.get(redbiom_id).cloned().unwrap_or_default();
                        let label = if retain_public_id {
                            ambiguity::public_id(redbiom_id).unwrap_or_else(|| stripped_id.clone())
                        } else {
                            stripped_id.clone()
                        };
                        columns.push((label, row));
                    }
                }
            }
        }
    }

    for (public_id, redbiom_id) in &resolution.stable {
        if suppressed.contains(redbiom_id) {
            continue;
        }
        let row = rows.get(redbiom_id).cloned().unwrap_or_default();
        columns.push((public_id.clone(), row));
    }

    columns.sort_by(|a, b| a.0.cmp(&b.0));

    let mut feature_ids: Vec<String> = Vec::new();
    let mut seen_features: BTreeSet<String> = BTreeSet::new();
    for (_, row) in &columns {
        for feature_id in row.keys() {
            if seen_features.insert(feature_id.clone()) {
                feature_ids.push(feature_id.clone());
            }
        }
    }

    let sample_ids: Vec<String> = columns.iter().map(|(label, _)| label.clone()).collect();
    let data: Vec<BTreeMap<String, u32>> = columns.into_iter().map(|(_, row)| row).collect();

    let lineages = if taxonomy && context.has_taxonomy()? {
        let ranks: [char; 7] = ['k', 'p', 'c', 'o', 'f', 'g', 's'];
        let lineages = context.taxon_ancestors(&feature_ids, Some(&ranks))?;
        Some(feature_ids.iter().cloned().zip(lineages).collect())
    } else {
        None
    };

    Ok(SparseTable {
        feature_ids,
        sample_ids,
        data,
        lineages,
    })
}

/// Fetches a sparse table by feature membership rather than by sample id,
/// grounded on `original_source/redbiom/fetch.py::data_from_features`:
/// `exact = true` keeps only samples carrying every requested feature,
/// `exact = false` keeps samples carrying at least one. The matched samples
/// are already full `redbiom_id`s drawn from the represented set, so no
/// ambiguity resolution is needed; columns are labeled by `public_id`.
pub fn fetch_by_features<S: AsRef<str>>(
    kv: &KvAdapter,
    ctx: &str,
    feature_ids: &[S],
    exact: bool,
    taxonomy: bool,
) -> Result<SparseTable, FetchError> {
    let context = ContextStore::new(kv, ctx);
    if !context.exists()? {
        return Err(FetchError::UnknownContext(ctx.to_string()));
    }

    let mut per_feature: Vec<BTreeSet<String>> = Vec::with_capacity(feature_ids.len());
    for feature_id in feature_ids {
        let row = context.fetch_by_feature(feature_id.as_ref())?;
        per_feature.push(row.into_keys().collect());
    }

    let matched: BTreeSet<String> = if exact {
        let mut iter = per_feature.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect()),
            None => BTreeSet::new(),
        }
    } else {
        per_feature
            .into_iter()
            .fold(BTreeSet::new(), |acc, s| acc.union(&s).cloned().collect())
    };

    let mut columns: Vec<(String, BTreeMap<String, u32>)> = Vec::with_capacity(matched.len());
    for redbiom_id in &matched {
        let row = context.fetch_by_sample(redbiom_id)?;
        let label = ambiguity::public_id(redbiom_id).unwrap_or_else(|| redbiom_id.clone());
        columns.push((label, row));
    }
    columns.sort_by(|a, b| a.0.cmp(&b.0));

    let mut feature_ids_out: Vec<String> = Vec::new();
    let mut seen_features: BTreeSet<String> = BTreeSet::new();
    for (_, row) in &columns {
        for feature_id in row.keys() {
            if seen_features.insert(feature_id.clone()) {
                feature_ids_out.push(feature_id.clone());
            }
        }
    }

    let sample_ids: Vec<String> = columns.iter().map(|(label, _)| label.clone()).collect();
    let data: Vec<BTreeMap<String, u32>> = columns.into_iter().map(|(_, row)| row).collect();

    let lineages = if taxonomy && context.has_taxonomy()? {
        let ranks: [char; 7] = ['k', 'p', 'c', 'o', 'f', 'g', 's'];
        let lineages = context.taxon_ancestors(&feature_ids_out, Some(&ranks))?;
        Some(feature_ids_out.iter().cloned().zip(lineages).collect())
    } else {
        None
    };

    Ok(SparseTable {
        feature_ids: feature_ids_out,
        sample_ids,
        data,
        lineages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use crate::load::{Loader, RawTable};
    use crate::metadata::MetadataStore;

    fn setup(kv: &KvAdapter) {
        ContextStore::new(kv, "ctx").create("test").unwrap();
        let metadata = MetadataStore::new(kv);
        // Metadata is keyed by the bare sample_id, shared across every tagged
        // preparation of that sample.
        for s in ["s1", "s2"] {
            metadata
                .load_sample(s, &[("body_site".to_string(), "gut".to_string())])
                .unwrap();
        }
        let loader = Loader::new(kv);
        loader
            .load_sample_data(
                "ctx",
                None,
                &RawTable {
                    entries: vec![("s1".to_string(), "f1".to_string(), 4.0)],
                },
                None,
            )
            .unwrap();
        loader
            .load_sample_data(
                "ctx",
                Some("tagA"),
                &RawTable {
                    entries: vec![("s1".to_string(), "f1".to_string(), 10.0)],
                },
                None,
            )
            .unwrap();
        loader
            .load_sample_data(
                "ctx",
                Some("tagB"),
                &RawTable {
                    entries: vec![("s2".to_string(), "f1".to_string(), 1.0)],
                },
                None,
            )
            .unwrap();
    }

    #[test]
    fn unambiguous_fetch_labels_by_public_id() {
        let kv = KvAdapter::open_in_memory();
        setup(&kv);
        let (table, _) = fetch(&kv, "ctx", &["tagB_s2"], false, None).unwrap();
        assert_eq!(table.sample_ids, vec!["s2.tagB".to_string()]);
        assert_eq!(table.data[0].get("f1"), Some(&1));
    }

    #[test]
    fn ambiguous_fetch_without_policy_expands_columns() {
        let kv = KvAdapter::open_in_memory();
        setup(&kv);
        let (table, resolution) = fetch(&kv, "ctx", &["s1"], false, None).unwrap();
        assert_eq!(resolution.ambiguous.get("s1").map(|v| v.len()), Some(2));
        assert_eq!(table.sample_ids.len(), 2);
    }

    #[test]
    fn merge_policy_sums_ambiguous_rows() {
        let kv = KvAdapter::open_in_memory();
        setup(&kv);
        let (table, _) = fetch(&kv, "ctx", &["s1"], false, Some(AmbiguityPolicy::Merge)).unwrap();
        assert_eq!(table.sample_ids, vec!["s1".to_string()]);
        assert_eq!(table.data[0].get("f1"), Some(&14));
    }

    #[test]
    fn most_reads_policy_keeps_highest_total() {
        let kv = KvAdapter::open_in_memory();
        setup(&kv);
        let (table, _) = fetch(
            &kv,
            "ctx",
            &["s1"],
            false,
            Some(AmbiguityPolicy::MostReads {
                retain_public_id: true,
            }),
        )
        .unwrap();
        assert_eq!(table.sample_ids, vec!["s1.tagA".to_string()]);
        assert_eq!(table.data[0].get("f1"), Some(&10));
    }

    #[test]
    fn fetch_by_features_exact_requires_all_features() {
        let kv = KvAdapter::open_in_memory();
        ContextStore::new(&kv, "ctx").create("test").unwrap();
        let metadata = MetadataStore::new(&kv);
        for s in ["s1", "s2"] {
            metadata
                .load_sample(s, &[("body_site".to_string(), "gut".to_string())])
                .unwrap();
        }
        let loader = Loader::new(&kv);
        loader
            .load_sample_data(
                "ctx",
                None,
                &RawTable {
                    entries: vec![
                        ("s1".to_string(), "f1".to_string(), 4.0),
                        ("s1".to_string(), "f2".to_string(), 1.0),
                        ("s2".to_string(), "f1".to_string(), 2.0),
                    ],
                },
                None,
            )
            .unwrap();

        let exact = fetch_by_features(&kv, "ctx", &["f1", "f2"], true, false).unwrap();
        assert_eq!(exact.sample_ids, vec!["s1.UNTAGGED".to_string()]);

        let any = fetch_by_features(&kv, "ctx", &["f1", "f2"], false, false).unwrap();
        assert_eq!(
            any.sample_ids,
            vec!["s1.UNTAGGED".to_string(), "s2.UNTAGGED".to_string()]
        );
    }
}
