//! Loader (`spec.md` §4.9): precondition-checked bulk ingestion of a table
//! into a context. Grounded on
//! `original_source/redbiom/admin.py::load_sample_data` (including its
//! `_stage_for_load` tagging/novel-sample filtering) and the taxonomy tree
//! construction it describes in step 6.

mod error;
pub use error::LoadError;

use std::collections::BTreeMap;

use crate::ambiguity;
use crate::context::ContextStore;
use crate::index;
use crate::keys::{self, Axis};
use crate::kv::{buffered, KvAdapter};
use crate::metadata::MetadataStore;

/// Internal stack-size bound for a single push (`spec.md` §4.9 step 4).
pub const DEFAULT_LOADER_CHUNK_SIZE: usize = 7_900;

/// One (sample_id, feature_id, count) observation from a source count table.
/// Sample IDs are bare (un-tagged); the Loader applies the context tag.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub entries: Vec<(String, String, f64)>,
}

fn is_placeholder_rank(label: &str) -> bool {
    label.ends_with("__")
}

pub struct Loader<'a> {
    kv: &'a KvAdapter,
    chunk_size: usize,
}

impl<'a> Loader<'a> {
    pub fn new(kv: &'a KvAdapter) -> Self {
        Loader {
            kv,
            chunk_size: DEFAULT_LOADER_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(kv: &'a KvAdapter, chunk_size: usize) -> Self {
        Loader { kv, chunk_size }
    }

    /// Loads nonzero sample/feature counts into `ctx`, optionally attaching a
    /// taxonomy tree keyed by feature_id -> ancestor lineage (root-first,
    /// already normalized by [`crate::context::ContextStore::taxon_ancestors`]
    /// if rank padding is wanted). Returns the number of samples loaded.
    pub fn load_sample_data(
        &self,
        ctx: &str,
        tag: Option<&str>,
        table: &RawTable,
        taxonomy: Option<&BTreeMap<String, Vec<String>>>,
    ) -> Result<usize, LoadError> {
        if table.entries.is_empty() {
            return Err(LoadError::EmptyTable);
        }

        let tag = tag.unwrap_or(ambiguity::UNTAGGED);
        let context = ContextStore::new(self.kv, ctx);
        if !context.exists()? {
            return Err(LoadError::UnknownContext(ctx.to_string()));
        }

        let mut by_sample: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        let mut sample_id_of: BTreeMap<String, String> = BTreeMap::new();
        for (sample_id, feature_id, count) in &table.entries {
            let redbiom_id = ambiguity::redbiom_id(sample_id, tag);
            sample_id_of
                .entry(redbiom_id.clone())
                .or_insert_with(|| sample_id.clone());
            *by_sample
                .entry(redbiom_id)
                .or_default()
                .entry(feature_id.clone())
                .or_insert(0.0) += count;
        }

        // Metadata is a global, tag-independent namespace keyed by the bare
        // sample_id (`spec.md` §3/§8): the same sample's metadata row covers
        // every tagged preparation of it, so the presence check runs against
        // `sample_id`, never the tag-qualified `redbiom_id`.
        let metadata = MetadataStore::new(self.kv);
        for redbiom_id in by_sample.keys() {
            let sample_id = &sample_id_of[redbiom_id];
            if !metadata.has_metadata(&[sample_id])? {
                return Err(LoadError::MetadataMissing(sample_id.clone()));
            }
        }

        for (redbiom_id, features) in &by_sample {
            for (feature_id, count) in features {
                if (count - count.round()).abs() > 1e-6 {
                    return Err(LoadError::NonCountData(format!(
                        "{redbiom_id}/{feature_id}"
                    )));
                }
            }
        }

        let represented = context.samples_in_context(true)?;
        by_sample.retain(|redbiom_id, _| !represented.contains(redbiom_id));
        if by_sample.is_empty() {
            return Err(LoadError::AlreadyLoaded(ctx.to_string()));
        }

        let mut feature_totals: BTreeMap<String, f64> = BTreeMap::new();
        for features in by_sample.values() {
            for (feature_id, count) in features {
                *feature_totals.entry(feature_id.clone()).or_insert(0.0) += count;
            }
        }
        for features in by_sample.values_mut() {
            features.retain(|feature_id, _| feature_totals[feature_id] > 0.0);
        }

        let sample_names: Vec<String> = by_sample.keys().cloned().collect();
        let feature_names: Vec<String> = feature_totals
            .into_iter()
            .filter(|(_, total)| *total > 0.0)
            .map(|(f, _)| f)
            .collect();

        let sample_indices = index::get_index(self.kv, ctx, &sample_names, Axis::Sample)?;
        let feature_indices = index::get_index(self.kv, ctx, &feature_names, Axis::Feature)?;
        let sample_idx_of: BTreeMap<&String, u32> = sample_names
            .iter()
            .zip(sample_indices.iter().copied())
            .collect();
        let feature_idx_of: BTreeMap<&String, u32> = feature_names
            .iter()
            .zip(feature_indices.iter().copied())
            .collect();

        for chunk in buffered::chunked(sample_names.clone(), self.chunk_size) {
            for redbiom_id in chunk {
                let features = &by_sample[&redbiom_id];
                let pairs: Vec<(u32, u32)> = features
                    .iter()
                    .map(|(f, c)| (*c as u32, feature_idx_of[f]))
                    .collect();
                self.kv
                    .list_push_pairs(&keys::sample_vector(ctx, &redbiom_id), &pairs)?;
            }
        }

        let mut by_feature: BTreeMap<String, Vec<(u32, u32)>> = BTreeMap::new();
        for (redbiom_id, features) in &by_sample {
            let s_idx = sample_idx_of[redbiom_id];
            for (feature_id, count) in features {
                by_feature
                    .entry(feature_id.clone())
                    .or_default()
                    .push((*count as u32, s_idx));
            }
        }
        for chunk in buffered::chunked(feature_names.clone(), self.chunk_size) {
            for feature_id in chunk {
                if let Some(pairs) = by_feature.get(&feature_id) {
                    self.kv
                        .list_push_pairs(&keys::feature_vector(ctx, &feature_id), pairs)?;
                }
            }
        }

        if let Some(lineages) = taxonomy {
            self.build_taxonomy(ctx, lineages, &feature_idx_of)?;
            context.mark_has_taxonomy()?;
        }

        self.kv
            .set_add(&keys::samples_represented(ctx), &sample_names)?;
        self.kv
            .set_add(&keys::features_represented(ctx), &feature_names)?;
        context.record_load_timestamp()?;

        Ok(sample_names.len())
    }

    fn build_taxonomy(
        &self,
        ctx: &str,
        lineages: &BTreeMap<String, Vec<String>>,
        feature_idx_of: &BTreeMap<&String, u32>,
    ) -> Result<(), LoadError> {
        for (feature_id, lineage) in lineages {
            let Some(&idx) = feature_idx_of.get(feature_id) else {
                continue;
            };
            let real: Vec<&String> = lineage.iter().filter(|l| !is_placeholder_rank(l)).collect();
            for pair in real.windows(2) {
                self.kv
                    .hash_set_field(&keys::taxonomy_parents(ctx), pair[1], pair[0])?;
                self.kv
                    .set_add(&keys::taxonomy_children(ctx, pair[0]), &[pair[1].clone()])?;
            }
            if let Some(last) = real.last() {
                self.kv.set_add(
                    &keys::taxonomy_children(ctx, last),
                    &[keys::HAS_TERMINAL_SENTINEL.to_string()],
                )?;
                self.kv
                    .set_add(&keys::terminal_of(ctx, last), &[idx.to_string()])?;
                // the feature itself is a child of the deepest real rank, so
                // `taxon_ancestors` can walk from a feature_idx up through
                // the rank chain (spec.md §4.9 step 6).
                self.kv
                    .hash_set_field(&keys::taxonomy_parents(ctx), &idx.to_string(), last)?;
            }
        }
        Ok(())
    }
}
