//! Context Store (`spec.md` §4.3). Per-context namespace: axis vectors,
//! represented sets, taxonomy edges, and context state.

mod error;
pub use error::ContextError;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::Utc;
use log::debug;

use crate::ambiguity;
use crate::caching::{Caching, EphemeralCache};
use crate::kv::KvAdapter;
use crate::keys::{self, Axis};

pub struct ContextStore<'a> {
    kv: &'a KvAdapter,
    ctx: String,
}

impl<'a> ContextStore<'a> {
    pub fn new(kv: &'a KvAdapter, ctx: impl Into<String>) -> Self {
        ContextStore {
            kv,
            ctx: ctx.into(),
        }
    }

    pub fn ctx(&self) -> &str {
        &self.ctx
    }

    pub fn exists(&self) -> Result<bool, ContextError> {
        let contexts = self.kv.hash_get_all(&keys::contexts_hash())?;
        Ok(contexts.contains_key(&self.ctx))
    }

    fn require_exists(&self) -> Result<(), ContextError> {
        if self.exists()? {
            Ok(())
        } else {
            Err(ContextError::UnknownContext(self.ctx.clone()))
        }
    }

    /// Creates the context descriptor. Create-only: calling twice fails.
    pub fn create(&self, description: &str) -> Result<(), ContextError> {
        if self.exists()? {
            return Err(ContextError::AlreadyExists(self.ctx.clone()));
        }
        self.kv
            .hash_set_field(&keys::contexts_hash(), &self.ctx, description)?;
        self.kv
            .hash_set_field(&keys::context_state(&self.ctx), "db-version", "1")?;
        Ok(())
    }

    /// Records a load event timestamp, newest first (`spec.md` §6:
    /// `state.timestamps`, `%d.%b.%Y`, newest at index 0).
    pub fn record_load_timestamp(&self) -> Result<(), ContextError> {
        let stamp = Utc::now().format("%d.%b.%Y").to_string();
        self.kv
            .list_push_front_string(&keys::timestamps_list(), &stamp)?;
        Ok(())
    }

    pub fn has_taxonomy(&self) -> Result<bool, ContextError> {
        let state = self.kv.hash_get_all(&keys::context_state(&self.ctx))?;
        Ok(state.get("has-taxonomy").map(|v| v == "1").unwrap_or(false))
    }

    pub fn mark_has_taxonomy(&self) -> Result<(), ContextError> {
        self.kv
            .hash_set_field(&keys::context_state(&self.ctx), "has-taxonomy", "1")?;
        Ok(())
    }

    /// `unambiguous = true`: the full tag-qualified `redbiom_id`s (each
    /// guaranteed unique). `unambiguous = false`: the stripped `sample_id`s,
    /// which may collide across tags. Matches
    /// `original_source/redbiom/fetch.py::samples_in_context` exactly
    /// (including its inverted naming, kept for fidelity).
    pub fn samples_in_context(&self, unambiguous: bool) -> Result<BTreeSet<String>, ContextError> {
        self.require_exists()?;
        let represented = self.kv.set_members(&keys::samples_represented(&self.ctx))?;
        if unambiguous {
            Ok(represented)
        } else {
            Ok(represented
                .iter()
                .filter_map(|rid| ambiguity::split_redbiom_id(rid).map(|(_, s)| s.to_string()))
                .collect())
        }
    }

    pub fn features_in_context(&self) -> Result<BTreeSet<String>, ContextError> {
        self.require_exists()?;
        Ok(self.kv.set_members(&keys::features_represented(&self.ctx))?)
    }

    pub fn tags_in_context(&self) -> Result<BTreeSet<String>, ContextError> {
        self.require_exists()?;
        let represented = self.kv.set_members(&keys::samples_represented(&self.ctx))?;
        Ok(represented
            .iter()
            .filter_map(|rid| ambiguity::split_redbiom_id(rid).map(|(tag, _)| tag.to_string()))
            .collect())
    }

    fn axis_name(&self, axis: Axis, idx: u32) -> Result<Option<String>, ContextError> {
        let hash = self.kv.hash_get_all(&keys::axis_index_inverted(&self.ctx, axis))?;
        Ok(hash.get(&idx.to_string()).cloned())
    }

    /// `spec.md` §4.3: reads the packed (count, feature_idx) list for a sample
    /// and joins through the feature-index-inverted map.
    pub fn fetch_by_sample(
        &self,
        redbiom_id: &str,
    ) -> Result<BTreeMap<String, u32>, ContextError> {
        self.require_exists()?;
        let pairs = self
            .kv
            .list_range_pairs(&keys::sample_vector(&self.ctx, redbiom_id))?;
        let mut out = BTreeMap::new();
        for (count, feature_idx) in pairs {
            if let Some(name) = self.axis_name(Axis::Feature, feature_idx)? {
                out.insert(name, count);
            }
        }
        Ok(out)
    }

    /// Symmetric to [`Self::fetch_by_sample`].
    pub fn fetch_by_feature(
        &self,
        feature_id: &str,
    ) -> Result<BTreeMap<String, u32>, ContextError> {
        self.require_exists()?;
        let pairs = self
            .kv
            .list_range_pairs(&keys::feature_vector(&self.ctx, feature_id))?;
        let mut out = BTreeMap::new();
        for (count, sample_idx) in pairs {
            if let Some(name) = self.axis_name(Axis::Sample, sample_idx)? {
                out.insert(name, count);
            }
        }
        Ok(out)
    }

    /// Resolves `id` to the key under which its taxonomy edges are stored: its
    /// feature index if it has one (tips are stored by `feature_idx`),
    /// otherwise the name itself (internal nodes are stored by taxon name).
    fn taxonomy_node_key(&self, id: &str) -> Result<String, ContextError> {
        let forward = self.kv.hash_get_all(&keys::axis_index(&self.ctx, Axis::Feature))?;
        Ok(forward.get(id).cloned().unwrap_or_else(|| id.to_string()))
    }

    /// `spec.md` §4.3/§8 scenario 6: ancestor chain root-first, optionally
    /// padded to a fixed rank sequence (`normalize`, e.g. `kpcofgs`) by
    /// appending `"{rank}__"` placeholders for trailing missing ranks.
    /// Grounded on `original_source/redbiom/fetch.py::taxon_ancestors`.
    pub fn taxon_ancestors<S: AsRef<str>>(
        &self,
        ids: &[S],
        normalize: Option<&[char]>,
    ) -> Result<Vec<Vec<String>>, ContextError> {
        self.require_exists()?;
        let parents = self.kv.hash_get_all(&keys::taxonomy_parents(&self.ctx))?;
        let mut cache: EphemeralCache<String, String> = EphemeralCache::default();
        for (k, v) in &parents {
            let _ = cache.write(k, v);
        }

        let mut lineages = Vec::with_capacity(ids.len());
        for id in ids {
            let mut current = self.taxonomy_node_key(id.as_ref())?;
            let mut lineage = Vec::new();
            while let Ok(parent) = cache.read(&current) {
                lineage.push(parent.clone());
                current = parent.clone();
            }
            lineage.reverse();

            let lineage = match normalize {
                None => lineage,
                Some(ranks) => {
                    let mut padded = Vec::with_capacity(ranks.len());
                    for (i, rank) in ranks.iter().enumerate() {
                        match lineage.get(i) {
                            Some(l) if !l.is_empty() => padded.push(l.clone()),
                            _ => padded.push(format!("{rank}__")),
                        }
                    }
                    padded
                }
            };
            lineages.push(lineage);
        }
        Ok(lineages)
    }

    /// Breadth-first descent over `taxonomy-children`, collecting
    /// `terminal-of` sets at `has-terminal` sentinels, then mapping tip
    /// `feature_idx`s back to `feature_id`s. Grounded on
    /// `original_source/redbiom/fetch.py::taxon_descendents`.
    pub fn taxon_descendents(&self, taxon: &str) -> Result<BTreeSet<String>, ContextError> {
        self.require_exists()?;
        let mut to_visit = VecDeque::from([taxon.to_string()]);
        let mut tip_indices = BTreeSet::new();
        let mut seen = BTreeSet::new();

        while let Some(node) = to_visit.pop_front() {
            if !seen.insert(node.clone()) {
                continue;
            }
            let children = self
                .kv
                .set_members(&keys::taxonomy_children(&self.ctx, &node))?;
            for child in children {
                if child == keys::HAS_TERMINAL_SENTINEL {
                    let tips = self.kv.set_members(&keys::terminal_of(&self.ctx, &node))?;
                    tip_indices.extend(tips);
                } else {
                    to_visit.push_back(child);
                }
            }
        }

        debug!(
            "taxon_descendents({}): {} tip indices",
            taxon,
            tip_indices.len()
        );

        let inverted = self
            .kv
            .hash_get_all(&keys::axis_index_inverted(&self.ctx, Axis::Feature))?;
        Ok(tip_indices
            .iter()
            .filter_map(|idx| inverted.get(idx).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_taxonomy(kv: &KvAdapter) -> ContextStore<'_> {
        let ctx = ContextStore::new(kv, "deblur@150nt");
        ctx.create("test context").unwrap();
        ctx
    }

    #[test]
    fn unknown_context_is_an_error() {
        let kv = KvAdapter::open_in_memory();
        let ctx = ContextStore::new(&kv, "nope");
        assert!(matches!(
            ctx.samples_in_context(true),
            Err(ContextError::UnknownContext(_))
        ));
    }

    #[test]
    fn create_then_create_again_fails() {
        let kv = KvAdapter::open_in_memory();
        let ctx = ctx_with_taxonomy(&kv);
        assert!(matches!(
            ctx.create("again"),
            Err(ContextError::AlreadyExists(_))
        ));
    }

    #[test]
    fn samples_in_context_matches_original_naming() {
        let kv = KvAdapter::open_in_memory();
        let ctx = ctx_with_taxonomy(&kv);
        kv.set_add(
            &keys::samples_represented(ctx.ctx()),
            &["UNTAGGED_s1", "tagA_s1"],
        )
        .unwrap();

        let unambiguous = ctx.samples_in_context(true).unwrap();
        assert_eq!(unambiguous.len(), 2);

        let ambiguated = ctx.samples_in_context(false).unwrap();
        assert_eq!(ambiguated, BTreeSet::from(["s1".to_string()]));
    }

    #[test]
    fn taxon_ancestors_normalizes_missing_trailing_ranks() {
        let kv = KvAdapter::open_in_memory();
        let ctx = ctx_with_taxonomy(&kv);
        let parents_key = keys::taxonomy_parents(ctx.ctx());
        kv.hash_set_field(&parents_key, "p__Bacteroidetes", "k__Bacteria")
            .unwrap();
        kv.hash_set_field(&parents_key, "c__Bacteroidia", "p__Bacteroidetes")
            .unwrap();
        kv.hash_set_field(&parents_key, "o__Bacteroidales", "c__Bacteroidia")
            .unwrap();
        kv.hash_set_field(&parents_key, "f__Bacteroidaceae", "o__Bacteroidales")
            .unwrap();
        kv.hash_set_field(&parents_key, "g__Bacteroides", "f__Bacteroidaceae")
            .unwrap();

        let ranks = ['k', 'p', 'c', 'o', 'f', 'g', 's'];
        // taxon_ancestors reports strict ancestors, not the queried node
        // itself, matching `original_source/redbiom/fetch.py::taxon_ancestors`.
        let lineages = ctx
            .taxon_ancestors(&["g__Bacteroides"], Some(&ranks))
            .unwrap();
        assert_eq!(
            lineages[0],
            vec![
                "k__Bacteria",
                "p__Bacteroidetes",
                "c__Bacteroidia",
                "o__Bacteroidales",
                "f__Bacteroidaceae",
                "g__",
                "s__",
            ]
        );
    }
}
