//! Engine (`spec.md` §6, `SPEC_FULL.md` §4.11): the operator-facing surface,
//! a thin facade over the Context/Metadata/Loader/Fetcher/Query components
//! sharing one [`KvAdapter`]. Spec.md's command groups become methods here
//! since no CLI/HTTP binary is in scope.

use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::ambiguity::Resolution;
use crate::config::EngineConfig;
use crate::context::ContextStore;
use crate::error::EngineError;
use crate::fetch::{self, AmbiguityPolicy, SparseTable};
use crate::kv::KvAdapter;
use crate::load::{Loader, RawTable};
use crate::metadata::MetadataStore;
use crate::query::{self, SearchTarget};

pub struct Engine {
    kv: KvAdapter,
    config: EngineConfig,
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let config = config.with_env_overrides();
        info!("opening biomdex engine at {}", config.db_path.display());
        let kv = KvAdapter::open(&config.db_path)?;
        Ok(Engine { kv, config })
    }

    pub fn create_context(&self, ctx: &str, description: &str) -> Result<(), EngineError> {
        ContextStore::new(&self.kv, ctx).create(description)?;
        Ok(())
    }

    /// Loads one sample's metadata row, building both the category values and
    /// the stem inverted indices in the same call.
    pub fn load_sample_metadata(
        &self,
        sample_id: &str,
        row: &[(String, String)],
    ) -> Result<(), EngineError> {
        let metadata = MetadataStore::new(&self.kv);
        metadata.load_sample(sample_id, row)?;
        metadata.index_stems(sample_id, row)?;
        Ok(())
    }

    pub fn load_sample_data(
        &self,
        ctx: &str,
        tag: Option<&str>,
        table: &RawTable,
        taxonomy: Option<&BTreeMap<String, Vec<String>>>,
    ) -> Result<usize, EngineError> {
        let loader = Loader::with_chunk_size(&self.kv, self.config.loader_chunk_size);
        Ok(loader.load_sample_data(ctx, tag, table, taxonomy)?)
    }

    /// Fetches a sparse table by sample identifiers (bare or tag-qualified),
    /// resolving ambiguity against the context's represented set. Falls back
    /// to the configured default ambiguity policy when `ambiguity_policy` is
    /// not given.
    pub fn fetch_samples<S: AsRef<str>>(
        &self,
        ctx: &str,
        ids: &[S],
        taxonomy: bool,
        ambiguity_policy: Option<AmbiguityPolicy>,
    ) -> Result<(SparseTable, Resolution), EngineError> {
        let policy = ambiguity_policy
            .or_else(|| self.config.default_ambiguity_policy.to_policy());
        Ok(fetch::fetch(&self.kv, ctx, ids, taxonomy, policy)?)
    }

    /// Fetches a sparse table by feature membership (`exact`: require every
    /// requested feature, vs. at least one).
    pub fn fetch_features<S: AsRef<str>>(
        &self,
        ctx: &str,
        feature_ids: &[S],
        exact: bool,
        taxonomy: bool,
    ) -> Result<SparseTable, EngineError> {
        Ok(fetch::fetch_by_features(
            &self.kv,
            ctx,
            feature_ids,
            exact,
            taxonomy,
        )?)
    }

    /// Axis search: which samples (as `redbiom_id`s) carry the given
    /// features. `exact`: every feature must be present (intersection);
    /// otherwise at least one (union). Grounded on
    /// `original_source/redbiom/commands/search.py::search_features` and
    /// `util.py::samples_from_observations`.
    pub fn search_features<S: AsRef<str>>(
        &self,
        ctx: &str,
        feature_ids: &[S],
        exact: bool,
    ) -> Result<std::collections::BTreeSet<String>, EngineError> {
        let context = ContextStore::new(&self.kv, ctx);
        let mut sets = feature_ids
            .iter()
            .map(|f| Ok::<_, EngineError>(context.fetch_by_feature(f.as_ref())?.into_keys().collect()));
        combine_sets(&mut sets, exact)
    }

    /// Axis search: which features are present in the given samples (after
    /// ambiguity resolution). `exact`: every sample must carry the feature
    /// (intersection); otherwise at least one (union). Grounded on
    /// `original_source/redbiom/commands/search.py::search_samples`.
    pub fn search_samples<S: AsRef<str>>(
        &self,
        ctx: &str,
        sample_ids: &[S],
        exact: bool,
    ) -> Result<std::collections::BTreeSet<String>, EngineError> {
        let context = ContextStore::new(&self.kv, ctx);
        let represented = context.samples_in_context(true)?;
        let resolution = crate::ambiguity::resolve(&represented, sample_ids);
        let mut sets = resolution
            .stable
            .values()
            .map(|redbiom_id| Ok::<_, EngineError>(context.fetch_by_sample(redbiom_id)?.into_keys().collect()));
        combine_sets(&mut sets, exact)
    }

    pub fn search_metadata(
        &self,
        query_str: &str,
    ) -> Result<std::collections::BTreeSet<String>, EngineError> {
        let metadata = MetadataStore::new(&self.kv);
        Ok(query::metadata_full(&metadata, query_str, SearchTarget::Samples)?)
    }

    pub fn summarize_contexts(&self) -> Result<BTreeMap<String, String>, EngineError> {
        Ok(self
            .kv
            .hash_get_all(&crate::keys::contexts_hash())?
            .into_iter()
            .collect())
    }

    pub fn summarize_metadata(&self) -> Result<std::collections::BTreeSet<String>, EngineError> {
        let metadata = MetadataStore::new(&self.kv);
        Ok(metadata.categories_represented()?)
    }

    pub fn summarize_taxonomy(&self, ctx: &str) -> Result<bool, EngineError> {
        Ok(ContextStore::new(&self.kv, ctx).has_taxonomy()?)
    }

    /// Selects the samples satisfying a predicate/category query against the
    /// metadata store (no context; metadata is global, per spec.md §4.4).
    pub fn select_samples_from_metadata(
        &self,
        query_str: &str,
    ) -> Result<std::collections::BTreeSet<String>, EngineError> {
        let metadata = MetadataStore::new(&self.kv);
        Ok(query::metadata_full(&metadata, query_str, SearchTarget::Samples)?)
    }
}

/// Folds an iterator of member sets into their union (`exact = false`) or
/// intersection (`exact = true`), matching
/// `original_source/redbiom/util.py::samples_from_observations`'s
/// `SUNION`/`SINTER` choice.
fn combine_sets(
    sets: &mut dyn Iterator<Item = Result<BTreeSet<String>, EngineError>>,
    exact: bool,
) -> Result<BTreeSet<String>, EngineError> {
    let mut acc: Option<BTreeSet<String>> = None;
    for set in sets {
        let set = set?;
        acc = Some(match acc {
            None => set,
            Some(existing) => {
                if exact {
                    existing.intersection(&set).cloned().collect()
                } else {
                    existing.union(&set).cloned().collect()
                }
            }
        });
    }
    Ok(acc.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_engine() -> (Engine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.redb");
        let config = EngineConfig {
            db_path,
            ..EngineConfig::default()
        };
        (Engine::open(config).unwrap(), dir)
    }

    #[test]
    fn end_to_end_load_and_fetch() {
        let (engine, _dir) = open_engine();
        engine.create_context("deblur@150nt", "test context").unwrap();
        engine
            .load_sample_metadata("s1", &[("body_site".to_string(), "gut".to_string())])
            .unwrap();

        let table = RawTable {
            entries: vec![("s1".to_string(), "f1".to_string(), 4.0)],
        };
        let loaded = engine
            .load_sample_data("deblur@150nt", None, &table, None)
            .unwrap();
        assert_eq!(loaded, 1);

        let (sparse, resolution) = engine
            .fetch_samples("deblur@150nt", &["s1"], false, None)
            .unwrap();
        assert_eq!(sparse.sample_ids, vec!["s1.UNTAGGED".to_string()]);
        assert!(resolution.unobserved.is_empty());

        let contexts = engine.summarize_contexts().unwrap();
        assert_eq!(contexts.get("deblur@150nt").unwrap(), "test context");
    }

    #[test]
    fn search_metadata_finds_stemmed_value() {
        let (engine, _dir) = open_engine();
        engine
            .load_sample_metadata(
                "UNTAGGED_s1",
                &[("body_site".to_string(), "fecal matter".to_string())],
            )
            .unwrap();
        let hits = engine.search_metadata("fecal").unwrap();
        assert!(hits.contains("UNTAGGED_s1"));
    }

    #[test]
    fn search_features_and_samples_are_symmetric_axis_queries() {
        let (engine, _dir) = open_engine();
        engine.create_context("ctx", "test").unwrap();
        engine
            .load_sample_metadata("s1", &[("body_site".to_string(), "gut".to_string())])
            .unwrap();
        let table = RawTable {
            entries: vec![
                ("s1".to_string(), "f1".to_string(), 4.0),
                ("s1".to_string(), "f2".to_string(), 1.0),
            ],
        };
        engine.load_sample_data("ctx", None, &table, None).unwrap();

        let samples = engine.search_features("ctx", &["f1", "f2"], true).unwrap();
        assert_eq!(samples, BTreeSet::from(["UNTAGGED_s1".to_string()]));

        let features = engine.search_samples("ctx", &["s1"], false).unwrap();
        assert_eq!(
            features,
            BTreeSet::from(["f1".to_string(), "f2".to_string()])
        );
    }
}
