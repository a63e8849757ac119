//! Metadata Store (`spec.md` §4.4). Global, context-independent namespace
//! holding per-sample informative columns, per-column value hashes, and the
//! stem-keyed inverted indices `query::set_expr` searches.

mod error;
pub use error::MetadataError;

use std::collections::{BTreeMap, BTreeSet};

use crate::kv::KvAdapter;
use crate::keys;
use crate::text::{self, stopwords};

pub struct MetadataStore<'a> {
    kv: &'a KvAdapter,
}

fn is_informative(value: &str) -> bool {
    !stopwords::NULL_VALUES.contains(&value)
}

impl<'a> MetadataStore<'a> {
    pub fn new(kv: &'a KvAdapter) -> Self {
        MetadataStore { kv }
    }

    /// `spec.md` §4.4: every sample_id (bare or tag-stripped) is a member of
    /// the represented-samples set.
    pub fn has_metadata<S: AsRef<str>>(&self, samples: &[S]) -> Result<bool, MetadataError> {
        let represented = self.kv.set_members(&keys::metadata_samples_represented())?;
        Ok(samples
            .iter()
            .all(|s| represented.contains(s.as_ref())))
    }

    pub fn categories_for<S: AsRef<str>>(
        &self,
        samples: &[S],
    ) -> Result<BTreeMap<String, Vec<String>>, MetadataError> {
        let mut out = BTreeMap::new();
        for s in samples {
            let s = s.as_ref();
            let key = keys::metadata_categories(s);
            let cols: Vec<String> = self.kv.get_json(&key)?.unwrap_or_default();
            out.insert(s.to_string(), cols);
        }
        Ok(out)
    }

    pub fn value<S: AsRef<str>>(
        &self,
        category: &str,
        samples: &[S],
    ) -> Result<Vec<(String, Option<String>)>, MetadataError> {
        let hash = self.kv.hash_get_all(&keys::metadata_category(category))?;
        Ok(samples
            .iter()
            .map(|s| {
                let s = s.as_ref().to_string();
                let v = hash.get(&s).cloned();
                (s, v)
            })
            .collect())
    }

    pub fn samples_by_category(
        &self,
        category: &str,
    ) -> Result<BTreeMap<String, String>, MetadataError> {
        let hash = self.kv.hash_get_all(&keys::metadata_category(category))?;
        Ok(hash.into_iter().collect())
    }

    pub fn categories_represented(&self) -> Result<BTreeSet<String>, MetadataError> {
        Ok(self.kv.set_members(&keys::metadata_categories_represented())?)
    }

    /// Samples whose metadata values stemmed to `stem` (`spec.md` §4.4
    /// `text-search`).
    pub fn text_search(&self, stem: &str) -> Result<BTreeSet<String>, MetadataError> {
        Ok(self.kv.set_members(&keys::metadata_text_search(stem))?)
    }

    /// Category names whose column label stemmed to `stem`
    /// (`category-search`).
    pub fn category_search(&self, stem: &str) -> Result<BTreeSet<String>, MetadataError> {
        Ok(self.kv.set_members(&keys::metadata_category_search(stem))?)
    }

    /// Loads one sample's row of (column, raw value) pairs: filters
    /// non-informative values, records the informative column list, appends
    /// each value into its column's hash, and grows the represented sets.
    /// Grounded on
    /// `original_source/redbiom/admin.py::load_sample_metadata`.
    pub fn load_sample(
        &self,
        sample_id: &str,
        row: &[(String, String)],
    ) -> Result<(), MetadataError> {
        for (_, val) in row.iter().filter(|(_, v)| is_informative(v)) {
            text::reject_path_delimiter(val)?;
        }

        let mut informative_columns = Vec::new();
        for (col, val) in row {
            if !is_informative(val) {
                continue;
            }
            self.kv
                .hash_set_field(&keys::metadata_category(col), sample_id, val)?;
            informative_columns.push(col.clone());
        }
        self.kv
            .put_json(&keys::metadata_categories(sample_id), &informative_columns)?;
        self.kv
            .set_add(&keys::metadata_samples_represented(), &[sample_id])?;
        self.kv.set_add(
            &keys::metadata_categories_represented(),
            &informative_columns,
        )?;
        Ok(())
    }

    /// Builds the `text-search` (value stems) and `category-search` (column
    /// name stems) inverted indices for one sample's row. Grounded on
    /// `original_source/redbiom/admin.py::load_sample_metadata_full_search`.
    pub fn index_stems(&self, sample_id: &str, row: &[(String, String)]) -> Result<(), MetadataError> {
        for (col, val) in row {
            if !is_informative(val) {
                continue;
            }
            for stem in text::stems(val) {
                self.kv
                    .set_add(&keys::metadata_text_search(&stem), &[sample_id])?;
            }
            let category_label = col.replace('_', " ");
            for stem in text::stems(&category_label) {
                self.kv
                    .set_add(&keys::metadata_category_search(&stem), &[col.as_str()])?;
            }
        }
        Ok(())
    }
}
