//! Query engine (`spec.md` §4.7/§4.8): combines the Set-Expression and
//! Predicate evaluators into the full search surface, grounded on
//! `original_source/redbiom/search.py::metadata_full`.

mod error;
mod plan;
mod set_expr;
mod where_expr;

pub use error::QueryError;
pub use plan::{query_plan, Clause};

use std::collections::BTreeSet;

use crate::metadata::MetadataStore;
use crate::text;

/// Whether a search targets sample values (`text-search`) or category/column
/// names (`category-search`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    Samples,
    Categories,
}

/// Runs a full query string (set expression, optionally followed by a `where`
/// clause) against the metadata store, returning the surviving ids.
///
/// A `where` clause combined with a [`SearchTarget::Categories`] search is
/// rejected: `original_source/redbiom/search.py::metadata_full` raises for
/// exactly this combination, since a where-clause narrows *samples*, not
/// category names.
pub fn metadata_full(
    store: &MetadataStore<'_>,
    query: &str,
    target: SearchTarget,
) -> Result<BTreeSet<String>, QueryError> {
    let plan = query_plan(query)?;
    let mut result: Option<BTreeSet<String>> = None;

    for clause in plan {
        match clause {
            Clause::Set(expr) => {
                let set = set_expr::eval(&expr, |name| lookup_stem(store, name, target))?;
                result = Some(match result {
                    Some(existing) => existing.union(&set).cloned().collect(),
                    None => set,
                });
            }
            Clause::Where(expr) => {
                if target == SearchTarget::Categories {
                    return Err(QueryError::WhereNotAllowedWithCategories);
                }
                let hits: BTreeSet<String> =
                    where_expr::eval(&expr, store)?.into_keys().collect();
                result = Some(match result {
                    Some(existing) => existing.intersection(&hits).cloned().collect(),
                    None => hits,
                });
            }
        }
    }

    Ok(result.unwrap_or_default())
}

fn lookup_stem(
    store: &MetadataStore<'_>,
    name: &str,
    target: SearchTarget,
) -> Result<BTreeSet<String>, QueryError> {
    let stem = text::first_stem(name).ok_or_else(|| QueryError::NoUsableStem(name.to_string()))?;
    let set = match target {
        SearchTarget::Samples => store.text_search(&stem)?,
        SearchTarget::Categories => store.category_search(&stem)?,
    };
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvAdapter;

    #[test]
    fn set_and_where_clauses_intersect() {
        let kv = KvAdapter::open_in_memory();
        let store = MetadataStore::new(&kv);
        store
            .load_sample("s1", &[("body_site".to_string(), "gut".to_string())])
            .unwrap();
        store.index_stems("s1", &[("body_site".to_string(), "gut".to_string())])
            .unwrap();
        store
            .load_sample("s2", &[("body_site".to_string(), "oral".to_string())])
            .unwrap();
        store.index_stems("s2", &[("body_site".to_string(), "oral".to_string())])
            .unwrap();

        let hits = metadata_full(&store, "gut where body_site == 'gut'", SearchTarget::Samples)
            .unwrap();
        assert_eq!(hits, BTreeSet::from(["s1".to_string()]));
    }

    #[test]
    fn where_with_category_search_is_rejected() {
        let kv = KvAdapter::open_in_memory();
        let store = MetadataStore::new(&kv);
        let err = metadata_full(&store, "where age < 10", SearchTarget::Categories).unwrap_err();
        assert!(matches!(err, QueryError::WhereNotAllowedWithCategories));
    }
}
