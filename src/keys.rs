//! Builders for the persisted key layout in `spec.md` §6. Centralized here so no
//! other module improvises its own key strings.

use strum_macros::{Display, EnumString};

/// Sentinel child name in `taxonomy-children` sets signaling that the parent
/// has at least one tip; the actual tip feature indices live in `terminal-of`.
pub const HAS_TERMINAL_SENTINEL: &str = "has-terminal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Axis {
    #[strum(serialize = "feature")]
    Feature,
    #[strum(serialize = "sample")]
    Sample,
}

pub fn contexts_hash() -> String {
    "state.contexts".to_string()
}

pub fn timestamps_list() -> String {
    "state.timestamps".to_string()
}

pub fn context_state(ctx: &str) -> String {
    format!("{ctx}.state")
}

pub fn axis_index(ctx: &str, axis: Axis) -> String {
    format!("{ctx}.{axis}-index")
}

pub fn axis_index_inverted(ctx: &str, axis: Axis) -> String {
    format!("{ctx}.{axis}-index-inverted")
}

pub fn axis_index_counter(ctx: &str, axis: Axis) -> String {
    format!("{ctx}.{axis}-index.counter")
}

pub fn sample_vector(ctx: &str, redbiom_id: &str) -> String {
    format!("{ctx}.sample:{redbiom_id}")
}

pub fn feature_vector(ctx: &str, feature_id: &str) -> String {
    format!("{ctx}.feature:{feature_id}")
}

pub fn samples_represented(ctx: &str) -> String {
    format!("{ctx}.samples-represented")
}

pub fn features_represented(ctx: &str) -> String {
    format!("{ctx}.features-represented")
}

pub fn taxonomy_children(ctx: &str, node: &str) -> String {
    format!("{ctx}.taxonomy-children:{node}")
}

pub fn taxonomy_parents(ctx: &str) -> String {
    format!("{ctx}.taxonomy-parents")
}

pub fn terminal_of(ctx: &str, node: &str) -> String {
    format!("{ctx}.terminal-of:{node}")
}

pub fn metadata_categories(sample_id: &str) -> String {
    format!("metadata.categories:{sample_id}")
}

pub fn metadata_category(column: &str) -> String {
    format!("metadata.category:{column}")
}

pub fn metadata_samples_represented() -> String {
    "metadata.samples-represented".to_string()
}

pub fn metadata_categories_represented() -> String {
    "metadata.categories-represented".to_string()
}

pub fn metadata_text_search(stem: &str) -> String {
    format!("metadata.text-search:{stem}")
}

pub fn metadata_category_search(stem: &str) -> String {
    format!("metadata.category-search:{stem}")
}
