use std::collections::{BTreeMap, HashMap};

use crate::models::search::{FacetGroup, FacetRecord, SearchParams};

pub const HITS_PER_PAGE: usize = 12;
pub const MAX_VALUES_PER_FACET: usize = 100;

/// The facet categories surfaced by listing screens.
pub const FACET_NAMES: [&str; 4] = ["docType", "owners", "product", "status"];

/// Statuses allowed through to facet controls. The index can contain other
/// values from legacy imports; those are dropped rather than rendered.
pub const STATUS_ALLOWLIST: [&str; 5] = ["WIP", "In-Review", "In Review", "Approved", "Obsolete"];

/// Quote a value for the index filter grammar.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Build the filter expression for a listing query.
///
/// Selected values within one category are OR'd, categories are AND'd.
/// `exclude_category` omits that category's own selection, so that facet
/// counts for a category are not narrowed by selections within it.
pub fn build_filter_expression(params: &SearchParams, exclude_category: Option<&str>) -> String {
    let mut groups: Vec<String> = Vec::new();

    for (category, values) in &params.facets {
        if Some(category.as_str()) == exclude_category || values.is_empty() {
            continue;
        }
        let ors: Vec<String> = values
            .iter()
            .map(|v| format!("{category} = {}", quote(v)))
            .collect();
        groups.push(format!("({})", ors.join(" OR ")));
    }

    if let Some(owner) = &params.owner_scope {
        groups.push(format!("owners = {}", quote(owner)));
    }

    if let Some(email) = &params.exclude_approved_by {
        groups.push(format!("NOT approvedBy = {}", quote(email)));
    }

    if params.app_created_only {
        groups.push("appCreated = true".to_string());
    }

    groups.join(" AND ")
}

/// Mark exactly the listed values as selected, everything else unselected.
/// Pure function of its inputs; applying it twice is a no-op.
pub fn mark_selected(group: &mut FacetGroup, selected_values: &[String]) {
    for record in &mut group.records {
        record.selected = selected_values.iter().any(|v| *v == record.value);
    }
}

/// Turn a raw per-category count map into annotated facet groups.
///
/// Every category in `FACET_NAMES` is present in the output; a category the
/// index returned nothing for comes back with `empty == true` so the caller
/// disables that control instead of rendering an empty dropdown.
pub fn collate_facets(
    distribution: &HashMap<String, HashMap<String, usize>>,
    params: &SearchParams,
) -> BTreeMap<String, FacetGroup> {
    let mut out = BTreeMap::new();
    let no_selection: Vec<String> = Vec::new();

    for category in FACET_NAMES {
        let mut records: Vec<FacetRecord> = distribution
            .get(category)
            .map(|counts| {
                counts
                    .iter()
                    .filter(|(value, _)| {
                        category != "status" || STATUS_ALLOWLIST.contains(&value.as_str())
                    })
                    .map(|(value, count)| FacetRecord {
                        value: value.clone(),
                        count: *count,
                        selected: false,
                    })
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| a.value.cmp(&b.value));

        let mut group = FacetGroup {
            empty: records.is_empty(),
            records,
        };
        let selected = params.facets.get(category).unwrap_or(&no_selection);
        mark_selected(&mut group, selected);
        out.insert(category.to_string(), group);
    }

    out
}
