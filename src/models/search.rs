use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::document::Document;
use crate::people::resolver::Profile;

/// Listing sort order. Wire values match the UI query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    #[serde(rename = "dateAsc")]
    DateAsc,
    #[serde(rename = "dateDesc")]
    DateDesc,
}

impl Default for SortBy {
    fn default() -> Self {
        SortBy::DateDesc
    }
}

/// Parameters for one listing query.
///
/// `page` is 0-based here; the HTTP boundary converts from the 1-based
/// query parameter. Facet selections are OR'd within a category and AND'd
/// across categories.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub page: usize,
    pub sort_by: SortBy,
    pub facets: BTreeMap<String, Vec<String>>,
    /// Restrict results to documents owned by (or, for drafts, shared with)
    /// this email.
    pub owner_scope: Option<String>,
    /// Drop documents already approved by this email. Used by the review
    /// queue so approved items leave the approver's dashboard.
    pub exclude_approved_by: Option<String>,
    /// Restrict to documents authored through this system. Externally
    /// authored documents have no review workflow to surface.
    pub app_created_only: bool,
}

/// One selectable facet value with its hit count and selection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRecord {
    pub value: String,
    pub count: usize,
    pub selected: bool,
}

/// All values of one facet category.
///
/// `empty` is an explicit signal (not a nil-vs-empty-map ambiguity): when
/// true the index returned no values for this category and the caller must
/// disable the corresponding control.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetGroup {
    pub records: Vec<FacetRecord>,
    pub empty: bool,
}

/// One search result, annotated with its source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hit {
    #[serde(flatten)]
    pub document: Document,
    pub is_draft: bool,
    /// Display metadata for the primary owner, when resolution succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_profile: Option<Profile>,
}

impl Hit {
    pub fn new(document: Document) -> Self {
        let is_draft = document.is_draft();
        Self {
            document,
            is_draft,
            owner_profile: None,
        }
    }
}

/// An immutable page of results, constructed fresh per query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub hits: Vec<T>,
    pub page: usize,
    pub nb_pages: usize,
    /// True when a secondary source failed and the result is best-effort.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

/// A raw page from one source (draft store or published index), before
/// merging. Both sources normalize to this shape.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub hits: Vec<Document>,
    pub page: usize,
    pub nb_pages: usize,
    pub nb_hits: usize,
    /// Per-category value counts, as returned by the source.
    pub facet_counts: HashMap<String, HashMap<String, usize>>,
}
