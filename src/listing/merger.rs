use std::cmp::Ordering;

use serde::Serialize;

use crate::error::{AppError, Source};
use crate::models::document::Document;
use crate::models::search::{Hit, PaginatedResult, SortBy, SourcePage};

/// How a merged listing reacts to a draft-store failure.
///
/// The published index is the primary source and its failure is always
/// fatal. The draft store is secondary: best-effort views (the dashboard)
/// degrade to published-only results, views where completeness is expected
/// (drafts, my-docs) propagate the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Strict,
    BestEffort,
}

/// Merge one page from each source into a single listing page.
///
/// Each source pre-sorts its own page by `created_time`, so the merge
/// concatenates rather than re-sorting: drafts first under `DateDesc`
/// (drafts are the freshest work), published first under `DateAsc`.
/// `nb_pages` is the max of the two so the caller can page through the
/// longer source; the shorter one simply contributes nothing on later pages.
pub fn combine(
    draft: Result<SourcePage, AppError>,
    published: Result<SourcePage, AppError>,
    sort_by: SortBy,
    mode: MergeMode,
) -> Result<PaginatedResult<Hit>, AppError> {
    let published = published?;

    let (draft, partial) = match draft {
        Ok(page) => (page, false),
        Err(err) if mode == MergeMode::BestEffort && err.is_unavailable(Source::DraftStore) => {
            tracing::warn!(error = %err, "draft store unavailable; serving published-only listing");
            (SourcePage::default(), true)
        }
        Err(err) => return Err(err),
    };

    let nb_pages = draft.nb_pages.max(published.nb_pages);
    let page = published.page.max(draft.page);

    let (first, second) = match sort_by {
        SortBy::DateDesc => (draft.hits, published.hits),
        SortBy::DateAsc => (published.hits, draft.hits),
    };

    let hits: Vec<Hit> = first.into_iter().chain(second).map(Hit::new).collect();

    Ok(PaginatedResult {
        hits,
        page,
        nb_pages,
        partial,
    })
}

/// A sortable attribute value drawn from a document. The comparison order
/// is number, then case-insensitive string, then first element of a list;
/// missing values always sort to the old/empty end.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Number(i64),
    Text(String),
    List(Vec<String>),
    Missing,
}

impl SortKey {
    /// Extract the sort key for a named attribute.
    pub fn of(doc: &Document, attribute: &str) -> SortKey {
        match attribute {
            "modifiedTime" => doc
                .modified_time
                .map(SortKey::Number)
                .unwrap_or(SortKey::Missing),
            "createdTime" => SortKey::Number(doc.created_time),
            "title" => SortKey::Text(doc.title.clone()),
            "docType" => SortKey::Text(doc.doc_type.clone()),
            "product" => SortKey::Text(doc.product.clone()),
            "status" => SortKey::Text(doc.status.wire_name().to_string()),
            "owners" => SortKey::List(doc.owners.clone()),
            "approvers" => SortKey::List(doc.approvers.clone()),
            _ => SortKey::Missing,
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Compare two sort keys. Numbers compare numerically, strings compare
/// case-insensitively, lists compare by their first element. A missing
/// value compares below everything present.
pub fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
        (SortKey::Missing, _) => Ordering::Less,
        (_, SortKey::Missing) => Ordering::Greater,
        (SortKey::Number(a), SortKey::Number(b)) => a.cmp(b),
        (SortKey::Text(a), SortKey::Text(b)) => compare_text(a, b),
        (SortKey::List(a), SortKey::List(b)) => match (a.first(), b.first()) {
            (Some(a), Some(b)) => compare_text(a, b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        },
        // Mixed-type attributes only happen with corrupt index data; fall
        // back to a stable ordering by variant.
        (SortKey::Number(_), _) => Ordering::Less,
        (_, SortKey::Number(_)) => Ordering::Greater,
        (SortKey::Text(_), _) => Ordering::Less,
        (_, SortKey::Text(_)) => Ordering::Greater,
    }
}

/// Client-requested re-sort of a combined result set by one attribute.
///
/// Documents without the attribute (drafts with no `modified_time` yet)
/// land at the old end in both directions: first under `DateAsc`, last
/// under `DateDesc`, never among the most recent. Ties break by id so
/// the ordering is deterministic.
pub fn re_sort(hits: &mut [Hit], attribute: &str, sort_by: SortBy) {
    hits.sort_by(|a, b| {
        let ka = SortKey::of(&a.document, attribute);
        let kb = SortKey::of(&b.document, attribute);
        let ordering = match sort_by {
            SortBy::DateAsc => compare_keys(&ka, &kb),
            SortBy::DateDesc => match (&ka, &kb) {
                // Missing stays at the tail even when descending.
                (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
                (SortKey::Missing, _) => Ordering::Greater,
                (_, SortKey::Missing) => Ordering::Less,
                _ => compare_keys(&kb, &ka),
            },
        };
        ordering.then_with(|| a.document.id.cmp(&b.document.id))
    });
}

const DAY_SECONDS: i64 = 24 * 60 * 60;

/// A labelled slice of a listing, grouped by modification recency.
#[derive(Debug, Serialize)]
pub struct HitGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub hits: Vec<Hit>,
}

/// Group hits into recency buckets for the my-docs view.
///
/// Descending order yields the familiar "Recently active / more than N
/// days old" groups; ascending order returns the whole list as one
/// unlabelled group. Hits without a `modified_time` go to the oldest
/// bucket, and that bucket's label says so.
pub fn group_by_recency(hits: Vec<Hit>, now_unix: i64, sort_by: SortBy) -> Vec<HitGroup> {
    if sort_by == SortBy::DateAsc {
        return vec![HitGroup { label: None, hits }];
    }

    let mut recent = Vec::new();
    let mut month = Vec::new();
    let mut quarter = Vec::new();
    let mut older = Vec::new();
    let mut has_unknown = false;

    for hit in hits {
        match hit.document.modified_time {
            Some(t) if t > now_unix - 30 * DAY_SECONDS => recent.push(hit),
            Some(t) if t > now_unix - 90 * DAY_SECONDS => month.push(hit),
            Some(t) if t > now_unix - 365 * DAY_SECONDS => quarter.push(hit),
            Some(_) => older.push(hit),
            None => {
                has_unknown = true;
                older.push(hit);
            }
        }
    }

    let mut older_label = "More than 1 year old".to_string();
    if has_unknown {
        older_label.push_str(" / Unknown");
    }

    vec![
        HitGroup {
            label: Some("Recently active".to_string()),
            hits: recent,
        },
        HitGroup {
            label: Some("More than 30 days old".to_string()),
            hits: month,
        },
        HitGroup {
            label: Some("More than 90 days old".to_string()),
            hits: quarter,
        },
        HitGroup {
            label: Some(older_label),
            hits: older,
        },
    ]
}
