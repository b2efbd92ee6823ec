use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::db::draft_store::DraftStore;
use crate::error::{AppError, Source};
use crate::listing::merger::{self, HitGroup, MergeMode};
use crate::listing::supersession::{Outcome, QueryController};
use crate::models::document::DocStatus;
use crate::models::search::{FacetGroup, Hit, PaginatedResult, SearchParams, SortBy};
use crate::people::resolver::Resolver;
use crate::search::client::PublishedIndex;
use crate::search::facets::{collate_facets, FACET_NAMES, HITS_PER_PAGE};

/// The my-docs view merges two sources client-side and re-sorts, so it
/// pulls a larger page from each than the regular listing screens.
const MY_DOCS_HITS_PER_PAGE: usize = 100;

/// A listing screen payload: one page of hits plus annotated facet groups.
#[derive(Debug, Serialize)]
pub struct Listing {
    pub facets: BTreeMap<String, FacetGroup>,
    pub results: PaginatedResult<Hit>,
}

/// The my-docs payload: recency-grouped hits over the merged sources.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyDocuments {
    pub groups: Vec<HitGroup>,
    pub page: usize,
    pub nb_pages: usize,
}

/// The dashboard payload: the caller's review queue plus a best-effort
/// slice of their own recent documents.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub awaiting_review: PaginatedResult<Hit>,
    /// Number of documents waiting on the caller's review action.
    pub badge_count: usize,
    pub my_recent: PaginatedResult<Hit>,
}

/// Fans one listing request out to the draft store and published index,
/// merges the results, and annotates them with people metadata.
///
/// Constructed once per server instance and shared by reference; the only
/// mutable state is the per-caller supersession controllers and the people
/// cache inside the resolver.
pub struct ListingService {
    index: Arc<dyn PublishedIndex>,
    drafts: Arc<dyn DraftStore>,
    people: Arc<Resolver>,
    controllers: Mutex<HashMap<String, Arc<QueryController>>>,
    call_timeout: Duration,
}

impl ListingService {
    pub fn new(
        index: Arc<dyn PublishedIndex>,
        drafts: Arc<dyn DraftStore>,
        people: Arc<Resolver>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            index,
            drafts,
            people,
            controllers: Mutex::new(HashMap::new()),
            call_timeout,
        }
    }

    /// The supersession controller for one caller. Listing queries from the
    /// same caller supersede each other; different callers never interact.
    pub fn controller(&self, caller: &str) -> Arc<QueryController> {
        let mut controllers = self.controllers.lock().expect("controller map poisoned");
        controllers
            .entry(caller.to_string())
            .or_insert_with(|| Arc::new(QueryController::new()))
            .clone()
    }

    async fn with_deadline<T>(
        &self,
        source: Source,
        work: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.call_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(AppError::unavailable(source, "request deadline exceeded")),
        }
    }

    /// Facet groups for a listing, computed per category so a category's
    /// own selection never narrows its own counts.
    pub async fn facets(
        &self,
        params: &SearchParams,
    ) -> Result<BTreeMap<String, FacetGroup>, AppError> {
        let counts = futures::future::try_join_all(FACET_NAMES.iter().map(|category| {
            self.with_deadline(
                Source::PublishedIndex,
                self.index.facet_counts(params, category),
            )
        }))
        .await?;

        let mut distribution: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for (category, count) in FACET_NAMES.iter().zip(counts) {
            distribution.insert(category.to_string(), count);
        }

        Ok(collate_facets(&distribution, params))
    }

    /// Facet groups over the caller's draft set. Draft facet counts come
    /// from the draft store itself, not the published index.
    pub async fn draft_facets(
        &self,
        caller: &str,
        params: &SearchParams,
    ) -> Result<BTreeMap<String, FacetGroup>, AppError> {
        let mut params = params.clone();
        params.owner_scope = Some(caller.to_string());

        let page = self
            .with_deadline(Source::DraftStore, self.drafts.list(&params, HITS_PER_PAGE))
            .await?;

        Ok(collate_facets(&page.facet_counts, &params))
    }

    /// The published-documents listing screen. Facets and results are
    /// fetched concurrently; owners are annotated before returning.
    pub async fn published_listing(&self, params: &SearchParams) -> Result<Listing, AppError> {
        let (facets, page) = tokio::join!(
            self.facets(params),
            self.with_deadline(
                Source::PublishedIndex,
                self.index.search(params, HITS_PER_PAGE)
            ),
        );
        let (facets, page) = (facets?, page?);

        let mut results = PaginatedResult {
            hits: page.hits.into_iter().map(Hit::new).collect(),
            page: page.page,
            nb_pages: page.nb_pages,
            partial: false,
        };
        self.people.annotate(&mut results.hits).await;

        Ok(Listing { facets, results })
    }

    /// The drafts screen: the caller's unpublished documents only.
    /// Completeness is expected here, so a draft-store failure is fatal.
    pub async fn draft_listing(
        &self,
        caller: &str,
        params: &SearchParams,
    ) -> Result<Listing, AppError> {
        let mut params = params.clone();
        params.owner_scope = Some(caller.to_string());

        let page = self
            .with_deadline(Source::DraftStore, self.drafts.list(&params, HITS_PER_PAGE))
            .await?;

        let facets = collate_facets(&page.facet_counts, &params);
        let mut results = PaginatedResult {
            hits: page.hits.into_iter().map(Hit::new).collect(),
            page: page.page,
            nb_pages: page.nb_pages,
            partial: false,
        };
        self.people.annotate(&mut results.hits).await;

        Ok(Listing { facets, results })
    }

    /// The my-docs screen: drafts and published documents merged into one
    /// listing, re-sorted by modification time and grouped by recency.
    pub async fn my_documents(
        &self,
        caller: &str,
        params: &SearchParams,
    ) -> Result<MyDocuments, AppError> {
        let mut scoped = params.clone();
        scoped.owner_scope = Some(caller.to_string());

        let (draft_page, published_page) = tokio::join!(
            self.with_deadline(
                Source::DraftStore,
                self.drafts.list(&scoped, MY_DOCS_HITS_PER_PAGE)
            ),
            self.with_deadline(
                Source::PublishedIndex,
                self.index.search(&scoped, MY_DOCS_HITS_PER_PAGE)
            ),
        );

        let mut merged =
            merger::combine(draft_page, published_page, params.sort_by, MergeMode::Strict)?;
        merger::re_sort(&mut merged.hits, "modifiedTime", params.sort_by);
        self.people.annotate(&mut merged.hits).await;

        let (page, nb_pages) = (merged.page, merged.nb_pages);
        let groups =
            merger::group_by_recency(merged.hits, chrono::Utc::now().timestamp(), params.sort_by);

        Ok(MyDocuments {
            groups,
            page,
            nb_pages,
        })
    }

    /// The dashboard: documents awaiting the caller's review (with badge
    /// count) plus a best-effort recent-documents widget that tolerates a
    /// draft-store outage.
    pub async fn dashboard(&self, caller: &str) -> Result<Dashboard, AppError> {
        let queue_params = review_queue_params(caller);
        let mut recent_params = SearchParams::default();
        recent_params.owner_scope = Some(caller.to_string());

        let (queue_page, draft_page, published_page) = tokio::join!(
            self.with_deadline(
                Source::PublishedIndex,
                self.index.search(&queue_params, HITS_PER_PAGE)
            ),
            self.with_deadline(
                Source::DraftStore,
                self.drafts.list(&recent_params, HITS_PER_PAGE)
            ),
            self.with_deadline(
                Source::PublishedIndex,
                self.index.search(&recent_params, HITS_PER_PAGE)
            ),
        );

        let queue_page = queue_page?;
        let badge_count = queue_page.nb_hits;
        let mut awaiting_review = PaginatedResult {
            hits: queue_page.hits.into_iter().map(Hit::new).collect(),
            page: queue_page.page,
            nb_pages: queue_page.nb_pages,
            partial: false,
        };

        let mut my_recent = merger::combine(
            draft_page,
            published_page,
            SortBy::DateDesc,
            MergeMode::BestEffort,
        )?;
        merger::re_sort(&mut my_recent.hits, "modifiedTime", SortBy::DateDesc);

        self.people.annotate(&mut awaiting_review.hits).await;
        self.people.annotate(&mut my_recent.hits).await;

        Ok(Dashboard {
            awaiting_review,
            badge_count,
            my_recent,
        })
    }

    /// Run a published listing under the caller's supersession controller:
    /// if the caller issues a newer listing query while this one is in
    /// flight, this result is discarded unapplied.
    pub async fn published_listing_latest(
        &self,
        caller: &str,
        params: &SearchParams,
    ) -> Result<Outcome<Listing>, AppError> {
        let controller = self.controller(caller);
        let generation = controller.begin();
        controller
            .run(generation, self.published_listing(params))
            .await
    }
}

/// The review-queue query: documents the caller must still review. An
/// approver sees in-review, app-created documents they have not yet
/// approved.
pub fn review_queue_params(caller: &str) -> SearchParams {
    let mut params = SearchParams::default();
    params.facets.insert(
        "approvers".to_string(),
        vec![caller.to_string()],
    );
    params.facets.insert(
        "status".to_string(),
        vec![DocStatus::InReview.wire_name().to_string()],
    );
    params.exclude_approved_by = Some(caller.to_string());
    params.app_created_only = true;
    params
}
