use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{AppError, Source};
use crate::models::document::Document;
use crate::models::search::{SearchParams, SortBy, SourcePage};
use crate::search::facets::{build_filter_expression, FACET_NAMES, MAX_VALUES_PER_FACET};

/// Trait for published-index operations, enabling mock testing.
///
/// The index holds every published document (never drafts) and answers
/// keyword queries with facet counts and pre-sorted, paginated hits.
#[async_trait]
pub trait PublishedIndex: Send + Sync {
    /// Run a listing query. Hits come back already sorted by `created_time`
    /// in the requested direction; facet counts cover all categories.
    async fn search(
        &self,
        params: &SearchParams,
        hits_per_page: usize,
    ) -> Result<SourcePage, AppError>;

    /// Count the values of a single facet category. The category's own
    /// selection is excluded from the filter so it cannot self-narrow.
    async fn facet_counts(
        &self,
        params: &SearchParams,
        category: &str,
    ) -> Result<HashMap<String, usize>, AppError>;

    /// Add or update a document in the index.
    async fn index_document(&self, doc: &Document) -> Result<(), AppError>;

    /// Remove a document from the index.
    async fn delete_document(&self, id: &str) -> Result<(), AppError>;

    /// Configure filterable/sortable/searchable attributes.
    /// Should be called once on startup.
    async fn configure_index(&self) -> Result<(), AppError>;
}

/// Meilisearch implementation of the PublishedIndex.
pub struct MeilisearchIndex {
    client: meilisearch_sdk::client::Client,
    index_name: String,
}

impl MeilisearchIndex {
    /// Create a new MeilisearchIndex from environment variables.
    ///
    /// Reads `MEILISEARCH_URL`, `MEILISEARCH_API_KEY` and `DOCKET_INDEX`.
    pub fn from_env() -> Result<Self, AppError> {
        let url = std::env::var("MEILISEARCH_URL")
            .map_err(|_| AppError::Internal("MEILISEARCH_URL not set".into()))?;
        let api_key = std::env::var("MEILISEARCH_API_KEY").ok();
        let index_name =
            std::env::var("DOCKET_INDEX").unwrap_or_else(|_| "documents".to_string());

        let client = meilisearch_sdk::client::Client::new(url, api_key)
            .map_err(|e| AppError::Internal(format!("Failed to create Meilisearch client: {e}")))?;

        Ok(Self { client, index_name })
    }

    pub fn new(client: meilisearch_sdk::client::Client, index_name: String) -> Self {
        Self { client, index_name }
    }

    fn index(&self) -> meilisearch_sdk::indexes::Index {
        self.client.index(&self.index_name)
    }
}

fn sort_expression(sort_by: SortBy) -> &'static str {
    match sort_by {
        SortBy::DateAsc => "createdTime:asc",
        SortBy::DateDesc => "createdTime:desc",
    }
}

#[async_trait]
impl PublishedIndex for MeilisearchIndex {
    async fn search(
        &self,
        params: &SearchParams,
        hits_per_page: usize,
    ) -> Result<SourcePage, AppError> {
        let index = self.index();
        let filter = build_filter_expression(params, None);
        let sort = [sort_expression(params.sort_by)];

        let mut query = index.search();
        query
            .with_query(&params.query)
            .with_facets(meilisearch_sdk::search::Selectors::Some(&FACET_NAMES[..]))
            .with_hits_per_page(hits_per_page)
            .with_page(params.page + 1)
            .with_sort(&sort[..]);
        if !filter.is_empty() {
            query.with_filter(&filter);
        }

        let results: meilisearch_sdk::search::SearchResults<Document> = query
            .execute()
            .await
            .map_err(|e| AppError::unavailable(Source::PublishedIndex, e.to_string()))?;

        let hits: Vec<Document> = results.hits.into_iter().map(|hit| hit.result).collect();
        Ok(SourcePage {
            nb_hits: results.total_hits.unwrap_or(hits.len()),
            nb_pages: results.total_pages.unwrap_or(if hits.is_empty() { 0 } else { 1 }),
            page: results.page.unwrap_or(params.page + 1).saturating_sub(1),
            facet_counts: results.facet_distribution.unwrap_or_default(),
            hits,
        })
    }

    async fn facet_counts(
        &self,
        params: &SearchParams,
        category: &str,
    ) -> Result<HashMap<String, usize>, AppError> {
        let index = self.index();
        let filter = build_filter_expression(params, Some(category));
        let facets = [category];

        let mut query = index.search();
        query
            .with_query(&params.query)
            .with_facets(meilisearch_sdk::search::Selectors::Some(&facets[..]))
            .with_hits_per_page(1);
        if !filter.is_empty() {
            query.with_filter(&filter);
        }

        let results: meilisearch_sdk::search::SearchResults<Document> = query
            .execute()
            .await
            .map_err(|e| AppError::unavailable(Source::PublishedIndex, e.to_string()))?;

        Ok(results
            .facet_distribution
            .unwrap_or_default()
            .remove(category)
            .unwrap_or_default())
    }

    async fn index_document(&self, doc: &Document) -> Result<(), AppError> {
        let _task: meilisearch_sdk::task_info::TaskInfo = self
            .index()
            .add_documents(&[doc], Some("id"))
            .await
            .map_err(|e| AppError::unavailable(Source::PublishedIndex, e.to_string()))?;

        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<(), AppError> {
        let _task: meilisearch_sdk::task_info::TaskInfo = self
            .index()
            .delete_document(id)
            .await
            .map_err(|e| AppError::unavailable(Source::PublishedIndex, e.to_string()))?;

        Ok(())
    }

    async fn configure_index(&self) -> Result<(), AppError> {
        let index = self.index();

        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_filterable_attributes([
                "docType",
                "owners",
                "contributors",
                "product",
                "status",
                "approvers",
                "approvedBy",
                "appCreated",
            ])
            .await
            .map_err(|e| AppError::unavailable(Source::PublishedIndex, e.to_string()))?;

        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_sortable_attributes(["createdTime", "modifiedTime"])
            .await
            .map_err(|e| AppError::unavailable(Source::PublishedIndex, e.to_string()))?;

        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_searchable_attributes(["title", "docType", "product", "owners"])
            .await
            .map_err(|e| AppError::unavailable(Source::PublishedIndex, e.to_string()))?;

        let faceting = meilisearch_sdk::settings::FacetingSettings {
            max_values_per_facet: MAX_VALUES_PER_FACET,
            sort_facet_values_by: None,
        };
        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_faceting(&faceting)
            .await
            .map_err(|e| AppError::unavailable(Source::PublishedIndex, e.to_string()))?;

        Ok(())
    }
}
