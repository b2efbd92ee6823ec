use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{AppError, Source};
use crate::models::document::Document;
use crate::models::search::{SearchParams, SortBy, SourcePage};

/// Repository trait for unpublished drafts.
///
/// Drafts are visible only to their owners and contributors and never enter
/// the published index. This trait allows mocking the store in tests.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// List drafts visible under `params.owner_scope`, filtered by the same
    /// facet selections as the published index, paginated and sorted by
    /// `created_time`.
    async fn list(
        &self,
        params: &SearchParams,
        hits_per_page: usize,
    ) -> Result<SourcePage, AppError>;

    /// Find a draft by id.
    async fn get(&self, id: &str) -> Result<Option<Document>, AppError>;

    /// Create a new draft or replace an existing one (matched by id).
    async fn upsert(&self, doc: Document) -> Result<(), AppError>;

    /// Remove a draft. Called when a draft is published.
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

/// MongoDB implementation of the DraftStore.
pub struct MongoDraftStore {
    collection: mongodb::Collection<Document>,
}

impl MongoDraftStore {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("drafts"),
        }
    }

    /// Build the Mongo filter for a draft listing: one `$in` per selected
    /// facet category (OR within, AND across), plus owner scoping. A scoped
    /// listing includes drafts shared with the caller as a contributor.
    fn build_filter(params: &SearchParams) -> mongodb::bson::Document {
        use mongodb::bson::doc;

        let mut filter = doc! {};
        for (category, values) in &params.facets {
            if values.is_empty() {
                continue;
            }
            filter.insert(category.clone(), doc! { "$in": values.clone() });
        }

        if let Some(owner) = &params.owner_scope {
            filter.insert(
                "$or",
                vec![doc! { "owners": owner }, doc! { "contributors": owner }],
            );
        }

        filter
    }
}

/// Count facet values over the full visible draft set. The draft store has
/// no index-side facet engine, and a caller's draft set is small enough to
/// count in one pass.
fn count_facets(drafts: &[Document]) -> HashMap<String, HashMap<String, usize>> {
    let mut counts: HashMap<String, HashMap<String, usize>> = HashMap::new();
    let mut bump = |category: &str, value: &str| {
        *counts
            .entry(category.to_string())
            .or_default()
            .entry(value.to_string())
            .or_insert(0) += 1;
    };

    for doc in drafts {
        bump("docType", &doc.doc_type);
        bump("product", &doc.product);
        bump("status", doc.status.wire_name());
        for owner in &doc.owners {
            bump("owners", owner);
        }
    }

    counts
}

#[async_trait]
impl DraftStore for MongoDraftStore {
    async fn list(
        &self,
        params: &SearchParams,
        hits_per_page: usize,
    ) -> Result<SourcePage, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let direction = match params.sort_by {
            SortBy::DateAsc => 1,
            SortBy::DateDesc => -1,
        };
        let options = FindOptions::builder()
            .sort(doc! { "createdTime": direction, "id": 1 })
            .build();

        let mut cursor = self
            .collection
            .find(Self::build_filter(params))
            .with_options(options)
            .await
            .map_err(|e| AppError::unavailable(Source::DraftStore, e.to_string()))?;

        let mut drafts = Vec::new();
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::unavailable(Source::DraftStore, e.to_string()))?
        {
            drafts.push(doc);
        }

        let facet_counts = count_facets(&drafts);
        let nb_hits = drafts.len();
        let nb_pages = nb_hits.div_ceil(hits_per_page);
        let hits: Vec<Document> = drafts
            .into_iter()
            .skip(params.page * hits_per_page)
            .take(hits_per_page)
            .collect();

        Ok(SourcePage {
            hits,
            page: params.page,
            nb_pages,
            nb_hits,
            facet_counts,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "id": id })
            .await
            .map_err(|e| AppError::unavailable(Source::DraftStore, e.to_string()))
    }

    async fn upsert(&self, doc: Document) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReplaceOptions;

        let filter = doc! { "id": &doc.id };
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(filter, &doc)
            .with_options(options)
            .await
            .map_err(|e| AppError::unavailable(Source::DraftStore, e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        use mongodb::bson::doc;

        self.collection
            .delete_one(doc! { "id": id })
            .await
            .map_err(|e| AppError::unavailable(Source::DraftStore, e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::DocStatus;

    fn draft(id: &str, doc_type: &str, product: &str, owner: &str) -> Document {
        Document {
            id: id.to_string(),
            title: id.to_string(),
            doc_type: doc_type.to_string(),
            product: product.to_string(),
            status: DocStatus::Wip,
            owners: vec![owner.to_string()],
            contributors: vec![],
            approvers: vec![],
            approved_by: vec![],
            changes_requested_by: vec![],
            created_time: 0,
            modified_time: None,
            locked: false,
            app_created: true,
            custom_fields: Default::default(),
        }
    }

    #[test]
    fn facet_counts_cover_all_categories() {
        let drafts = vec![
            draft("a", "RFC", "Vault", "meg@example.com"),
            draft("b", "RFC", "Nomad", "meg@example.com"),
            draft("c", "PRD", "Vault", "sam@example.com"),
        ];

        let counts = count_facets(&drafts);
        assert_eq!(counts["docType"]["RFC"], 2);
        assert_eq!(counts["docType"]["PRD"], 1);
        assert_eq!(counts["product"]["Vault"], 2);
        assert_eq!(counts["owners"]["meg@example.com"], 2);
        assert_eq!(counts["status"]["WIP"], 3);
    }

    #[test]
    fn filter_ands_categories_and_scopes_owner() {
        use mongodb::bson::doc;

        let mut params = SearchParams::default();
        params
            .facets
            .insert("docType".to_string(), vec!["RFC".to_string(), "PRD".to_string()]);
        params.owner_scope = Some("meg@example.com".to_string());

        let filter = MongoDraftStore::build_filter(&params);
        assert_eq!(
            filter.get_document("docType").unwrap(),
            &doc! { "$in": ["RFC", "PRD"] }
        );
        let or = filter.get_array("$or").unwrap();
        assert_eq!(or.len(), 2);
    }
}
