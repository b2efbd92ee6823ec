#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use docket::db::document_store::{DocumentPatch, DocumentStore};
use docket::db::draft_store::DraftStore;
use docket::error::{AppError, Source};
use docket::lifecycle::service::LifecycleService;
use docket::listing::service::ListingService;
use docket::models::document::{DocStatus, Document};
use docket::models::search::{SearchParams, SortBy, SourcePage};
use docket::people::resolver::{PeopleDirectory, Profile, Resolver};
use docket::search::client::PublishedIndex;
use docket::state::AppState;

pub const HITS_PER_PAGE: usize = 12;

/// Whether a document matches the structured listing filters, mirroring
/// the filter-expression semantics: OR within a facet category, AND across
/// categories, plus the owner/review-queue refinements.
fn matches(doc: &Document, params: &SearchParams, exclude_category: Option<&str>) -> bool {
    for (category, values) in &params.facets {
        if Some(category.as_str()) == exclude_category || values.is_empty() {
            continue;
        }
        let hit = values.iter().any(|v| facet_value_matches(doc, category, v));
        if !hit {
            return false;
        }
    }

    if let Some(owner) = &params.owner_scope {
        if !doc.is_owner(owner) && !doc.is_contributor(owner) {
            return false;
        }
    }
    if let Some(email) = &params.exclude_approved_by {
        if doc.has_approved(email) {
            return false;
        }
    }
    if params.app_created_only && !doc.app_created {
        return false;
    }
    if !params.query.is_empty()
        && !doc
            .title
            .to_lowercase()
            .contains(&params.query.to_lowercase())
    {
        return false;
    }

    true
}

fn facet_value_matches(doc: &Document, category: &str, value: &str) -> bool {
    match category {
        "docType" => doc.doc_type == value,
        "product" => doc.product == value,
        "status" => doc.status.wire_name() == value,
        "owners" => doc.is_owner(value),
        "approvers" => doc.is_approver(value),
        _ => false,
    }
}

fn count_facets(docs: &[&Document], category: &str) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        let values: Vec<String> = match category {
            "docType" => vec![doc.doc_type.clone()],
            "product" => vec![doc.product.clone()],
            "status" => vec![doc.status.wire_name().to_string()],
            "owners" => doc.owners.clone(),
            "approvers" => doc.approvers.clone(),
            _ => vec![],
        };
        for value in values {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    counts
}

fn sorted_filtered(
    docs: &HashMap<String, Document>,
    params: &SearchParams,
    exclude_category: Option<&str>,
) -> Vec<Document> {
    let mut matched: Vec<Document> = docs
        .values()
        .filter(|d| matches(d, params, exclude_category))
        .cloned()
        .collect();
    matched.sort_by(|a, b| match params.sort_by {
        SortBy::DateAsc => a.created_time.cmp(&b.created_time).then(a.id.cmp(&b.id)),
        SortBy::DateDesc => b.created_time.cmp(&a.created_time).then(a.id.cmp(&b.id)),
    });
    matched
}

fn paginate(matched: Vec<Document>, page: usize, hits_per_page: usize) -> SourcePage {
    let nb_hits = matched.len();
    let nb_pages = nb_hits.div_ceil(hits_per_page);
    let facet_counts = ["docType", "owners", "product", "status"]
        .iter()
        .map(|category| {
            let refs: Vec<&Document> = matched.iter().collect();
            (category.to_string(), count_facets(&refs, category))
        })
        .collect();
    let hits = matched
        .into_iter()
        .skip(page * hits_per_page)
        .take(hits_per_page)
        .collect();
    SourcePage {
        hits,
        page,
        nb_pages,
        nb_hits,
        facet_counts,
    }
}

/// In-memory stand-in for the Meilisearch index.
#[derive(Default)]
pub struct FakeIndex {
    pub docs: Mutex<HashMap<String, Document>>,
    pub unavailable: AtomicBool,
}

impl FakeIndex {
    fn check_up(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::unavailable(Source::PublishedIndex, "down"));
        }
        Ok(())
    }
}

#[async_trait]
impl PublishedIndex for FakeIndex {
    async fn search(
        &self,
        params: &SearchParams,
        hits_per_page: usize,
    ) -> Result<SourcePage, AppError> {
        self.check_up()?;
        let docs = self.docs.lock().unwrap();
        Ok(paginate(
            sorted_filtered(&docs, params, None),
            params.page,
            hits_per_page,
        ))
    }

    async fn facet_counts(
        &self,
        params: &SearchParams,
        category: &str,
    ) -> Result<HashMap<String, usize>, AppError> {
        self.check_up()?;
        let docs = self.docs.lock().unwrap();
        let matched = sorted_filtered(&docs, params, Some(category));
        let refs: Vec<&Document> = matched.iter().collect();
        Ok(count_facets(&refs, category))
    }

    async fn index_document(&self, doc: &Document) -> Result<(), AppError> {
        self.check_up()?;
        self.docs
            .lock()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<(), AppError> {
        self.check_up()?;
        self.docs.lock().unwrap().remove(id);
        Ok(())
    }

    async fn configure_index(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// In-memory stand-in for the Mongo draft store.
#[derive(Default)]
pub struct FakeDraftStore {
    pub docs: Mutex<HashMap<String, Document>>,
    pub unavailable: AtomicBool,
}

impl FakeDraftStore {
    fn check_up(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::unavailable(Source::DraftStore, "down"));
        }
        Ok(())
    }
}

#[async_trait]
impl DraftStore for FakeDraftStore {
    async fn list(
        &self,
        params: &SearchParams,
        hits_per_page: usize,
    ) -> Result<SourcePage, AppError> {
        self.check_up()?;
        let docs = self.docs.lock().unwrap();
        Ok(paginate(
            sorted_filtered(&docs, params, None),
            params.page,
            hits_per_page,
        ))
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, AppError> {
        self.check_up()?;
        Ok(self.docs.lock().unwrap().get(id).cloned())
    }

    async fn upsert(&self, doc: Document) -> Result<(), AppError> {
        self.check_up()?;
        self.docs
            .lock()
            .unwrap()
            .insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.check_up()?;
        self.docs.lock().unwrap().remove(id);
        Ok(())
    }
}

/// In-memory stand-in for the Mongo document store. Conditional updates
/// re-check their filter under the lock, like the real store does
/// server-side.
#[derive(Default)]
pub struct FakeDocumentStore {
    pub docs: Mutex<HashMap<String, Document>>,
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn get(&self, id: &str) -> Result<Option<Document>, AppError> {
        Ok(self.docs.lock().unwrap().get(id).cloned())
    }

    async fn upsert(&self, doc: Document) -> Result<(), AppError> {
        self.docs
            .lock()
            .unwrap()
            .insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn patch(&self, id: &str, patch: &DocumentPatch) -> Result<Option<Document>, AppError> {
        let mut docs = self.docs.lock().unwrap();
        let Some(doc) = docs.get_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            doc.title = title.clone();
        }
        if let Some(product) = &patch.product {
            doc.product = product.clone();
        }
        if let Some(approvers) = &patch.approvers {
            doc.approvers = approvers.clone();
        }
        if let Some(contributors) = &patch.contributors {
            doc.contributors = contributors.clone();
        }
        if let Some(fields) = &patch.custom_fields {
            doc.custom_fields = fields.clone();
        }
        doc.modified_time = Some(chrono::Utc::now().timestamp());
        Ok(Some(doc.clone()))
    }

    async fn approve(&self, id: &str, approver: &str) -> Result<Option<Document>, AppError> {
        let mut docs = self.docs.lock().unwrap();
        let Some(doc) = docs.get_mut(id) else {
            return Ok(None);
        };
        if !matches!(doc.status, DocStatus::InReview | DocStatus::Approved)
            || !doc.is_approver(approver)
        {
            return Ok(None);
        }
        if !doc.has_approved(approver) {
            doc.approved_by.push(approver.to_string());
        }
        doc.changes_requested_by.retain(|e| e != approver);
        doc.modified_time = Some(chrono::Utc::now().timestamp());
        Ok(Some(doc.clone()))
    }

    async fn request_changes(
        &self,
        id: &str,
        approver: &str,
    ) -> Result<Option<Document>, AppError> {
        let mut docs = self.docs.lock().unwrap();
        let Some(doc) = docs.get_mut(id) else {
            return Ok(None);
        };
        if doc.status != DocStatus::InReview || !doc.is_approver(approver) {
            return Ok(None);
        }
        if !doc.has_requested_changes(approver) {
            doc.changes_requested_by.push(approver.to_string());
        }
        doc.approved_by.retain(|e| e != approver);
        doc.modified_time = Some(chrono::Utc::now().timestamp());
        Ok(Some(doc.clone()))
    }

    async fn set_status(
        &self,
        id: &str,
        from: &[DocStatus],
        to: DocStatus,
    ) -> Result<Option<Document>, AppError> {
        let mut docs = self.docs.lock().unwrap();
        let Some(doc) = docs.get_mut(id) else {
            return Ok(None);
        };
        if !from.contains(&doc.status) {
            return Ok(None);
        }
        doc.status = to;
        doc.modified_time = Some(chrono::Utc::now().timestamp());
        Ok(Some(doc.clone()))
    }
}

/// People directory fake with a configurable roster.
#[derive(Default)]
pub struct FakePeopleDirectory {
    pub roster: Mutex<HashMap<String, Profile>>,
    pub unavailable: AtomicBool,
}

#[async_trait]
impl PeopleDirectory for FakePeopleDirectory {
    async fn lookup(&self, emails: &[String]) -> Result<HashMap<String, Profile>, AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::unavailable(Source::PeopleDirectory, "down"));
        }
        let roster = self.roster.lock().unwrap();
        Ok(emails
            .iter()
            .filter_map(|e| roster.get(e).map(|p| (e.clone(), p.clone())))
            .collect())
    }
}

/// Wires the real services and router over the in-memory fakes.
pub struct TestEnv {
    pub index: Arc<FakeIndex>,
    pub drafts: Arc<FakeDraftStore>,
    pub documents: Arc<FakeDocumentStore>,
    pub people: Arc<FakePeopleDirectory>,
    pub state: AppState,
}

impl TestEnv {
    pub fn new() -> Self {
        let index = Arc::new(FakeIndex::default());
        let drafts = Arc::new(FakeDraftStore::default());
        let documents = Arc::new(FakeDocumentStore::default());
        let people = Arc::new(FakePeopleDirectory::default());

        let index_dyn: Arc<dyn PublishedIndex> = index.clone();
        let drafts_dyn: Arc<dyn DraftStore> = drafts.clone();
        let documents_dyn: Arc<dyn DocumentStore> = documents.clone();
        let resolver = Arc::new(Resolver::new(Box::new(FakePeopleDirectoryHandle {
            inner: people.clone(),
        })));

        let listing = Arc::new(ListingService::new(
            index_dyn.clone(),
            drafts_dyn.clone(),
            resolver,
            Duration::from_secs(5),
        ));
        let lifecycle = Arc::new(LifecycleService::new(
            documents_dyn,
            drafts_dyn,
            index_dyn,
        ));

        Self {
            index,
            drafts,
            documents,
            people,
            state: AppState::new(listing, lifecycle),
        }
    }

    /// Build an `axum_test::TestServer` over the real router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .build(docket::api::routes::router(self.state.clone()))
    }

    /// A server that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .build(docket::api::routes::router(self.state.clone()))
    }

    /// Seed a document into the document store and the published index.
    pub fn seed_published(&self, doc: Document) {
        self.documents
            .docs
            .lock()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        self.index.docs.lock().unwrap().insert(doc.id.clone(), doc);
    }

    pub fn seed_draft(&self, doc: Document) {
        self.drafts
            .docs
            .lock()
            .unwrap()
            .insert(doc.id.clone(), doc);
    }

    pub fn add_person(&self, email: &str, name: &str) {
        self.people.roster.lock().unwrap().insert(
            email.to_string(),
            Profile {
                email: email.to_string(),
                name: Some(name.to_string()),
                picture: None,
            },
        );
    }
}

/// The resolver owns its directory; hand it a thin forwarding handle so
/// the test can keep a reference to toggle availability.
struct FakePeopleDirectoryHandle {
    inner: Arc<FakePeopleDirectory>,
}

#[async_trait]
impl PeopleDirectory for FakePeopleDirectoryHandle {
    async fn lookup(&self, emails: &[String]) -> Result<HashMap<String, Profile>, AppError> {
        self.inner.lookup(emails).await
    }
}

/// Document builder for tests.
pub fn doc(id: &str, status: DocStatus, owner: &str) -> Document {
    Document {
        id: id.to_string(),
        title: format!("{id} title"),
        doc_type: "RFC".to_string(),
        product: "Vault".to_string(),
        status,
        owners: vec![owner.to_string()],
        contributors: vec![],
        approvers: vec![],
        approved_by: vec![],
        changes_requested_by: vec![],
        created_time: 1_700_000_000,
        modified_time: Some(1_700_000_000),
        locked: false,
        app_created: true,
        custom_fields: Default::default(),
    }
}

pub fn user_header(email: &str) -> (http::HeaderName, http::HeaderValue) {
    (
        http::HeaderName::from_static("x-user-email"),
        http::HeaderValue::from_str(email).expect("invalid test email"),
    )
}

/// Issue a GET as the given user.
pub async fn get_as(
    server: &axum_test::TestServer,
    path: &str,
    email: &str,
) -> axum_test::TestResponse {
    let (name, value) = user_header(email);
    server.get(path).add_header(name, value).await
}

/// Issue a POST (no body) as the given user.
pub async fn post_as(
    server: &axum_test::TestServer,
    path: &str,
    email: &str,
) -> axum_test::TestResponse {
    let (name, value) = user_header(email);
    server.post(path).add_header(name, value).await
}
