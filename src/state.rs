use std::sync::Arc;
use std::time::Duration;

use crate::db::document_store::MongoDocumentStore;
use crate::db::draft_store::MongoDraftStore;
use crate::error::AppError;
use crate::lifecycle::service::LifecycleService;
use crate::listing::service::ListingService;
use crate::people::resolver::{HttpPeopleDirectory, Resolver};
use crate::search::client::{MeilisearchIndex, PublishedIndex};

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    /// Deadline applied to every external call (index, draft store,
    /// people directory). A timeout counts as that source's failure.
    pub call_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("DOCKET_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
        let mongodb_uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let mongodb_database =
            std::env::var("MONGODB_DATABASE").unwrap_or_else(|_| "docket".to_string());
        let call_timeout_secs = std::env::var("DOCKET_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            bind_addr,
            mongodb_uri,
            mongodb_database,
            call_timeout: Duration::from_secs(call_timeout_secs),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub listing: Arc<ListingService>,
    pub lifecycle: Arc<LifecycleService>,
}

impl AppState {
    /// Wire up production services from environment configuration.
    pub async fn from_env(config: &AppConfig) -> Result<Self, AppError> {
        let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to MongoDB: {e}")))?;
        let db = mongo_client.database(&config.mongodb_database);

        let index: Arc<dyn PublishedIndex> = Arc::new(MeilisearchIndex::from_env()?);
        index.configure_index().await?;

        let drafts = Arc::new(MongoDraftStore::new(&db));
        let documents = Arc::new(MongoDocumentStore::new(&db));
        let people = Arc::new(Resolver::new(Box::new(HttpPeopleDirectory::from_env()?)));

        Ok(Self {
            listing: Arc::new(ListingService::new(
                index.clone(),
                drafts.clone(),
                people,
                config.call_timeout,
            )),
            lifecycle: Arc::new(LifecycleService::new(documents, drafts, index)),
        })
    }

    pub fn new(listing: Arc<ListingService>, lifecycle: Arc<LifecycleService>) -> Self {
        Self { listing, lifecycle }
    }
}
