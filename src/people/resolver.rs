use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Source};
use crate::models::search::Hit;

/// Display metadata for one person, as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl Profile {
    /// A bare-email profile, used when the directory has no record. Cached
    /// so a missing person is not re-requested on every listing.
    fn fallback(email: &str) -> Self {
        Self {
            email: email.to_string(),
            name: None,
            picture: None,
        }
    }
}

/// Trait for the upstream people directory, enabling mock testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeopleDirectory: Send + Sync {
    /// Batched lookup. Emails absent from the result simply have no
    /// directory record.
    async fn lookup(&self, emails: &[String]) -> Result<HashMap<String, Profile>, AppError>;
}

/// HTTP implementation of the PeopleDirectory.
pub struct HttpPeopleDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPeopleDirectory {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create from the `PEOPLE_DIRECTORY_URL` environment variable.
    pub fn from_env() -> Result<Self, AppError> {
        let base_url = std::env::var("PEOPLE_DIRECTORY_URL")
            .map_err(|_| AppError::Internal("PEOPLE_DIRECTORY_URL not set".into()))?;
        Ok(Self::new(base_url))
    }
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    emails: &'a [String],
}

#[async_trait]
impl PeopleDirectory for HttpPeopleDirectory {
    async fn lookup(&self, emails: &[String]) -> Result<HashMap<String, Profile>, AppError> {
        let url = format!("{}/api/v1/people", self.base_url.trim_end_matches('/'));
        let profiles: Vec<Profile> = self
            .client
            .post(&url)
            .json(&LookupRequest { emails })
            .send()
            .await
            .map_err(|e| AppError::unavailable(Source::PeopleDirectory, e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::unavailable(Source::PeopleDirectory, e.to_string()))?
            .json()
            .await
            .map_err(|e| AppError::unavailable(Source::PeopleDirectory, e.to_string()))?;

        Ok(profiles.into_iter().map(|p| (p.email.clone(), p)).collect())
    }
}

/// Batches, deduplicates and caches people lookups.
///
/// The cache is the only long-lived shared state in the core: read-mostly,
/// written with idempotent upserts. Resolution failure is never fatal;
/// listings render with the bare email instead.
pub struct Resolver {
    directory: Box<dyn PeopleDirectory>,
    cache: RwLock<HashMap<String, Profile>>,
}

impl Resolver {
    pub fn new(directory: Box<dyn PeopleDirectory>) -> Self {
        Self {
            directory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a set of emails to profiles. Returns whatever subset is
    /// known; a directory outage degrades to cache contents with a warning.
    pub async fn resolve(&self, emails: &[String]) -> HashMap<String, Profile> {
        let mut resolved = HashMap::new();
        let mut misses: Vec<String> = Vec::new();

        {
            let cache = self.cache.read().expect("people cache poisoned");
            for email in emails {
                if resolved.contains_key(email) || misses.contains(email) {
                    continue;
                }
                match cache.get(email) {
                    Some(profile) => {
                        resolved.insert(email.clone(), profile.clone());
                    }
                    None => misses.push(email.clone()),
                }
            }
        }

        if misses.is_empty() {
            return resolved;
        }

        match self.directory.lookup(&misses).await {
            Ok(found) => {
                let mut cache = self.cache.write().expect("people cache poisoned");
                for email in &misses {
                    // Cache a fallback for unknown people so they are not
                    // re-requested on every listing.
                    let profile = found
                        .get(email)
                        .cloned()
                        .unwrap_or_else(|| Profile::fallback(email));
                    cache.insert(email.clone(), profile.clone());
                    resolved.insert(email.clone(), profile);
                }
            }
            Err(err) => {
                tracing::warn!(missing = misses.len(), error = %err, "people lookup failed; rendering with bare emails");
            }
        }

        resolved
    }

    /// Annotate hits with their primary owner's profile.
    pub async fn annotate(&self, hits: &mut [Hit]) {
        let owners: Vec<String> = hits
            .iter()
            .filter_map(|h| h.document.primary_owner().map(str::to_string))
            .collect();
        if owners.is_empty() {
            return;
        }

        let profiles = self.resolve(&owners).await;
        for hit in hits.iter_mut() {
            if let Some(owner) = hit.document.primary_owner() {
                hit.owner_profile = profiles.get(owner).cloned();
            }
        }
    }
}
