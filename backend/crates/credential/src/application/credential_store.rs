//! Credential Store
//!
//! Loads identities from their source, installs them as the current snapshot
//! and keeps health records in step. Health of identities that disappear is
//! kept in case their file comes back.

use crate::application::health_tracker::HealthTracker;
use crate::application::identity_registry::IdentityRegistry;
use crate::domain::entities::Identity;
use crate::domain::repository::{CooldownRepository, HealthRepository, IdentitySource};
use crate::domain::value_objects::{IdentityFileName, IdentityId};
use crate::error::{CredentialError, CredentialResult};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Result of a reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    pub identities: usize,
    pub new_records: u64,
}

pub struct CredentialStore<S, R>
where
    S: IdentitySource,
    R: HealthRepository + CooldownRepository,
{
    source: Arc<S>,
    registry: Arc<IdentityRegistry>,
    health: HealthTracker<R>,
}

impl<S, R> Clone for CredentialStore<S, R>
where
    S: IdentitySource,
    R: HealthRepository + CooldownRepository,
{
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            registry: self.registry.clone(),
            health: self.health.clone(),
        }
    }
}

impl<S, R> CredentialStore<S, R>
where
    S: IdentitySource,
    R: HealthRepository + CooldownRepository,
{
    pub fn new(source: Arc<S>, registry: Arc<IdentityRegistry>, health: HealthTracker<R>) -> Self {
        Self {
            source,
            registry,
            health,
        }
    }

    /// Re-scan the source and install the result atomically
    pub async fn reload(&self) -> CredentialResult<ReloadSummary> {
        let mut identities = self.source.load_all().await?;

        // Two files for the same account: keep the first by file name
        identities.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        let mut seen = HashSet::new();
        identities.retain(|identity| {
            let fresh = seen.insert(identity.id.clone());
            if !fresh {
                tracing::warn!(
                    identity_id = %identity.id,
                    source = %identity.source_name,
                    "Duplicate identity skipped"
                );
            }
            fresh
        });

        let ids: Vec<IdentityId> = identities.iter().map(|i| i.id.clone()).collect();
        let new_records = self.health.ensure_records(&ids).await?;

        let count = identities.len();
        let previous = self.registry.install(identities);

        tracing::info!(
            identities = count,
            previous = previous.len(),
            new_records,
            "Identity pool reloaded"
        );

        Ok(ReloadSummary {
            identities: count,
            new_records,
        })
    }

    /// Write a new identity file and reload
    pub async fn add_identity(
        &self,
        name: &str,
        secrets: BTreeMap<String, String>,
    ) -> CredentialResult<ReloadSummary> {
        let name = IdentityFileName::parse(name)?;
        // Reject files the loader would skip
        Identity::from_secrets(name.as_str(), secrets.clone())?;

        self.source.write(name.as_str(), &secrets).await?;
        tracing::info!(name = %name, "Identity file added");
        self.reload().await
    }

    /// Delete an identity file and reload
    pub async fn remove_identity(&self, name: &str) -> CredentialResult<ReloadSummary> {
        let name = IdentityFileName::parse(name)?;
        if !self.source.remove(name.as_str()).await? {
            return Err(CredentialError::IdentityNotFound(name.to_string()));
        }
        tracing::info!(name = %name, "Identity file removed");
        self.reload().await
    }
}
