//! Resource attribute resolution
//!
//! The engine does not fetch resources itself. Callers inject a resolver that
//! asks the upstream registries for a resource's catalog, type identifier and
//! classification (or, for reports, the type identifiers the report yields).
//! Resolvers are neither retried nor cached by the engine.

use crate::error::LookupError;
use crate::types::{ResourceAttributes, ResourceRef};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resolves a resource reference to its attributes
#[async_trait]
pub trait ResourceAttributeResolver: Send + Sync {
    async fn resolve(&self, resource: &ResourceRef) -> Result<ResourceAttributes, LookupError>;
}

/// Resolver backed by a map, for tests and the memory backend
#[derive(Default)]
pub struct InMemoryResourceDirectory {
    resources: Arc<RwLock<HashMap<ResourceRef, ResourceAttributes>>>,
}

impl InMemoryResourceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, resource: ResourceRef, attributes: impl Into<ResourceAttributes>) {
        let mut resources = self.resources.write().await;
        resources.insert(resource, attributes.into());
    }

    pub async fn remove(&self, resource: &ResourceRef) {
        let mut resources = self.resources.write().await;
        resources.remove(resource);
    }
}

#[async_trait]
impl ResourceAttributeResolver for InMemoryResourceDirectory {
    async fn resolve(&self, resource: &ResourceRef) -> Result<ResourceAttributes, LookupError> {
        let resources = self.resources.read().await;
        resources
            .get(resource)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                resource_type: resource.resource_type,
                url: resource.url.clone(),
            })
    }
}

/// Resolver for deployments where callers always pass resolved attributes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

#[async_trait]
impl ResourceAttributeResolver for NoResolver {
    async fn resolve(&self, resource: &ResourceRef) -> Result<ResourceAttributes, LookupError> {
        Err(LookupError::Unavailable {
            resource_type: resource.resource_type,
            url: resource.url.clone(),
            reason: "no attribute resolver configured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidentiality::ConfidentialityLevel;
    use crate::types::ObjectAttributes;

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = InMemoryResourceDirectory::new();
        let case = ResourceRef::case("https://cases.example.com/cases/1");
        directory
            .insert(
                case.clone(),
                ObjectAttributes::new("ACME", "permit", ConfidentialityLevel::Public),
            )
            .await;

        assert!(directory.resolve(&case).await.is_ok());

        directory.remove(&case).await;
        let err = directory.resolve(&case).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_no_resolver_is_unavailable() {
        let err = NoResolver
            .resolve(&ResourceRef::document("https://docs.example.com/documents/1"))
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
    }
}
