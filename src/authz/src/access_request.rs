//! Access requests
//!
//! When an actor is denied, calling code may offer to request access. The
//! engine reports whether a request by the same actor is already pending;
//! nothing about other actors' requests or grants is exposed. Approving a
//! request creates an atomic grant with [`GrantReason::AccessRequest`].

use crate::error::{AuthzError, Result};
use crate::grant::{GrantReason, InMemoryGrantStore, NewAtomicGrant, ValidityWindow};
use crate::types::{Actor, ActorId, ResourceRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Outcome of a handled request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRequestResult {
    Approved,
    Rejected,
}

/// An actor's request for access to one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: Uuid,
    pub requester: ActorId,
    pub resource: ResourceRef,
    pub comment: String,
    pub requested_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AccessRequestResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled_at: Option<DateTime<Utc>>,
}

impl AccessRequest {
    pub fn is_pending(&self) -> bool {
        self.result.is_none()
    }
}

/// Source of pending access requests
#[async_trait]
pub trait AccessRequestSource: Send + Sync {
    /// The actor's own pending request for `resource`, if any
    async fn pending_request(&self, actor: &Actor, resource: &ResourceRef) -> Result<Option<AccessRequest>>;
}

/// Source for deployments without access requests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccessRequests;

#[async_trait]
impl AccessRequestSource for NoAccessRequests {
    async fn pending_request(&self, _actor: &Actor, _resource: &ResourceRef) -> Result<Option<AccessRequest>> {
        Ok(None)
    }
}

/// In-memory access request registry
#[derive(Default)]
pub struct InMemoryAccessRequests {
    requests: Arc<RwLock<Vec<AccessRequest>>>,
}

impl InMemoryAccessRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a request; an already pending request for the same resource is returned instead
    pub async fn submit(
        &self,
        actor: &Actor,
        resource: ResourceRef,
        comment: impl Into<String>,
        at: DateTime<Utc>,
    ) -> AccessRequest {
        let mut requests = self.requests.write().await;
        if let Some(existing) = requests
            .iter()
            .find(|r| r.is_pending() && r.requester == actor.id && r.resource == resource)
        {
            return existing.clone();
        }

        let request = AccessRequest {
            id: Uuid::new_v4(),
            requester: actor.id.clone(),
            resource,
            comment: comment.into(),
            requested_at: at,
            result: None,
            handled_at: None,
        };
        requests.push(request.clone());
        request
    }

    /// Approve a pending request at `at`, granting `permission` on the resource
    ///
    /// The request is claimed before the grant is written, so concurrent
    /// approvals create at most one grant. A failed grant write puts the
    /// request back to pending.
    pub async fn approve(
        &self,
        id: Uuid,
        permission: impl Into<String>,
        validity: ValidityWindow,
        at: DateTime<Utc>,
        grants: &InMemoryGrantStore,
    ) -> Result<Uuid> {
        let claimed = {
            let mut requests = self.requests.write().await;
            let request = requests
                .iter_mut()
                .find(|r| r.id == id && r.is_pending())
                .ok_or_else(|| AuthzError::NotFound(format!("pending access request {}", id)))?;
            request.result = Some(AccessRequestResult::Approved);
            request.handled_at = Some(at);
            request.clone()
        };

        let written = grants
            .add_atomic_grant(NewAtomicGrant {
                actor_id: claimed.requester.clone(),
                resource_type: claimed.resource.resource_type,
                object_url: claimed.resource.url.clone(),
                permission: permission.into(),
                validity,
                reason: GrantReason::AccessRequest,
                justification: Some(claimed.comment.clone()).filter(|c| !c.is_empty()),
                profile_id: None,
            })
            .await;

        match written {
            Ok(grant_id) => {
                info!("Access request {} approved for {}", id, claimed.requester);
                Ok(grant_id)
            }
            Err(e) => {
                let mut requests = self.requests.write().await;
                if let Some(request) = requests.iter_mut().find(|r| r.id == id) {
                    request.result = None;
                    request.handled_at = None;
                }
                Err(e)
            }
        }
    }

    pub async fn reject(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .iter_mut()
            .find(|r| r.id == id && r.is_pending())
            .ok_or_else(|| AuthzError::NotFound(format!("pending access request {}", id)))?;
        request.result = Some(AccessRequestResult::Rejected);
        request.handled_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl AccessRequestSource for InMemoryAccessRequests {
    async fn pending_request(&self, actor: &Actor, resource: &ResourceRef) -> Result<Option<AccessRequest>> {
        let requests = self.requests.read().await;
        Ok(requests
            .iter()
            .find(|r| r.is_pending() && r.requester == actor.id && r.resource == *resource)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{AtomicGrantFilter, GrantStore};
    use crate::permission::builtin::CASES_READ;
    use crate::permission::PermissionRegistry;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_submit_is_idempotent_while_pending() {
        let requests = InMemoryAccessRequests::new();
        let alice = Actor::new("alice");
        let case = ResourceRef::case("https://cases.example.com/cases/1");

        let first = requests.submit(&alice, case.clone(), "please", now()).await;
        let second = requests.submit(&alice, case.clone(), "again", now()).await;
        assert_eq!(first.id, second.id);

        let pending = requests.pending_request(&alice, &case).await.unwrap();
        assert_eq!(pending.map(|r| r.id), Some(first.id));

        let bob = Actor::new("bob");
        assert!(requests.pending_request(&bob, &case).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_approval_creates_atomic_grant() {
        let registry = Arc::new(PermissionRegistry::with_defaults().unwrap());
        let grants = InMemoryGrantStore::new(registry);
        let requests = InMemoryAccessRequests::new();
        let alice = Actor::new("alice");
        let case = ResourceRef::case("https://cases.example.com/cases/1");

        let request = requests.submit(&alice, case.clone(), "", now()).await;
        requests
            .approve(request.id, CASES_READ, ValidityWindow::starting(now()), now(), &grants)
            .await
            .unwrap();

        assert!(requests.pending_request(&alice, &case).await.unwrap().is_none());
        let held = grants
            .atomic_grants_for(&alice, &AtomicGrantFilter::new().object_url(&case.url), now())
            .await
            .unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].reason, GrantReason::AccessRequest);
        assert_eq!(held[0].grant.justification, None);

        assert!(requests
            .approve(request.id, CASES_READ, ValidityWindow::starting(now()), now(), &grants)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_approval_records_decision_time() {
        let registry = Arc::new(PermissionRegistry::with_defaults().unwrap());
        let grants = InMemoryGrantStore::new(registry);
        let requests = InMemoryAccessRequests::new();
        let alice = Actor::new("alice");
        let case = ResourceRef::case("https://cases.example.com/cases/3");
        let starts_later = ValidityWindow::starting(now() + chrono::Duration::days(7));

        let request = requests.submit(&alice, case, "", now()).await;
        requests
            .approve(request.id, CASES_READ, starts_later, now(), &grants)
            .await
            .unwrap();

        let stored = requests.requests.read().await;
        assert_eq!(stored[0].result, Some(AccessRequestResult::Approved));
        assert_eq!(stored[0].handled_at, Some(now()));
    }

    #[tokio::test]
    async fn test_failed_approval_stays_pending() {
        let registry = Arc::new(PermissionRegistry::with_defaults().unwrap());
        let grants = InMemoryGrantStore::new(registry);
        let requests = InMemoryAccessRequests::new();
        let alice = Actor::new("alice");
        let case = ResourceRef::case("https://cases.example.com/cases/4");

        let request = requests.submit(&alice, case.clone(), "", now()).await;
        assert!(requests
            .approve(request.id, "cases:fly", ValidityWindow::starting(now()), now(), &grants)
            .await
            .is_err());

        let pending = requests.pending_request(&alice, &case).await.unwrap();
        assert_eq!(pending.map(|r| r.id), Some(request.id));
        requests
            .approve(request.id, CASES_READ, ValidityWindow::starting(now()), now(), &grants)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reject() {
        let requests = InMemoryAccessRequests::new();
        let alice = Actor::new("alice");
        let case = ResourceRef::case("https://cases.example.com/cases/2");
        let request = requests.submit(&alice, case.clone(), "", now()).await;

        requests.reject(request.id, now()).await.unwrap();
        assert!(requests.pending_request(&alice, &case).await.unwrap().is_none());
    }
}
