//! Authorization evaluator
//!
//! Answers "may this actor do this permission, on this resource or on any
//! resource at all?" by combining grant store reads with blueprint matching.
//! Evaluation is a logical OR over all qualifying grants; there is no deny
//! grant, so adding a grant never removes access.
//!
//! # Pipeline
//!
//! ```text
//! superuser? ──yes──▶ allow
//!     │ no
//! PermissionRegistry.lookup ──unknown──▶ ConfigurationError
//!     │
//! resource? ──no──▶ any valid atomic or blueprint grant for the permission?
//!     │ yes
//! atomic grant on exact URL? ──yes──▶ allow
//!     │ no
//! blueprint grants for permission ──none──▶ deny
//!     │
//! resolve attributes ──failure──▶ LookupError
//!     │
//! any policy matches? ──yes──▶ allow, else deny
//! ```

pub mod decision;
pub mod metrics;

pub use decision::{Decision, DecisionSource, DenialDetail};
pub use metrics::{EngineMetrics, MetricsCollector};

use crate::access_request::{AccessRequestSource, NoAccessRequests};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::grant::{AtomicGrantFilter, GrantFilter, GrantStore};
use crate::permission::{Permission, PermissionRegistry};
use crate::resolver::ResourceAttributeResolver;
use crate::types::{Actor, Resource, ResourceAttributes, ResourceRef};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Evaluator configuration
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Collect decision counters and latency percentiles
    pub enable_metrics: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
        }
    }
}

/// What a check is about
#[derive(Clone, Copy)]
enum Target<'a> {
    /// "On some object": navigation gating
    AnyObject,
    /// Attributes still to be resolved
    Reference(&'a ResourceRef),
    /// Attributes supplied by the caller
    Resolved(&'a Resource),
}

impl<'a> Target<'a> {
    fn reference(self) -> Option<&'a ResourceRef> {
        match self {
            Self::AnyObject => None,
            Self::Reference(reference) => Some(reference),
            Self::Resolved(resource) => Some(&resource.reference),
        }
    }
}

/// Stateless decision core; safe to share across request handlers
pub struct Evaluator {
    registry: Arc<PermissionRegistry>,
    grants: Arc<dyn GrantStore>,
    resolver: Arc<dyn ResourceAttributeResolver>,
    access_requests: Arc<dyn AccessRequestSource>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Evaluator {
    pub fn new(
        config: EvaluatorConfig,
        registry: Arc<PermissionRegistry>,
        grants: Arc<dyn GrantStore>,
        resolver: Arc<dyn ResourceAttributeResolver>,
    ) -> Self {
        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        Self {
            registry,
            grants,
            resolver,
            access_requests: Arc::new(NoAccessRequests),
            clock: Arc::new(SystemClock),
            metrics,
        }
    }

    /// Use a different time source for validity checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Source consulted by [`Evaluator::denial_detail`]
    pub fn with_access_requests(mut self, access_requests: Arc<dyn AccessRequestSource>) -> Self {
        self.access_requests = access_requests;
        self
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// May `actor` exercise `permission` on `resource`, or on some object when `resource` is `None`?
    pub async fn allowed(
        &self,
        actor: &Actor,
        permission: &str,
        resource: Option<&ResourceRef>,
    ) -> Result<bool> {
        Ok(self.decide(actor, permission, resource).await?.allowed)
    }

    /// Like [`Evaluator::allowed`] with attributes already resolved by the caller
    pub async fn allowed_on(&self, actor: &Actor, permission: &str, resource: &Resource) -> Result<bool> {
        Ok(self.decide_on(actor, permission, resource).await?.allowed)
    }

    /// Full decision, naming the grant that allowed
    pub async fn decide(
        &self,
        actor: &Actor,
        permission: &str,
        resource: Option<&ResourceRef>,
    ) -> Result<Decision> {
        let target = match resource {
            Some(reference) => Target::Reference(reference),
            None => Target::AnyObject,
        };
        self.evaluate(actor, permission, target).await
    }

    /// Full decision with caller-resolved attributes
    pub async fn decide_on(&self, actor: &Actor, permission: &str, resource: &Resource) -> Result<Decision> {
        self.evaluate(actor, permission, Target::Resolved(resource)).await
    }

    /// Whether the actor already has a pending access request for `resource`
    pub async fn denial_detail(&self, actor: &Actor, resource: &ResourceRef) -> Result<DenialDetail> {
        let pending = self.access_requests.pending_request(actor, resource).await?;
        Ok(match pending {
            Some(request) => DenialDetail::PendingAccessRequest {
                requested_at: request.requested_at,
            },
            None => DenialDetail::NoPendingAccessRequest,
        })
    }

    /// Get evaluator metrics
    pub fn get_metrics(&self) -> Option<EngineMetrics> {
        self.metrics.as_ref().map(|metrics| metrics.get_metrics())
    }

    /// Metrics in Prometheus text format
    pub fn export_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(|metrics| metrics.export_prometheus())
    }

    async fn evaluate(&self, actor: &Actor, permission: &str, target: Target<'_>) -> Result<Decision> {
        let start = Instant::now();
        let result = self.evaluate_uninstrumented(actor, permission, target).await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(decision) => metrics.record_decision(decision.allowed),
                Err(_) => metrics.record_error(),
            }
            metrics.record_latency(start.elapsed());
        }

        result
    }

    async fn evaluate_uninstrumented(
        &self,
        actor: &Actor,
        permission_name: &str,
        target: Target<'_>,
    ) -> Result<Decision> {
        let now = self.clock.now();
        let reference = target.reference();

        if actor.is_superuser {
            debug!("Superuser {} bypasses check for {}", actor.id, permission_name);
            return Ok(Decision::allow(
                permission_name,
                reference,
                DecisionSource::Superuser,
                now,
            ));
        }

        let permission = self.registry.lookup(permission_name)?;

        debug!(
            "Authorization check: actor={}, permission={}, resource={:?}",
            actor.id,
            permission.name,
            reference.map(|r| r.url.as_str())
        );

        match target {
            Target::AnyObject => self.check_any_object(actor, permission, now).await,
            Target::Reference(reference) => {
                self.check_object(actor, permission, reference, None, now).await
            }
            Target::Resolved(resource) => {
                self.check_object(
                    actor,
                    permission,
                    &resource.reference,
                    Some(&resource.attributes),
                    now,
                )
                .await
            }
        }
    }

    async fn check_any_object(
        &self,
        actor: &Actor,
        permission: &Permission,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let blueprint_filter = GrantFilter::new()
            .permission(&permission.name)
            .resource_type(permission.resource_type);
        let blueprint_grants = self
            .grants
            .blueprint_grants_for(actor, &blueprint_filter, now)
            .await?;

        if let Some(grant) = blueprint_grants.first() {
            return Ok(Decision::allow(
                &permission.name,
                None,
                DecisionSource::BlueprintGrant {
                    grant_id: grant.id,
                    role: grant.role.name.clone(),
                },
                now,
            ));
        }

        let atomic_filter = AtomicGrantFilter::new()
            .permission(&permission.name)
            .resource_type(permission.resource_type);
        let atomic_grants = self.grants.atomic_grants_for(actor, &atomic_filter, now).await?;

        if let Some(grant) = atomic_grants.first() {
            return Ok(Decision::allow(
                &permission.name,
                None,
                DecisionSource::AtomicGrant { grant_id: grant.id },
                now,
            ));
        }

        debug!("No grant for {} on any object", permission.name);
        Ok(Decision::deny(&permission.name, None, now))
    }

    async fn check_object(
        &self,
        actor: &Actor,
        permission: &Permission,
        reference: &ResourceRef,
        attributes: Option<&ResourceAttributes>,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        if reference.resource_type != permission.resource_type {
            debug!(
                "Permission {} guards {}, not {}",
                permission.name, permission.resource_type, reference.resource_type
            );
            return Ok(Decision::deny(&permission.name, Some(reference), now));
        }

        // Atomic grants need no attributes
        let atomic_filter = AtomicGrantFilter::new()
            .permission(&permission.name)
            .object_url(&reference.url);
        let atomic_grants = self.grants.atomic_grants_for(actor, &atomic_filter, now).await?;

        if let Some(grant) = atomic_grants.first() {
            debug!("Atomic grant {} on {}", grant.id, reference.url);
            return Ok(Decision::allow(
                &permission.name,
                Some(reference),
                DecisionSource::AtomicGrant { grant_id: grant.id },
                now,
            ));
        }

        let blueprint_filter = GrantFilter::new()
            .permission(&permission.name)
            .resource_type(reference.resource_type);
        let blueprint_grants = self
            .grants
            .blueprint_grants_for(actor, &blueprint_filter, now)
            .await?;

        if blueprint_grants.is_empty() {
            debug!("No blueprint grants for {}", permission.name);
            return Ok(Decision::deny(&permission.name, Some(reference), now));
        }

        let resolved;
        let attributes = match attributes {
            Some(attributes) => attributes,
            None => {
                resolved = self.resolver.resolve(reference).await.map_err(|e| {
                    warn!("Attribute lookup failed for {}: {}", reference.url, e);
                    e
                })?;
                &resolved
            }
        };

        match blueprint_grants
            .iter()
            .find(|grant| grant.policy.matches(attributes))
        {
            Some(grant) => {
                debug!("Blueprint grant {} (role {}) matches {}", grant.id, grant.role.name, reference.url);
                Ok(Decision::allow(
                    &permission.name,
                    Some(reference),
                    DecisionSource::BlueprintGrant {
                        grant_id: grant.id,
                        role: grant.role.name.clone(),
                    },
                    now,
                ))
            }
            None => {
                debug!(
                    "{} blueprint grants checked, none matches {}",
                    blueprint_grants.len(),
                    reference.url
                );
                Ok(Decision::deny(&permission.name, Some(reference), now))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::InMemoryGrantStore;
    use crate::resolver::NoResolver;

    #[tokio::test]
    async fn test_evaluator_creation() {
        let registry = Arc::new(PermissionRegistry::with_defaults().unwrap());
        let grants = Arc::new(InMemoryGrantStore::new(registry.clone()));
        let evaluator = Evaluator::new(EvaluatorConfig::default(), registry, grants, Arc::new(NoResolver));

        assert!(evaluator.metrics.is_some());
        assert!(evaluator.registry().contains("cases:read"));
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let registry = Arc::new(PermissionRegistry::with_defaults().unwrap());
        let grants = Arc::new(InMemoryGrantStore::new(registry.clone()));
        let evaluator = Evaluator::new(
            EvaluatorConfig { enable_metrics: false },
            registry,
            grants,
            Arc::new(NoResolver),
        );

        assert!(evaluator.get_metrics().is_none());
        assert!(evaluator.export_metrics().is_none());
    }
}
