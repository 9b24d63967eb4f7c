//! Query predicates for bulk prefiltering
//!
//! [`QueryPredicateBuilder`] turns an actor's currently valid grants for one
//! permission into a [`Predicate`] that a listing or search backend can apply
//! to a whole candidate set. The predicate is built from the same
//! [`Condition`]s the evaluator checks, so both paths agree by construction.
//!
//! # Shape
//!
//! ```text
//! any[
//!   all[catalog_equals, type_identifier_equals, classification_at_most]   // grant 1
//!   all[classification_at_most]                                           // grant 2
//!   url_in{urls}                                                          // atomic grants
//! ]
//! ```

use crate::blueprint::{Condition, Policy};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::grant::{AtomicGrantFilter, GrantFilter, GrantStore};
use crate::permission::PermissionRegistry;
use crate::types::{Actor, ResourceAttributes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Filter expression over resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Every resource
    Always,
    /// No resource
    Never,
    All { terms: Vec<Predicate> },
    Any { terms: Vec<Predicate> },
    Condition { condition: Condition },
    /// Resource URL is one of `urls`
    UrlIn { urls: BTreeSet<String> },
}

impl Predicate {
    /// Conjunction of a policy's conditions
    pub fn from_policy(policy: &Policy) -> Self {
        Self::All {
            terms: policy
                .conditions()
                .into_iter()
                .map(|condition| Self::Condition { condition })
                .collect(),
        }
    }

    /// Evaluate against one resource
    pub fn evaluate(&self, url: &str, attributes: &ResourceAttributes) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::All { terms } => terms.iter().all(|t| t.evaluate(url, attributes)),
            Self::Any { terms } => terms.iter().any(|t| t.evaluate(url, attributes)),
            Self::Condition { condition } => condition.holds(attributes),
            Self::UrlIn { urls } => urls.contains(url),
        }
    }

    /// Fold constants, flatten nested nodes of the same kind, merge URL sets
    pub fn simplify(self) -> Self {
        match self {
            Self::All { terms } => {
                let mut flat = Vec::with_capacity(terms.len());
                for term in terms.into_iter().map(Self::simplify) {
                    match term {
                        Self::Always => {}
                        Self::Never => return Self::Never,
                        Self::All { terms } => flat.extend(terms),
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => Self::Always,
                    1 => flat.remove(0),
                    _ => Self::All { terms: flat },
                }
            }
            Self::Any { terms } => {
                let mut flat = Vec::with_capacity(terms.len());
                let mut urls = BTreeSet::new();
                for term in terms.into_iter().map(Self::simplify) {
                    match term {
                        Self::Never => {}
                        Self::Always => return Self::Always,
                        Self::Any { terms } => {
                            for inner in terms {
                                match inner {
                                    Self::UrlIn { urls: more } => urls.extend(more),
                                    other => flat.push(other),
                                }
                            }
                        }
                        Self::UrlIn { urls: more } => urls.extend(more),
                        other => flat.push(other),
                    }
                }
                if !urls.is_empty() {
                    flat.push(Self::UrlIn { urls });
                }
                match flat.len() {
                    0 => Self::Never,
                    1 => flat.remove(0),
                    _ => Self::Any { terms: flat },
                }
            }
            Self::UrlIn { urls } if urls.is_empty() => Self::Never,
            other => other,
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }
}

/// Builds prefilter predicates from an actor's grants
pub struct QueryPredicateBuilder {
    registry: Arc<PermissionRegistry>,
    grants: Arc<dyn GrantStore>,
    clock: Arc<dyn Clock>,
}

impl QueryPredicateBuilder {
    pub fn new(registry: Arc<PermissionRegistry>, grants: Arc<dyn GrantStore>) -> Self {
        Self {
            registry,
            grants,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different time source for validity checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Predicate selecting the resources on which `actor` holds `permission`
    pub async fn build(&self, actor: &Actor, permission: &str) -> Result<Predicate> {
        if actor.is_superuser {
            return Ok(Predicate::Always);
        }

        let permission = self.registry.lookup(permission)?;
        let now = self.clock.now();

        let blueprint_filter = GrantFilter::new()
            .permission(&permission.name)
            .resource_type(permission.resource_type);
        let atomic_filter = AtomicGrantFilter::new()
            .permission(&permission.name)
            .resource_type(permission.resource_type);

        let blueprint_grants = self
            .grants
            .blueprint_grants_for(actor, &blueprint_filter, now)
            .await?;
        let atomic_grants = self
            .grants
            .atomic_grants_for(actor, &atomic_filter, now)
            .await?;

        debug!(
            "Building predicate for actor={} permission={} from {} blueprint and {} atomic grants",
            actor.id,
            permission.name,
            blueprint_grants.len(),
            atomic_grants.len()
        );

        let mut terms: Vec<Predicate> = blueprint_grants
            .iter()
            .map(|grant| Predicate::from_policy(&grant.policy))
            .collect();
        terms.push(Predicate::UrlIn {
            urls: atomic_grants
                .into_iter()
                .map(|grant| grant.grant.object_url)
                .collect(),
        });

        Ok(Predicate::Any { terms }.simplify())
    }
}
