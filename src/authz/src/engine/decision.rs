//! Authorization decision types

use crate::types::{GrantId, ResourceRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What made a decision come out the way it did.
/// Only ever names grants of the actor the decision is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionSource {
    /// Superusers bypass all checks
    Superuser,

    /// An atomic grant on the exact object (or, without a resource, any object)
    AtomicGrant { grant_id: Uuid },

    /// A blueprint grant whose role carries the permission and whose policy matched
    BlueprintGrant { grant_id: GrantId, role: String },

    /// Nothing applied; deny
    NoMatchingGrant,
}

/// Authorization decision with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision ID
    pub id: String,

    /// Whether the action is allowed
    pub allowed: bool,

    /// Permission that was checked
    pub permission: String,

    /// Resource the check was about; absent for "on any object" checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,

    pub source: DecisionSource,

    /// Instant the grants were evaluated at
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    fn new(
        allowed: bool,
        permission: impl Into<String>,
        resource: Option<&ResourceRef>,
        source: DecisionSource,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            allowed,
            permission: permission.into(),
            resource: resource.cloned(),
            source,
            timestamp,
        }
    }

    /// Allow decision
    pub fn allow(
        permission: impl Into<String>,
        resource: Option<&ResourceRef>,
        source: DecisionSource,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(true, permission, resource, source, timestamp)
    }

    /// Deny decision
    pub fn deny(
        permission: impl Into<String>,
        resource: Option<&ResourceRef>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(false, permission, resource, DecisionSource::NoMatchingGrant, timestamp)
    }
}

/// Extra context for a denied actor, used to offer an access request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DenialDetail {
    /// The actor already asked for access and is waiting
    PendingAccessRequest { requested_at: DateTime<Utc> },

    /// Nothing pending; the actor may request access
    NoPendingAccessRequest,
}
