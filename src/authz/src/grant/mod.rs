//! Grant entities
//!
//! Two kinds of grant make an action allowed:
//!
//! - [`BlueprintGrant`]: a role (set of permission names) plus an attribute
//!   policy, reached by actors through [`AuthorizationProfile`] membership.
//! - [`AtomicGrant`]: one permission on one exact object URL, linked to an
//!   actor through an [`ActorAtomicGrant`].
//!
//! Both carry a [`ValidityWindow`]; outside it a grant contributes nothing.

pub mod store;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use store::{AtomicGrantFilter, GrantFilter, GrantStore, InMemoryGrantStore};
#[cfg(feature = "postgres")]
pub use postgres::PostgresGrantStore;

use crate::blueprint::Policy;
use crate::error::{ConfigurationError, PolicyValidationError};
use crate::permission::PermissionRegistry;
use crate::types::{ActorId, GrantId, ProfileId, ResourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Half-open validity interval `[valid_from, valid_until)`; open ended without `valid_until`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub valid_from: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl ValidityWindow {
    /// Window with an optional end; the end must lie after the start
    pub fn new(
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<Self, ConfigurationError> {
        if let Some(until) = valid_until {
            if until <= valid_from {
                return Err(ConfigurationError::Invalid(format!(
                    "validity ends ({}) before it starts ({})",
                    until, valid_from
                )));
            }
        }
        Ok(Self {
            valid_from,
            valid_until,
        })
    }

    /// Open-ended window
    pub fn starting(valid_from: DateTime<Utc>) -> Self {
        Self {
            valid_from,
            valid_until: None,
        }
    }

    /// "Currently valid": `valid_from <= at` and (`valid_until` unset or `valid_until > at`)
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_until.map_or(true, |until| until > at)
    }
}

/// Named set of permission names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: BTreeSet<String>,
}

impl Role {
    pub fn new<I, S>(name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Name must be non-empty and every permission registered
    pub fn validate(&self, registry: &PermissionRegistry) -> Result<(), ConfigurationError> {
        if self.name.is_empty() {
            return Err(ConfigurationError::Invalid("Role name cannot be empty".to_string()));
        }
        registry.ensure_known(&self.permissions)
    }
}

/// Role + attribute policy + validity, as read back from a store.
/// `role` holds the role's current permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintGrant {
    pub id: GrantId,
    pub role: Role,
    pub resource_type: ResourceType,
    pub policy: Policy,
    pub validity: ValidityWindow,
}

impl BlueprintGrant {
    /// Whether the grant's role carries `permission` for `resource_type`
    pub fn covers(&self, permission: &str, resource_type: ResourceType) -> bool {
        self.resource_type == resource_type && self.role.contains(permission)
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.validity.contains(at)
    }
}

/// Admin write request for a blueprint grant; the policy is still raw
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlueprintGrant {
    /// Name of an existing role
    pub role: String,
    pub resource_type: ResourceType,
    pub policy: Value,
    pub validity: ValidityWindow,
}

impl NewBlueprintGrant {
    /// Validate the raw policy with the blueprint owned by `resource_type`
    pub fn validate_policy(&self) -> Result<Policy, PolicyValidationError> {
        Policy::validate_for(self.resource_type, &self.policy)
    }
}

/// One permission on one exact object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicGrant {
    pub id: GrantId,
    pub resource_type: ResourceType,
    pub object_url: String,
    pub permission: String,
    pub validity: ValidityWindow,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl AtomicGrant {
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.validity.contains(at)
    }
}

/// Why an actor holds an atomic grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantReason {
    /// Approved access request
    AccessRequest,
    /// Assigned as reviewer
    AssignedReviewer,
    /// Involved party on the case
    Involved,
    /// Assigned to an activity
    Activity,
    /// Assigned a checklist question
    Checklist,
    /// Assigned a process task
    Process,
    /// Free-text provenance
    Other(String),
}

impl fmt::Display for GrantReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessRequest => f.write_str("access request approved"),
            Self::AssignedReviewer => f.write_str("assigned reviewer"),
            Self::Involved => f.write_str("involved party"),
            Self::Activity => f.write_str("assigned activity"),
            Self::Checklist => f.write_str("assigned checklist question"),
            Self::Process => f.write_str("assigned process task"),
            Self::Other(text) => f.write_str(text),
        }
    }
}

/// Links an actor to an atomic grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorAtomicGrant {
    pub id: Uuid,
    pub actor_id: ActorId,
    pub grant: AtomicGrant,
    pub reason: GrantReason,

    /// Profile the grant was inherited through, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<ProfileId>,
}

/// Admin write request for an actor's atomic grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAtomicGrant {
    pub actor_id: ActorId,
    pub resource_type: ResourceType,
    pub object_url: String,
    pub permission: String,
    pub validity: ValidityWindow,
    pub reason: GrantReason,

    #[serde(default)]
    pub justification: Option<String>,

    #[serde(default)]
    pub profile_id: Option<ProfileId>,
}

impl NewAtomicGrant {
    /// Permission must be registered for the grant's resource type
    pub fn validate(&self, registry: &PermissionRegistry) -> Result<(), ConfigurationError> {
        if self.object_url.is_empty() {
            return Err(ConfigurationError::Invalid(
                "Atomic grant object URL cannot be empty".to_string(),
            ));
        }
        let permission = registry.lookup(&self.permission)?;
        if permission.resource_type != self.resource_type {
            return Err(ConfigurationError::Invalid(format!(
                "Permission '{}' applies to {}, not {}",
                permission.name, permission.resource_type, self.resource_type
            )));
        }
        Ok(())
    }

    /// Materialize with fresh identifiers
    pub fn into_grant(self) -> ActorAtomicGrant {
        ActorAtomicGrant {
            id: Uuid::new_v4(),
            actor_id: self.actor_id,
            grant: AtomicGrant {
                id: Uuid::new_v4(),
                resource_type: self.resource_type,
                object_url: self.object_url,
                permission: self.permission,
                validity: self.validity,
                justification: self.justification,
            },
            reason: self.reason,
            profile_id: self.profile_id,
        }
    }
}

/// Named bundle of blueprint grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationProfile {
    pub id: ProfileId,
    pub name: String,
    pub blueprint_grants: BTreeSet<GrantId>,
}

impl AuthorizationProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            blueprint_grants: BTreeSet::new(),
        }
    }
}

/// An actor's membership of a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMembership {
    pub actor_id: ActorId,
    pub profile_id: ProfileId,
    pub validity: ValidityWindow,
}
