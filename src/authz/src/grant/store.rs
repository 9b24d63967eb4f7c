//! Grant storage
//!
//! The read path returns only grants valid at the requested instant, filtered
//! in bulk. Writes validate before anything is stored.

use super::{
    ActorAtomicGrant, AuthorizationProfile, BlueprintGrant, NewAtomicGrant, NewBlueprintGrant,
    ProfileMembership, Role, ValidityWindow,
};
use crate::blueprint::Policy;
use crate::error::{AuthzError, ConfigurationError, Result};
use crate::permission::PermissionRegistry;
use crate::types::{Actor, ActorId, GrantId, ProfileId, ResourceType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Narrows blueprint grant reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantFilter {
    /// Only grants whose role contains this permission
    pub permission: Option<String>,

    /// Only grants for this resource type
    pub resource_type: Option<ResourceType>,
}

impl GrantFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn accepts(&self, grant: &BlueprintGrant) -> bool {
        self.permission
            .as_deref()
            .map_or(true, |permission| grant.role.contains(permission))
            && self
                .resource_type
                .map_or(true, |resource_type| grant.resource_type == resource_type)
    }
}

/// Narrows atomic grant reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicGrantFilter {
    pub permission: Option<String>,
    pub resource_type: Option<ResourceType>,

    /// Exact object URL match
    pub object_url: Option<String>,
}

impl AtomicGrantFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn object_url(mut self, object_url: impl Into<String>) -> Self {
        self.object_url = Some(object_url.into());
        self
    }

    pub fn accepts(&self, grant: &ActorAtomicGrant) -> bool {
        let atomic = &grant.grant;
        self.permission
            .as_deref()
            .map_or(true, |permission| atomic.permission == permission)
            && self
                .resource_type
                .map_or(true, |resource_type| atomic.resource_type == resource_type)
            && self
                .object_url
                .as_deref()
                .map_or(true, |url| atomic.object_url == url)
    }
}

/// Read path over persisted grants
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Blueprint grants reachable through the actor's profile memberships,
    /// valid at `at`, deduplicated, narrowed by `filter`
    async fn blueprint_grants_for(
        &self,
        actor: &Actor,
        filter: &GrantFilter,
        at: DateTime<Utc>,
    ) -> Result<Vec<BlueprintGrant>>;

    /// The actor's atomic grants valid at `at`, narrowed by `filter`
    async fn atomic_grants_for(
        &self,
        actor: &Actor,
        filter: &AtomicGrantFilter,
        at: DateTime<Utc>,
    ) -> Result<Vec<ActorAtomicGrant>>;

    /// Profiles the actor is a member of at `at`
    async fn profiles_for(&self, actor: &Actor, at: DateTime<Utc>) -> Result<Vec<ProfileId>>;
}

/// Blueprint grant as persisted: the role is referenced by name
#[derive(Debug, Clone)]
struct StoredBlueprintGrant {
    id: GrantId,
    role: String,
    resource_type: ResourceType,
    policy: Policy,
    validity: ValidityWindow,
}

#[derive(Debug, Default)]
struct StoreState {
    roles: HashMap<String, Role>,
    blueprint_grants: HashMap<GrantId, StoredBlueprintGrant>,
    profiles: HashMap<ProfileId, AuthorizationProfile>,
    memberships: Vec<ProfileMembership>,
    atomic_grants: Vec<ActorAtomicGrant>,
}

impl StoreState {
    fn active_profiles<'a>(
        &'a self,
        actor_id: &'a str,
        at: DateTime<Utc>,
    ) -> impl Iterator<Item = ProfileId> + 'a {
        self.memberships
            .iter()
            .filter(move |m| m.actor_id == actor_id && m.validity.contains(at))
            .map(|m| m.profile_id)
    }
}

/// In-memory grant store
pub struct InMemoryGrantStore {
    registry: Arc<PermissionRegistry>,
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryGrantStore {
    /// Create an empty store; writes are validated against `registry`
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self {
            registry,
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Create or replace a role. Existing grants observe the new permission set.
    pub async fn put_role(&self, role: Role) -> Result<()> {
        role.validate(&self.registry)?;
        info!("Storing role '{}' with {} permissions", role.name, role.permissions.len());

        let mut state = self.state.write().await;
        state.roles.insert(role.name.clone(), role);
        Ok(())
    }

    /// Validate and store a blueprint grant
    pub async fn add_blueprint_grant(&self, grant: NewBlueprintGrant) -> Result<GrantId> {
        let policy = grant.validate_policy()?;

        let mut state = self.state.write().await;
        if !state.roles.contains_key(&grant.role) {
            return Err(ConfigurationError::UnknownRole(grant.role).into());
        }

        let id = Uuid::new_v4();
        info!(
            "Storing blueprint grant {} (role={}, resource_type={})",
            id, grant.role, grant.resource_type
        );
        state.blueprint_grants.insert(
            id,
            StoredBlueprintGrant {
                id,
                role: grant.role,
                resource_type: grant.resource_type,
                policy,
                validity: grant.validity,
            },
        );
        Ok(id)
    }

    /// Change a blueprint grant's validity window, the only mutable part of a grant
    pub async fn set_blueprint_validity(&self, id: GrantId, validity: ValidityWindow) -> Result<()> {
        let mut state = self.state.write().await;
        let grant = state
            .blueprint_grants
            .get_mut(&id)
            .ok_or_else(|| AuthzError::NotFound(format!("blueprint grant {}", id)))?;
        grant.validity = validity;
        Ok(())
    }

    pub async fn create_profile(&self, name: impl Into<String>) -> ProfileId {
        let profile = AuthorizationProfile::new(name);
        let id = profile.id;

        let mut state = self.state.write().await;
        state.profiles.insert(id, profile);
        id
    }

    /// Bundle an existing blueprint grant into a profile
    pub async fn add_grant_to_profile(&self, profile_id: ProfileId, grant_id: GrantId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.blueprint_grants.contains_key(&grant_id) {
            return Err(AuthzError::NotFound(format!("blueprint grant {}", grant_id)));
        }
        let profile = state
            .profiles
            .get_mut(&profile_id)
            .ok_or_else(|| AuthzError::NotFound(format!("profile {}", profile_id)))?;
        profile.blueprint_grants.insert(grant_id);
        Ok(())
    }

    pub async fn add_member(
        &self,
        actor_id: impl Into<ActorId>,
        profile_id: ProfileId,
        validity: ValidityWindow,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.profiles.contains_key(&profile_id) {
            return Err(AuthzError::NotFound(format!("profile {}", profile_id)));
        }
        state.memberships.push(ProfileMembership {
            actor_id: actor_id.into(),
            profile_id,
            validity,
        });
        Ok(())
    }

    /// Validate and store an actor's atomic grant
    pub async fn add_atomic_grant(&self, grant: NewAtomicGrant) -> Result<Uuid> {
        grant.validate(&self.registry)?;
        let grant = grant.into_grant();
        let id = grant.id;
        info!(
            "Storing atomic grant {} ({} on {} for {}, reason: {})",
            id, grant.grant.permission, grant.grant.object_url, grant.actor_id, grant.reason
        );

        let mut state = self.state.write().await;
        state.atomic_grants.push(grant);
        Ok(id)
    }

    /// Change the validity window of an actor's atomic grant
    pub async fn set_atomic_validity(&self, id: Uuid, validity: ValidityWindow) -> Result<()> {
        let mut state = self.state.write().await;
        let grant = state
            .atomic_grants
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| AuthzError::NotFound(format!("atomic grant {}", id)))?;
        grant.grant.validity = validity;
        Ok(())
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn blueprint_grants_for(
        &self,
        actor: &Actor,
        filter: &GrantFilter,
        at: DateTime<Utc>,
    ) -> Result<Vec<BlueprintGrant>> {
        let state = self.state.read().await;

        let grant_ids: BTreeSet<GrantId> = state
            .active_profiles(&actor.id, at)
            .filter_map(|profile_id| state.profiles.get(&profile_id))
            .flat_map(|profile| profile.blueprint_grants.iter().copied())
            .collect();

        let grants: Vec<BlueprintGrant> = grant_ids
            .iter()
            .filter_map(|id| state.blueprint_grants.get(id))
            .filter(|stored| stored.validity.contains(at))
            .filter_map(|stored| {
                let role = state.roles.get(&stored.role)?;
                Some(BlueprintGrant {
                    id: stored.id,
                    role: role.clone(),
                    resource_type: stored.resource_type,
                    policy: stored.policy.clone(),
                    validity: stored.validity,
                })
            })
            .filter(|grant| filter.accepts(grant))
            .collect();

        debug!("{} blueprint grants for actor {}", grants.len(), actor.id);
        Ok(grants)
    }

    async fn atomic_grants_for(
        &self,
        actor: &Actor,
        filter: &AtomicGrantFilter,
        at: DateTime<Utc>,
    ) -> Result<Vec<ActorAtomicGrant>> {
        let state = self.state.read().await;

        let grants: Vec<ActorAtomicGrant> = state
            .atomic_grants
            .iter()
            .filter(|g| g.actor_id == actor.id && g.grant.is_valid_at(at) && filter.accepts(g))
            .cloned()
            .collect();

        debug!("{} atomic grants for actor {}", grants.len(), actor.id);
        Ok(grants)
    }

    async fn profiles_for(&self, actor: &Actor, at: DateTime<Utc>) -> Result<Vec<ProfileId>> {
        let state = self.state.read().await;
        let profiles: BTreeSet<ProfileId> = state.active_profiles(&actor.id, at).collect();
        Ok(profiles.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::GrantReason;
    use crate::permission::builtin::{CASES_READ, CASES_UPDATE};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn store() -> InMemoryGrantStore {
        InMemoryGrantStore::new(Arc::new(PermissionRegistry::with_defaults().unwrap()))
    }

    fn case_grant(role: &str) -> NewBlueprintGrant {
        NewBlueprintGrant {
            role: role.to_string(),
            resource_type: ResourceType::Case,
            policy: json!({"catalog": "ACME", "typeIdentifier": "", "maxClassification": "internal"}),
            validity: ValidityWindow::starting(now() - Duration::days(1)),
        }
    }

    #[tokio::test]
    async fn test_grant_requires_existing_role() {
        let store = store();
        let err = store.add_blueprint_grant(case_grant("reader")).await.unwrap_err();
        assert!(matches!(
            err,
            AuthzError::Configuration(ConfigurationError::UnknownRole(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_policy_is_never_stored() {
        let store = store();
        store.put_role(Role::new("reader", [CASES_READ])).await.unwrap();

        let mut grant = case_grant("reader");
        grant.policy = json!({"catalog": "ACME"});
        let err = store.add_blueprint_grant(grant).await.unwrap_err();
        assert!(matches!(err, AuthzError::PolicyValidation(_)));
        assert!(store.state.read().await.blueprint_grants.is_empty());
    }

    #[tokio::test]
    async fn test_grants_reach_actor_through_profiles() {
        let store = store();
        store.put_role(Role::new("reader", [CASES_READ])).await.unwrap();
        let grant_id = store.add_blueprint_grant(case_grant("reader")).await.unwrap();

        let first = store.create_profile("acme readers").await;
        let second = store.create_profile("acme overlap").await;
        store.add_grant_to_profile(first, grant_id).await.unwrap();
        store.add_grant_to_profile(second, grant_id).await.unwrap();
        let window = ValidityWindow::starting(now() - Duration::days(1));
        store.add_member("alice", first, window).await.unwrap();
        store.add_member("alice", second, window).await.unwrap();

        let alice = Actor::new("alice");
        let grants = store
            .blueprint_grants_for(&alice, &GrantFilter::new(), now())
            .await
            .unwrap();
        assert_eq!(grants.len(), 1, "grant shared by two profiles is returned once");

        let bob = Actor::new("bob");
        assert!(store
            .blueprint_grants_for(&bob, &GrantFilter::new(), now())
            .await
            .unwrap()
            .is_empty());

        assert_eq!(store.profiles_for(&alice, now()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_role_changes_are_observed() {
        let store = store();
        store.put_role(Role::new("reader", [CASES_READ])).await.unwrap();
        let grant_id = store.add_blueprint_grant(case_grant("reader")).await.unwrap();
        let profile = store.create_profile("p").await;
        store.add_grant_to_profile(profile, grant_id).await.unwrap();
        store
            .add_member("alice", profile, ValidityWindow::starting(now() - Duration::days(1)))
            .await
            .unwrap();

        let alice = Actor::new("alice");
        let update = GrantFilter::new().permission(CASES_UPDATE);
        assert!(store.blueprint_grants_for(&alice, &update, now()).await.unwrap().is_empty());

        store
            .put_role(Role::new("reader", [CASES_READ, CASES_UPDATE]))
            .await
            .unwrap();
        assert_eq!(store.blueprint_grants_for(&alice, &update, now()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_membership_and_grant_are_hidden() {
        let store = store();
        store.put_role(Role::new("reader", [CASES_READ])).await.unwrap();
        let grant_id = store.add_blueprint_grant(case_grant("reader")).await.unwrap();
        let profile = store.create_profile("p").await;
        store.add_grant_to_profile(profile, grant_id).await.unwrap();

        let expired = ValidityWindow::new(now() - Duration::days(10), Some(now() - Duration::days(1))).unwrap();
        store.add_member("alice", profile, expired).await.unwrap();

        let alice = Actor::new("alice");
        assert!(store
            .blueprint_grants_for(&alice, &GrantFilter::new(), now())
            .await
            .unwrap()
            .is_empty());

        store
            .add_member("alice", profile, ValidityWindow::starting(now() - Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(
            store.blueprint_grants_for(&alice, &GrantFilter::new(), now()).await.unwrap().len(),
            1
        );

        store.set_blueprint_validity(grant_id, expired).await.unwrap();
        assert!(store
            .blueprint_grants_for(&alice, &GrantFilter::new(), now())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_atomic_grant_filters() {
        let store = store();
        let url = "https://cases.example.com/cases/1";
        let id = store
            .add_atomic_grant(NewAtomicGrant {
                actor_id: "alice".to_string(),
                resource_type: ResourceType::Case,
                object_url: url.to_string(),
                permission: CASES_READ.to_string(),
                validity: ValidityWindow::starting(now() - Duration::hours(1)),
                reason: GrantReason::AccessRequest,
                justification: Some("needs to review".to_string()),
                profile_id: None,
            })
            .await
            .unwrap();

        let alice = Actor::new("alice");
        let exact = AtomicGrantFilter::new().permission(CASES_READ).object_url(url);
        assert_eq!(store.atomic_grants_for(&alice, &exact, now()).await.unwrap().len(), 1);

        let other_url = AtomicGrantFilter::new().object_url("https://cases.example.com/cases/2");
        assert!(store.atomic_grants_for(&alice, &other_url, now()).await.unwrap().is_empty());

        store
            .set_atomic_validity(
                id,
                ValidityWindow::new(now() - Duration::days(2), Some(now() - Duration::days(1))).unwrap(),
            )
            .await
            .unwrap();
        assert!(store.atomic_grants_for(&alice, &exact, now()).await.unwrap().is_empty());
    }
}
