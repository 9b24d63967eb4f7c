//! # Casegate Authorization Engine
//!
//! Attribute-based authorization for case-management: decides whether an
//! actor may exercise a named permission on a case, document or report, or on
//! any such object at all, and builds query predicates that prefilter whole
//! listings consistently with those decisions.
//!
//! ## Features
//!
//! - **Blueprint grants**: a role plus an attribute policy (catalog, type
//!   identifier, maximum confidentiality), reached through profile membership
//! - **Atomic grants**: one permission on one exact object URL
//! - **Validity windows** on grants and memberships, evaluated against an
//!   injectable clock
//! - **Query predicates** built from the same matching conditions as checks
//! - **Async-first design** using Tokio runtime
//! - **PostgreSQL grant store** behind the `postgres` feature
//!
//! ## Example
//!
//! ```rust
//! use casegate_authz::{
//!     Actor, Evaluator, EvaluatorConfig, InMemoryGrantStore, InMemoryResourceDirectory,
//!     NewBlueprintGrant, PermissionRegistry, ResourceRef, ResourceType, Role, ValidityWindow,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(PermissionRegistry::with_defaults()?);
//!     let grants = Arc::new(InMemoryGrantStore::new(registry.clone()));
//!     let resources = Arc::new(InMemoryResourceDirectory::new());
//!
//!     grants.put_role(Role::new("reader", ["cases:read"])).await?;
//!     let grant = grants
//!         .add_blueprint_grant(NewBlueprintGrant {
//!             role: "reader".to_string(),
//!             resource_type: ResourceType::Case,
//!             policy: serde_json::json!({
//!                 "catalog": "", "typeIdentifier": "", "maxClassification": "internal"
//!             }),
//!             validity: ValidityWindow::starting(chrono::Utc::now()),
//!         })
//!         .await?;
//!     let profile = grants.create_profile("readers").await;
//!     grants.add_grant_to_profile(profile, grant).await?;
//!     grants
//!         .add_member("alice", profile, ValidityWindow::starting(chrono::Utc::now()))
//!         .await?;
//!
//!     let evaluator = Evaluator::new(EvaluatorConfig::default(), registry, grants, resources);
//!     let allowed = evaluator
//!         .allowed(&Actor::new("alice"), "cases:read", None)
//!         .await?;
//!
//!     if allowed {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod access_request;
pub mod blueprint;
pub mod clock;
pub mod confidentiality;
pub mod config;
pub mod engine;
pub mod error;
pub mod grant;
pub mod permission;
pub mod predicate;
pub mod resolver;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use access_request::{AccessRequest, AccessRequestSource, InMemoryAccessRequests, NoAccessRequests};
pub use blueprint::{Blueprint, BlueprintKind, Condition, ObjectBlueprint, ObjectPolicy, Policy, ReportBlueprint, ReportPolicy};
pub use clock::{Clock, FixedClock, SystemClock};
pub use confidentiality::ConfidentialityLevel;
pub use config::AuthzConfig;
pub use engine::{Decision, DecisionSource, DenialDetail, Evaluator, EvaluatorConfig};
pub use error::{AuthzError, ConfigurationError, LookupError, PolicyValidationError, Result};
pub use grant::{
    ActorAtomicGrant, AtomicGrant, AuthorizationProfile, BlueprintGrant, GrantReason, GrantStore,
    InMemoryGrantStore, NewAtomicGrant, NewBlueprintGrant, Role, ValidityWindow,
};
pub use permission::{Permission, PermissionRegistry};
pub use predicate::{Predicate, QueryPredicateBuilder};
pub use resolver::{InMemoryResourceDirectory, NoResolver, ResourceAttributeResolver};
pub use types::{Actor, ObjectAttributes, ReportAttributes, Resource, ResourceAttributes, ResourceRef, ResourceType};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
