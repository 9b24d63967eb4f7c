//! Permission catalogue
//!
//! Permissions are registered explicitly once at process start through a
//! [`PermissionRegistryBuilder`] and frozen into an immutable
//! [`PermissionRegistry`]. Duplicate names fail the build; lookups of unknown
//! names are configuration errors.

pub mod builtin;

use crate::blueprint::BlueprintKind;
use crate::error::ConfigurationError;
use crate::types::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// A named permission and the resource type its policies apply to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique permission name (e.g., "cases:read")
    pub name: String,

    /// Human readable description
    pub description: String,

    /// Resource type the permission guards
    pub resource_type: ResourceType,
}

impl Permission {
    /// Blueprint variant that validates and evaluates policies for this permission
    pub fn blueprint_kind(&self) -> BlueprintKind {
        BlueprintKind::for_resource_type(self.resource_type)
    }
}

/// Collects registrations before the registry is frozen
#[derive(Debug, Default)]
pub struct PermissionRegistryBuilder {
    permissions: BTreeMap<String, Permission>,
}

impl PermissionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a permission; fails on a duplicate name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        resource_type: ResourceType,
    ) -> Result<&mut Self, ConfigurationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigurationError::Invalid(
                "Permission name cannot be empty".to_string(),
            ));
        }
        if self.permissions.contains_key(&name) {
            return Err(ConfigurationError::DuplicatePermission(name));
        }

        self.permissions.insert(
            name.clone(),
            Permission {
                name,
                description: description.into(),
                resource_type,
            },
        );
        Ok(self)
    }

    /// Freeze the registrations
    pub fn build(self) -> PermissionRegistry {
        info!("Permission registry built with {} permissions", self.permissions.len());
        PermissionRegistry {
            permissions: self.permissions,
        }
    }
}

/// Immutable permission catalogue, shared behind an `Arc`
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    permissions: BTreeMap<String, Permission>,
}

impl PermissionRegistry {
    pub fn builder() -> PermissionRegistryBuilder {
        PermissionRegistryBuilder::new()
    }

    /// Registry holding the built-in catalogue only
    pub fn with_defaults() -> Result<Self, ConfigurationError> {
        let mut builder = Self::builder();
        builtin::register_defaults(&mut builder)?;
        Ok(builder.build())
    }

    /// Look up a permission by name
    pub fn lookup(&self, name: &str) -> Result<&Permission, ConfigurationError> {
        self.permissions
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownPermission(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.permissions.contains_key(name)
    }

    /// Fail on the first name that is not registered
    pub fn ensure_known<'a, I>(&self, names: I) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        for name in names {
            self.lookup(name)?;
        }
        Ok(())
    }

    /// Permissions in name order
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut builder = PermissionRegistry::builder();
        builder
            .register("cases:read", "Read cases", ResourceType::Case)
            .unwrap()
            .register("reports:read", "Read reports", ResourceType::Report)
            .unwrap();
        let registry = builder.build();

        let permission = registry.lookup("cases:read").unwrap();
        assert_eq!(permission.resource_type, ResourceType::Case);
        assert_eq!(permission.blueprint_kind(), BlueprintKind::Object);
        assert_eq!(
            registry.lookup("reports:read").unwrap().blueprint_kind(),
            BlueprintKind::Report
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut builder = PermissionRegistry::builder();
        builder
            .register("cases:read", "Read cases", ResourceType::Case)
            .unwrap();
        let err = builder
            .register("cases:read", "Again", ResourceType::Document)
            .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicatePermission("cases:read".to_string()));
    }

    #[test]
    fn test_unknown_permission() {
        let registry = PermissionRegistry::builder().build();
        assert_eq!(
            registry.lookup("cases:read").unwrap_err(),
            ConfigurationError::UnknownPermission("cases:read".to_string())
        );

        let names = vec!["cases:read".to_string()];
        assert!(registry.ensure_known(&names).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut builder = PermissionRegistry::builder();
        assert!(builder.register("", "nothing", ResourceType::Case).is_err());
    }
}
