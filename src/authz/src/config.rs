//! Configuration loading and validation

use crate::error::ConfigurationError;
use crate::grant::{InMemoryGrantStore, NewBlueprintGrant, Role, ValidityWindow};
use crate::permission::{builtin, PermissionRegistry};
use crate::types::ResourceType;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Path used when `CASEGATE_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "casegate.toml";

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthzConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    /// Registered on top of the built-in catalogue
    #[serde(default)]
    pub permissions: Vec<PermissionSection>,

    /// Seed roles (memory backend)
    #[serde(default)]
    pub roles: Vec<RoleSection>,

    /// Seed profiles with their members and grants (memory backend)
    #[serde(default)]
    pub profiles: Vec<ProfileSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermissionSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoleSection {
    pub name: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileSection {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub grants: Vec<GrantSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GrantSection {
    pub role: String,
    pub resource_type: ResourceType,
    /// Raw blueprint payload, validated against the resource type's blueprint
    pub policy: serde_json::Value,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_metrics_port() -> u16 { 9090 }
fn default_log_level() -> String { "info".to_string() }

impl AuthzConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read configuration file {}", path.as_ref().display()))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AuthzConfig = toml::from_str(contents)
            .context("Failed to parse configuration file")?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `CASEGATE_CONFIG` (or defaults when no file exists), then apply `PORT` and `DATABASE_URL`
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("CASEGATE_CONFIG").ok();
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH)?,
            None => Self::default(),
        };

        config.apply_overrides(std::env::var("PORT").ok(), std::env::var("DATABASE_URL").ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides
    pub fn apply_overrides(&mut self, port: Option<String>, database_url: Option<String>) -> Result<()> {
        if let Some(port) = port {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }
        if let Some(url) = database_url {
            self.storage.database_url = Some(url);
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == self.server.metrics_port {
            anyhow::bail!("Server port and metrics port must differ");
        }

        if self.storage.backend == StorageBackend::Postgres && self.storage.database_url.is_none() {
            anyhow::bail!("Postgres storage requires storage.database_url");
        }

        let registry = self.build_registry()?;

        let mut role_names = HashSet::new();
        for role in &self.roles {
            Role::new(&role.name, &role.permissions)
                .validate(&registry)
                .with_context(|| format!("Invalid role '{}'", role.name))?;
            if !role_names.insert(role.name.as_str()) {
                anyhow::bail!("Role '{}' is defined twice", role.name);
            }
        }

        for profile in &self.profiles {
            for grant in &profile.grants {
                if !role_names.contains(grant.role.as_str()) {
                    return Err(ConfigurationError::UnknownRole(grant.role.clone()))
                        .with_context(|| format!("Invalid grant in profile '{}'", profile.name));
                }
                crate::blueprint::Policy::validate_for(grant.resource_type, &grant.policy)
                    .with_context(|| format!("Invalid policy in profile '{}'", profile.name))?;
            }
        }

        Ok(())
    }

    /// Built-in catalogue plus configured permissions
    pub fn build_registry(&self) -> std::result::Result<PermissionRegistry, ConfigurationError> {
        let mut builder = PermissionRegistry::builder();
        builtin::register_defaults(&mut builder)?;
        for permission in &self.permissions {
            builder.register(&permission.name, &permission.description, permission.resource_type)?;
        }
        Ok(builder.build())
    }

    /// Load roles, profiles, grants and memberships into a memory store; all open ended from `at`
    pub async fn seed(&self, store: &InMemoryGrantStore, at: DateTime<Utc>) -> crate::error::Result<()> {
        let validity = ValidityWindow::starting(at);

        for role in &self.roles {
            store.put_role(Role::new(&role.name, &role.permissions)).await?;
        }

        for profile in &self.profiles {
            let profile_id = store.create_profile(&profile.name).await;

            for grant in &profile.grants {
                let grant_id = store
                    .add_blueprint_grant(NewBlueprintGrant {
                        role: grant.role.clone(),
                        resource_type: grant.resource_type,
                        policy: grant.policy.clone(),
                        validity,
                    })
                    .await?;
                store.add_grant_to_profile(profile_id, grant_id).await?;
            }

            for member in &profile.members {
                store.add_member(member, profile_id, validity).await?;
            }

            info!(
                "Seeded profile '{}' with {} grants and {} members",
                profile.name,
                profile.grants.len(),
                profile.members.len()
            );
        }

        Ok(())
    }
}
