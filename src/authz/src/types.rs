//! Core authorization types

use crate::confidentiality::ConfidentialityLevel;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Actor identifier (login name of the end user)
pub type ActorId = String;

/// Grant identifier (blueprint or atomic)
pub type GrantId = uuid::Uuid;

/// Authorization profile identifier
pub type ProfileId = uuid::Uuid;

/// End user performing an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identifier (e.g., "alice")
    pub id: ActorId,

    /// Superusers bypass every check
    #[serde(default)]
    pub is_superuser: bool,
}

impl Actor {
    /// Create a regular actor
    pub fn new(id: impl Into<ActorId>) -> Self {
        Self {
            id: id.into(),
            is_superuser: false,
        }
    }

    /// Create a superuser actor
    pub fn superuser(id: impl Into<ActorId>) -> Self {
        Self {
            id: id.into(),
            is_superuser: true,
        }
    }
}

/// Kind of protected resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Case,
    Document,
    Report,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [Self::Case, Self::Document, Self::Report];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Case => "case",
            Self::Document => "document",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownResourceType(s.to_string()))
    }
}

/// Identity of a protected resource, without its attributes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,

    /// Exact resource URL in the upstream registry
    pub url: String,
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType, url: impl Into<String>) -> Self {
        Self {
            resource_type,
            url: url.into(),
        }
    }

    pub fn case(url: impl Into<String>) -> Self {
        Self::new(ResourceType::Case, url)
    }

    pub fn document(url: impl Into<String>) -> Self {
        Self::new(ResourceType::Document, url)
    }

    pub fn report(url: impl Into<String>) -> Self {
        Self::new(ResourceType::Report, url)
    }
}

/// Attributes of a case or document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttributes {
    /// Catalog the resource's type belongs to
    pub catalog: String,

    /// Type identifier within the catalog (e.g., "permit")
    pub type_identifier: String,

    pub classification: ConfidentialityLevel,
}

impl ObjectAttributes {
    pub fn new(
        catalog: impl Into<String>,
        type_identifier: impl Into<String>,
        classification: ConfidentialityLevel,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            type_identifier: type_identifier.into(),
            classification,
        }
    }
}

/// Attributes of a stored search report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAttributes {
    /// Type identifiers the report's query yields
    pub type_identifiers: BTreeSet<String>,
}

impl ReportAttributes {
    pub fn new<I, S>(type_identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_identifiers: type_identifiers.into_iter().map(Into::into).collect(),
        }
    }
}

/// Resolved attributes of a protected resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceAttributes {
    Object(ObjectAttributes),
    Report(ReportAttributes),
}

impl From<ObjectAttributes> for ResourceAttributes {
    fn from(attributes: ObjectAttributes) -> Self {
        Self::Object(attributes)
    }
}

impl From<ReportAttributes> for ResourceAttributes {
    fn from(attributes: ReportAttributes) -> Self {
        Self::Report(attributes)
    }
}

/// A protected resource together with its resolved attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(flatten)]
    pub reference: ResourceRef,

    pub attributes: ResourceAttributes,
}

impl Resource {
    pub fn new(reference: ResourceRef, attributes: impl Into<ResourceAttributes>) -> Self {
        Self {
            reference,
            attributes: attributes.into(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.reference.resource_type
    }

    pub fn url(&self) -> &str {
        &self.reference.url
    }
}
