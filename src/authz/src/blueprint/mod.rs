//! Blueprints: attribute-based policy shapes
//!
//! Each resource type owns one blueprint. A blueprint validates a raw policy
//! payload into a typed policy at write time and lowers a typed policy into a
//! list of [`Condition`]s. Those conditions are the only matching logic in the
//! engine: the evaluator checks them against one resource, the query
//! predicate builder hands them to the listing backend.

pub mod object;
pub mod report;

pub use object::{ObjectBlueprint, ObjectPolicy};
pub use report::{ReportBlueprint, ReportPolicy};

use crate::confidentiality::ConfidentialityLevel;
use crate::error::PolicyValidationError;
use crate::types::{ResourceAttributes, ResourceType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Which blueprint validates and evaluates a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlueprintKind {
    /// Catalog + type identifier + maximum classification (cases, documents)
    Object,
    /// Set of type identifiers (stored search reports)
    Report,
}

impl BlueprintKind {
    pub fn for_resource_type(resource_type: ResourceType) -> Self {
        match resource_type {
            ResourceType::Case | ResourceType::Document => Self::Object,
            ResourceType::Report => Self::Report,
        }
    }

    /// Validate a raw payload with this blueprint
    pub fn validate(self, payload: &Value) -> Result<Policy, PolicyValidationError> {
        match self {
            Self::Object => ObjectBlueprint::validate(payload).map(Policy::Object),
            Self::Report => ReportBlueprint::validate(payload).map(Policy::Report),
        }
    }
}

/// Contract every blueprint implements
pub trait Blueprint {
    /// Typed policy produced by validation
    type Policy: Clone + Serialize + DeserializeOwned;

    /// Structural check of a raw payload against the blueprint's fields
    fn validate(payload: &Value) -> Result<Self::Policy, PolicyValidationError>;

    /// Lower a policy into the conditions a resource must satisfy
    fn conditions(policy: &Self::Policy) -> Vec<Condition>;

    /// True iff every condition of the policy holds for the resource
    fn matches(policy: &Self::Policy, attributes: &ResourceAttributes) -> bool {
        Self::conditions(policy)
            .iter()
            .all(|condition| condition.holds(attributes))
    }
}

/// One attribute test. Shared by single-resource evaluation and query predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    CatalogEquals(String),
    TypeIdentifierEquals(String),
    ClassificationAtMost(ConfidentialityLevel),
    TypeIdentifiersSubsetOf(BTreeSet<String>),
}

impl Condition {
    pub fn holds(&self, attributes: &ResourceAttributes) -> bool {
        match (self, attributes) {
            (Self::CatalogEquals(catalog), ResourceAttributes::Object(object)) => {
                object.catalog == *catalog
            }
            (Self::TypeIdentifierEquals(type_identifier), ResourceAttributes::Object(object)) => {
                object.type_identifier == *type_identifier
            }
            (Self::ClassificationAtMost(max), ResourceAttributes::Object(object)) => {
                object.classification.leq(*max)
            }
            (Self::TypeIdentifiersSubsetOf(allowed), ResourceAttributes::Report(report)) => {
                report.type_identifiers.is_subset(allowed)
            }
            // Condition shape does not apply to this kind of resource
            _ => false,
        }
    }
}

/// A validated policy payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "blueprint", rename_all = "snake_case")]
pub enum Policy {
    Object(ObjectPolicy),
    Report(ReportPolicy),
}

impl Policy {
    /// Validate a raw payload for a grant on `resource_type`
    pub fn validate_for(
        resource_type: ResourceType,
        payload: &Value,
    ) -> Result<Self, PolicyValidationError> {
        BlueprintKind::for_resource_type(resource_type).validate(payload)
    }

    pub fn kind(&self) -> BlueprintKind {
        match self {
            Self::Object(_) => BlueprintKind::Object,
            Self::Report(_) => BlueprintKind::Report,
        }
    }

    /// Fail unless this policy shape belongs to `resource_type`
    pub fn ensure_applies_to(&self, resource_type: ResourceType) -> Result<(), PolicyValidationError> {
        if self.kind() == BlueprintKind::for_resource_type(resource_type) {
            return Ok(());
        }
        let found = match self.kind() {
            BlueprintKind::Object => ResourceType::Case,
            BlueprintKind::Report => ResourceType::Report,
        };
        Err(PolicyValidationError::ResourceTypeMismatch {
            expected: resource_type,
            found,
        })
    }

    pub fn conditions(&self) -> Vec<Condition> {
        match self {
            Self::Object(policy) => ObjectBlueprint::conditions(policy),
            Self::Report(policy) => ReportBlueprint::conditions(policy),
        }
    }

    pub fn matches(&self, attributes: &ResourceAttributes) -> bool {
        match self {
            Self::Object(policy) => ObjectBlueprint::matches(policy, attributes),
            Self::Report(policy) => ReportBlueprint::matches(policy, attributes),
        }
    }
}

fn as_fields(payload: &Value) -> Result<&Map<String, Value>, PolicyValidationError> {
    payload
        .as_object()
        .ok_or_else(|| PolicyValidationError::Malformed("policy must be a JSON object".to_string()))
}

fn reject_unknown_fields(
    fields: &Map<String, Value>,
    known: &[&str],
) -> Result<(), PolicyValidationError> {
    match fields.keys().find(|key| !known.contains(&key.as_str())) {
        Some(key) => Err(PolicyValidationError::Malformed(format!("unknown field '{}'", key))),
        None => Ok(()),
    }
}

fn string_field<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, PolicyValidationError> {
    fields
        .get(name)
        .ok_or(PolicyValidationError::MissingField(name))?
        .as_str()
        .ok_or_else(|| PolicyValidationError::InvalidField {
            field: name,
            reason: "expected a string".to_string(),
        })
}
