//! Object blueprint for cases and documents

use super::{as_fields, reject_unknown_fields, string_field, Blueprint, Condition};
use crate::confidentiality::ConfidentialityLevel;
use crate::error::PolicyValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Policy over catalog, type identifier and classification.
/// Empty `catalog` or `type_identifier` matches any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPolicy {
    pub catalog: String,
    pub type_identifier: String,
    pub max_classification: ConfidentialityLevel,
}

impl ObjectPolicy {
    pub fn new(
        catalog: impl Into<String>,
        type_identifier: impl Into<String>,
        max_classification: ConfidentialityLevel,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            type_identifier: type_identifier.into(),
            max_classification,
        }
    }
}

/// Blueprint for [`ObjectPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectBlueprint;

impl Blueprint for ObjectBlueprint {
    type Policy = ObjectPolicy;

    fn validate(payload: &Value) -> Result<ObjectPolicy, PolicyValidationError> {
        let fields = as_fields(payload)?;
        reject_unknown_fields(fields, &["catalog", "typeIdentifier", "maxClassification"])?;

        let catalog = string_field(fields, "catalog")?;
        let type_identifier = string_field(fields, "typeIdentifier")?;
        let max_classification = string_field(fields, "maxClassification")?
            .parse::<ConfidentialityLevel>()
            .map_err(|e| PolicyValidationError::InvalidField {
                field: "maxClassification",
                reason: e.to_string(),
            })?;

        Ok(ObjectPolicy::new(catalog, type_identifier, max_classification))
    }

    fn conditions(policy: &ObjectPolicy) -> Vec<Condition> {
        let mut conditions = Vec::with_capacity(3);
        if !policy.catalog.is_empty() {
            conditions.push(Condition::CatalogEquals(policy.catalog.clone()));
        }
        if !policy.type_identifier.is_empty() {
            conditions.push(Condition::TypeIdentifierEquals(policy.type_identifier.clone()));
        }
        conditions.push(Condition::ClassificationAtMost(policy.max_classification));
        conditions
    }
}
