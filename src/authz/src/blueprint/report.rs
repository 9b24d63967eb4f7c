//! Report blueprint for stored search definitions

use super::{as_fields, reject_unknown_fields, Blueprint, Condition};
use crate::error::PolicyValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Policy listing the type identifiers a report may cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPolicy {
    pub type_identifiers: BTreeSet<String>,
}

impl ReportPolicy {
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

/// Blueprint for [`ReportPolicy`]. A report matches when every type identifier
/// its query yields is listed in the policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBlueprint;

impl Blueprint for ReportBlueprint {
    type Policy = ReportPolicy;

    fn validate(payload: &Value) -> Result<ReportPolicy, PolicyValidationError> {
        let fields = as_fields(payload)?;
        reject_unknown_fields(fields, &["typeIdentifiers"])?;

        let entries = fields
            .get("typeIdentifiers")
            .ok_or(PolicyValidationError::MissingField("typeIdentifiers"))?
            .as_array()
            .ok_or_else(|| PolicyValidationError::InvalidField {
                field: "typeIdentifiers",
                reason: "expected a list of strings".to_string(),
            })?;

        let mut type_identifiers = BTreeSet::new();
        for entry in entries {
            match entry.as_str() {
                Some(identifier) if !identifier.is_empty() => {
                    type_identifiers.insert(identifier.to_string());
                }
                _ => {
                    return Err(PolicyValidationError::InvalidField {
                        field: "typeIdentifiers",
                        reason: format!("expected a non-empty string, got {}", entry),
                    })
                }
            }
        }

        Ok(ReportPolicy { type_identifiers })
    }

    fn conditions(policy: &ReportPolicy) -> Vec<Condition> {
        vec![Condition::TypeIdentifiersSubsetOf(policy.type_identifiers.clone())]
    }
}
