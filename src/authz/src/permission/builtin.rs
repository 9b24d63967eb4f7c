//! Built-in permission catalogue

use super::PermissionRegistryBuilder;
use crate::error::ConfigurationError;
use crate::types::ResourceType;

pub const CASES_READ: &str = "cases:read";
pub const CASES_UPDATE: &str = "cases:update";
pub const CASES_CLOSE: &str = "cases:close";
pub const CASES_MANAGE_ACCESS: &str = "cases:manage-access";
pub const CASES_REQUEST_ACCESS: &str = "cases:request-access";
pub const CASES_ADD_DOCUMENTS: &str = "cases:add-documents";
pub const CASES_DOWNLOAD_DOCUMENTS: &str = "cases:download-documents";
pub const ACTIVITIES_READ: &str = "activities:read";
pub const ACTIVITIES_WRITE: &str = "activities:write";
pub const CHECKLISTS_READ: &str = "checklists:read";
pub const CHECKLISTS_WRITE: &str = "checklists:write";
pub const CASE_PROCESS_PERFORM_TASKS: &str = "case-process:perform-tasks";
pub const DOCUMENTS_READ: &str = "documents:read";
pub const DOCUMENTS_UPDATE: &str = "documents:update";
pub const DOCUMENTS_LOCK: &str = "documents:lock";
pub const REPORTS_READ: &str = "reports:read";

const DEFAULTS: &[(&str, &str, ResourceType)] = &[
    (CASES_READ, "Can read cases and their details", ResourceType::Case),
    (CASES_UPDATE, "Can update case attributes", ResourceType::Case),
    (CASES_CLOSE, "Can set the result of a case and close it", ResourceType::Case),
    (CASES_MANAGE_ACCESS, "Can grant other users access to a case", ResourceType::Case),
    (CASES_REQUEST_ACCESS, "Can request access to a case", ResourceType::Case),
    (CASES_ADD_DOCUMENTS, "Can add documents to a case", ResourceType::Case),
    (CASES_DOWNLOAD_DOCUMENTS, "Can download the documents of a case", ResourceType::Case),
    (ACTIVITIES_READ, "Can read the activities of a case", ResourceType::Case),
    (ACTIVITIES_WRITE, "Can create and close activities on a case", ResourceType::Case),
    (CHECKLISTS_READ, "Can read the checklist of a case", ResourceType::Case),
    (CHECKLISTS_WRITE, "Can fill in the checklist of a case", ResourceType::Case),
    (CASE_PROCESS_PERFORM_TASKS, "Can perform process tasks of a case", ResourceType::Case),
    (DOCUMENTS_READ, "Can read documents", ResourceType::Document),
    (DOCUMENTS_UPDATE, "Can update document contents and metadata", ResourceType::Document),
    (DOCUMENTS_LOCK, "Can lock and unlock documents for editing", ResourceType::Document),
    (REPORTS_READ, "Can read stored search reports", ResourceType::Report),
];

/// Register every built-in permission
pub fn register_defaults(builder: &mut PermissionRegistryBuilder) -> Result<(), ConfigurationError> {
    for (name, description, resource_type) in DEFAULTS {
        builder.register(*name, *description, *resource_type)?;
    }
    Ok(())
}
