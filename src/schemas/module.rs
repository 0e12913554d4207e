use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Module;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ModuleCreate {
    #[validate(length(min = 2, max = 20, message = "code must be 2-20 characters"))]
    pub(crate) code: String,
    #[validate(length(min = 2, max = 150, message = "name must be 2-150 characters"))]
    pub(crate) name: String,
    #[serde(alias = "academicYear", alias = "year")]
    #[validate(range(min = 1, max = 4, message = "academic_year must be between 1 and 4"))]
    pub(crate) academic_year: i32,
    #[validate(range(min = 1, max = 2, message = "semester must be 1 or 2"))]
    pub(crate) semester: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 60, message = "credits must be between 0 and 60"))]
    pub(crate) credits: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ModuleUpdate {
    #[serde(default)]
    #[validate(length(min = 2, max = 20, message = "code must be 2-20 characters"))]
    pub(crate) code: Option<String>,
    #[serde(default)]
    #[validate(length(min = 2, max = 150, message = "name must be 2-150 characters"))]
    pub(crate) name: Option<String>,
    #[serde(default, alias = "academicYear", alias = "year")]
    #[validate(range(min = 1, max = 4, message = "academic_year must be between 1 and 4"))]
    pub(crate) academic_year: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, max = 2, message = "semester must be 1 or 2"))]
    pub(crate) semester: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, max = 60, message = "credits must be between 0 and 60"))]
    pub(crate) credits: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModuleListQuery {
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default, alias = "year")]
    pub(crate) academic_year: Option<i32>,
    #[serde(default)]
    pub(crate) semester: Option<i32>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ModuleResponse {
    pub(crate) id: String,
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) academic_year: i32,
    pub(crate) semester: i32,
    pub(crate) credits: i32,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ModuleResponse {
    pub(crate) fn from_db(module: Module) -> Self {
        Self {
            id: module.id,
            code: module.code,
            name: module.name,
            academic_year: module.academic_year,
            semester: module.semester,
            credits: module.credits,
            created_by: module.created_by,
            created_at: format_primitive(module.created_at),
            updated_at: format_primitive(module.updated_at),
        }
    }
}

/// Module codes are compared and stored upper-case.
pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
