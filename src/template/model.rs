//! Template and parameter catalog rows.

use crate::naming::ParameterType;
use serde::{Deserialize, Serialize};

/// One user-defined record schema and the physical table backing it.
/// Unpublished templates accept schema edits and reject record operations;
/// publishing inverts both.
#[derive(Clone, Debug, Serialize)]
pub struct ResourceTemplate {
    pub id: i64,
    pub name: String,
    /// Derived physical table name; immutable once records exist.
    pub table_name: String,
    pub description: Option<String>,
    pub user_id: i64,
    pub is_published: bool,
}

/// One typed, named attribute declared on a template.
#[derive(Clone, Debug, Serialize)]
pub struct ResourceParameter {
    pub id: i64,
    pub template_id: i64,
    pub name: String,
    /// Physical column name derived from `name`.
    pub column_name: String,
    pub param_type: ParameterType,
    /// Optional regular expression constraining text values.
    pub pattern: Option<String>,
}

/// Incoming parameter definition.
#[derive(Clone, Debug, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub param_type: ParameterType,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Partial template update; absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub description: Option<String>,
}
