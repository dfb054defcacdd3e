//! Record shapes: stored rows and incoming save/update requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One stored instance conforming to its template's parameter schema.
/// `attributes` is keyed by parameter name; attachment lists hold bare
/// filenames in storage and expanded URLs when returned to callers.
#[derive(Clone, Debug, Serialize)]
pub struct ResourceRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub user_id: i64,
    pub photos_names: Option<String>,
    pub document_names: Option<String>,
    pub attributes: HashMap<String, Value>,
}

/// Incoming record. Attachment lists always start empty; partial attribute
/// maps are permitted.
#[derive(Clone, Debug, Deserialize)]
pub struct RecordSaveRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

/// Partial update; absent fields are left untouched, and attachment lists
/// are never modified through this path.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub attributes: Option<HashMap<String, Value>>,
}
