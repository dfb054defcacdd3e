//! Physical identifier derivation and the safe-identifier allow-list, plus
//! the declared-type to storage-type mapping.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// PostgreSQL truncates identifiers beyond this length.
const MAX_IDENT_LEN: usize = 63;

/// Derive a deterministic physical table or column name from a user-supplied
/// display name: lowercase, runs of non-alphanumerics collapse to a single
/// underscore, leading/trailing underscores trimmed, `t_` prefixed when the
/// result would start with a digit.
pub fn physical_name(display_name: &str) -> EngineResult<String> {
    let mut out = String::with_capacity(display_name.len());
    let mut last_was_sep = true;
    for c in display_name.chars() {
        if c.is_ascii_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() {
        return Err(EngineError::BadRequest(format!(
            "cannot derive an identifier from '{}'",
            display_name
        )));
    }
    let mut out = if out.as_bytes()[0].is_ascii_digit() {
        format!("t_{}", out)
    } else {
        out
    };
    out.truncate(MAX_IDENT_LEN);
    let out = out.trim_end_matches('_').to_string();
    ensure_safe_ident(&out)?;
    Ok(out)
}

/// Reject identifiers outside `[a-z_][a-z0-9_]*` before they reach SQL text.
/// Every runtime-chosen table/column name passes through here.
pub fn ensure_safe_ident(ident: &str) -> EngineResult<()> {
    let ok = !ident.is_empty()
        && ident.len() <= MAX_IDENT_LEN
        && ident
            .bytes()
            .next()
            .map(|b| b == b'_' || b.is_ascii_lowercase())
            .unwrap_or(false)
        && ident
            .bytes()
            .all(|b| b == b'_' || b.is_ascii_lowercase() || b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(EngineError::BadRequest(format!(
            "unsafe identifier: '{}'",
            ident
        )))
    }
}

/// Declared parameter types. The set is closed; each variant maps to exactly
/// one storage column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ParameterType {
    ShortText,
    LongText,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Photo,
    Document,
    Relation { template_id: i64 },
}

impl ParameterType {
    /// Storage column type for the declared type. Attachment types hold a
    /// comma-delimited filename list; relations hold the referenced record
    /// id with no database-level foreign key.
    pub fn column_type(&self) -> &'static str {
        match self {
            ParameterType::ShortText => "VARCHAR(255)",
            ParameterType::LongText => "TEXT",
            ParameterType::Integer => "BIGINT",
            ParameterType::Decimal => "DOUBLE PRECISION",
            ParameterType::Boolean => "BOOLEAN",
            ParameterType::DateTime => "TIMESTAMPTZ",
            ParameterType::Photo | ParameterType::Document => "TEXT",
            ParameterType::Relation { .. } => "BIGINT",
        }
    }

    /// Tag persisted in the parameter catalog.
    pub fn tag(&self) -> &'static str {
        match self {
            ParameterType::ShortText => "short_text",
            ParameterType::LongText => "long_text",
            ParameterType::Integer => "integer",
            ParameterType::Decimal => "decimal",
            ParameterType::Boolean => "boolean",
            ParameterType::DateTime => "date_time",
            ParameterType::Photo => "photo",
            ParameterType::Document => "document",
            ParameterType::Relation { .. } => "relation",
        }
    }

    /// Rebuild from the catalog tag and optional related template id.
    pub fn from_tag(tag: &str, related_template_id: Option<i64>) -> EngineResult<Self> {
        Ok(match (tag, related_template_id) {
            ("short_text", _) => ParameterType::ShortText,
            ("long_text", _) => ParameterType::LongText,
            ("integer", _) => ParameterType::Integer,
            ("decimal", _) => ParameterType::Decimal,
            ("boolean", _) => ParameterType::Boolean,
            ("date_time", _) => ParameterType::DateTime,
            ("photo", _) => ParameterType::Photo,
            ("document", _) => ParameterType::Document,
            ("relation", Some(template_id)) => ParameterType::Relation { template_id },
            _ => {
                return Err(EngineError::Validation(format!(
                    "unknown parameter type tag: {}",
                    tag
                )))
            }
        })
    }

    /// SQL cast applied to the bind placeholder so both typed binds and
    /// NULLs land in the column type. Text-shaped columns need none.
    pub fn bind_cast(&self) -> Option<&'static str> {
        match self {
            ParameterType::Integer | ParameterType::Relation { .. } => Some("bigint"),
            ParameterType::Decimal => Some("float8"),
            ParameterType::Boolean => Some("boolean"),
            ParameterType::DateTime => Some("timestamptz"),
            ParameterType::ShortText
            | ParameterType::LongText
            | ParameterType::Photo
            | ParameterType::Document => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_name_slugs_and_lowercases() {
        assert_eq!(physical_name("Vehicles").unwrap(), "vehicles");
        assert_eq!(physical_name("Office Rooms").unwrap(), "office_rooms");
        assert_eq!(physical_name("  Plate #1 / B  ").unwrap(), "plate_1_b");
    }

    #[test]
    fn physical_name_is_deterministic() {
        assert_eq!(
            physical_name("Fleet Cars").unwrap(),
            physical_name("Fleet Cars").unwrap()
        );
    }

    #[test]
    fn physical_name_prefixes_leading_digit() {
        assert_eq!(physical_name("3d models").unwrap(), "t_3d_models");
    }

    #[test]
    fn physical_name_rejects_empty_result() {
        assert!(physical_name("!!!").is_err());
        assert!(physical_name("").is_err());
    }

    #[test]
    fn physical_name_respects_length_limit() {
        let long = "x".repeat(200);
        let name = physical_name(&long).unwrap();
        assert!(name.len() <= 63);
    }

    #[test]
    fn safe_ident_allow_list() {
        assert!(ensure_safe_ident("vehicles").is_ok());
        assert!(ensure_safe_ident("_private").is_ok());
        assert!(ensure_safe_ident("a1_b2").is_ok());
        assert!(ensure_safe_ident("Vehicles").is_err());
        assert!(ensure_safe_ident("veh-icles").is_err());
        assert!(ensure_safe_ident("1abc").is_err());
        assert!(ensure_safe_ident("drop table; --").is_err());
        assert!(ensure_safe_ident("").is_err());
    }

    #[test]
    fn column_type_mapping_is_fixed() {
        assert_eq!(ParameterType::ShortText.column_type(), "VARCHAR(255)");
        assert_eq!(ParameterType::LongText.column_type(), "TEXT");
        assert_eq!(ParameterType::Integer.column_type(), "BIGINT");
        assert_eq!(ParameterType::Decimal.column_type(), "DOUBLE PRECISION");
        assert_eq!(ParameterType::Boolean.column_type(), "BOOLEAN");
        assert_eq!(ParameterType::DateTime.column_type(), "TIMESTAMPTZ");
        assert_eq!(ParameterType::Photo.column_type(), "TEXT");
        assert_eq!(ParameterType::Document.column_type(), "TEXT");
        assert_eq!(
            ParameterType::Relation { template_id: 7 }.column_type(),
            "BIGINT"
        );
    }

    #[test]
    fn tag_round_trip() {
        for ty in [
            ParameterType::ShortText,
            ParameterType::LongText,
            ParameterType::Integer,
            ParameterType::Decimal,
            ParameterType::Boolean,
            ParameterType::DateTime,
            ParameterType::Photo,
            ParameterType::Document,
        ] {
            assert_eq!(ParameterType::from_tag(ty.tag(), None).unwrap(), ty);
        }
        assert_eq!(
            ParameterType::from_tag("relation", Some(9)).unwrap(),
            ParameterType::Relation { template_id: 9 }
        );
        assert!(ParameterType::from_tag("relation", None).is_err());
        assert!(ParameterType::from_tag("vector", None).is_err());
    }
}
