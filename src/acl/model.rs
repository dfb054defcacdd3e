//! ACL domain model: principals, sids, object identities, entries, and the
//! ordered-scan evaluation rule.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Permission bits. Combinable with `|`; checks use bitwise AND, never
/// equality, so a grant of `WRITE | DELETE` satisfies a required `WRITE`.
pub mod permission {
    pub const READ: i32 = 1;
    pub const WRITE: i32 = 2;
    pub const CREATE: i32 = 4;
    pub const DELETE: i32 = 8;
    pub const ADMINISTRATION: i32 = 16;
}

/// The acting caller, resolved by the embedding layer. The email doubles as
/// the principal's sid in ACL entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub email: String,
}

/// A sid names either one principal (by email) or one group (by name).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sid {
    pub name: String,
    pub principal: bool,
}

impl Sid {
    pub fn user(email: impl Into<String>) -> Self {
        Sid {
            name: email.into(),
            principal: true,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Sid {
            name: name.into(),
            principal: false,
        }
    }
}

/// Domain object kinds anchored in the ACL tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Template,
    Group,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Template => "template",
            ObjectClass::Group => "group",
        }
    }
}

/// Stable (object-type, object-id) pair anchoring permission entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub class: ObjectClass,
    pub id: i64,
}

impl ObjectIdentity {
    pub fn template(id: i64) -> Self {
        ObjectIdentity {
            class: ObjectClass::Template,
            id,
        }
    }

    pub fn group(id: i64) -> Self {
        ObjectIdentity {
            class: ObjectClass::Group,
            id,
        }
    }
}

/// One entry loaded for evaluation, already joined with its sid string.
#[derive(Clone, Debug)]
pub struct AccessControlEntry {
    pub order: i32,
    pub sid: String,
    pub principal: bool,
    pub mask: i32,
    pub granting: bool,
}

/// One row of `list_principals_with_access`.
#[derive(Clone, Debug, Serialize)]
pub struct PrincipalPermission {
    pub sid: String,
    pub principal: bool,
    pub mask: i32,
    pub granting: bool,
}

/// Scan entries in processing order. The first entry whose sid is one of the
/// caller's resolved sids and whose mask overlaps the required mask decides
/// the outcome via its granting flag. No match leaves the decision to the
/// caller (deny by default; the object owner never reaches this point).
pub fn evaluate(
    entries: &[AccessControlEntry],
    resolved_sids: &HashSet<(String, bool)>,
    required_mask: i32,
) -> Option<bool> {
    for entry in entries {
        if resolved_sids.contains(&(entry.sid.clone(), entry.principal))
            && entry.mask & required_mask != 0
        {
            return Some(entry.granting);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sids(pairs: &[(&str, bool)]) -> HashSet<(String, bool)> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    fn entry(order: i32, sid: &str, principal: bool, mask: i32, granting: bool) -> AccessControlEntry {
        AccessControlEntry {
            order,
            sid: sid.into(),
            principal,
            mask,
            granting,
        }
    }

    #[test]
    fn no_matching_entry_is_no_decision() {
        let entries = vec![entry(0, "alice@rms.io", true, permission::WRITE, true)];
        let resolved = sids(&[("bob@rms.io", true)]);
        assert_eq!(evaluate(&entries, &resolved, permission::WRITE), None);
    }

    #[test]
    fn mask_is_checked_with_and_not_equality() {
        let entries = vec![entry(
            0,
            "alice@rms.io",
            true,
            permission::WRITE | permission::DELETE,
            true,
        )];
        let resolved = sids(&[("alice@rms.io", true)]);
        assert_eq!(
            evaluate(&entries, &resolved, permission::WRITE),
            Some(true)
        );
        assert_eq!(
            evaluate(&entries, &resolved, permission::READ),
            None
        );
    }

    #[test]
    fn first_matching_entry_wins() {
        let entries = vec![
            entry(0, "staff", false, permission::WRITE, false),
            entry(1, "alice@rms.io", true, permission::WRITE, true),
        ];
        let resolved = sids(&[("alice@rms.io", true), ("staff", false)]);
        assert_eq!(
            evaluate(&entries, &resolved, permission::WRITE),
            Some(false)
        );
    }

    #[test]
    fn group_sid_resolves_for_members() {
        let entries = vec![entry(0, "managers", false, permission::ADMINISTRATION, true)];
        let resolved = sids(&[("carol@rms.io", true), ("managers", false)]);
        assert_eq!(
            evaluate(&entries, &resolved, permission::ADMINISTRATION),
            Some(true)
        );
    }

    #[test]
    fn principal_and_group_sids_do_not_collide() {
        // A user named like a group must not match the group's entry.
        let entries = vec![entry(0, "managers", false, permission::WRITE, true)];
        let resolved = sids(&[("managers", true)]);
        assert_eq!(evaluate(&entries, &resolved, permission::WRITE), None);
    }

    #[test]
    fn every_bit_denied_without_entries() {
        let resolved = sids(&[("dave@rms.io", true)]);
        for bit in [
            permission::READ,
            permission::WRITE,
            permission::CREATE,
            permission::DELETE,
            permission::ADMINISTRATION,
        ] {
            assert_eq!(evaluate(&[], &resolved, bit), None);
        }
    }
}
