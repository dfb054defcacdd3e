//! ACL evaluation semantics: deny by default, mask AND checks, processing
//! order, and group sid resolution across renames.

use resource_engine::acl::{evaluate, permission, AccessControlEntry};
use std::collections::HashSet;

fn entry(order: i32, sid: &str, principal: bool, mask: i32, granting: bool) -> AccessControlEntry {
    AccessControlEntry {
        order,
        sid: sid.into(),
        principal,
        mask,
        granting,
    }
}

fn resolved(pairs: &[(&str, bool)]) -> HashSet<(String, bool)> {
    pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
}

#[test]
fn no_entry_denies_every_permission_bit() {
    let entries = vec![entry(0, "alice@rms.io", true, permission::READ, true)];
    let sids = resolved(&[("mallory@rms.io", true)]);
    for bit in [
        permission::READ,
        permission::WRITE,
        permission::CREATE,
        permission::DELETE,
        permission::ADMINISTRATION,
    ] {
        assert_eq!(evaluate(&entries, &sids, bit), None);
    }
}

#[test]
fn grant_with_unrelated_bits_still_satisfies_requested_bit() {
    let entries = vec![entry(
        0,
        "alice@rms.io",
        true,
        permission::WRITE | permission::DELETE | permission::CREATE,
        true,
    )];
    let sids = resolved(&[("alice@rms.io", true)]);
    assert_eq!(evaluate(&entries, &sids, permission::WRITE), Some(true));
    assert_eq!(evaluate(&entries, &sids, permission::DELETE), Some(true));
    assert_eq!(evaluate(&entries, &sids, permission::READ), None);
}

#[test]
fn deny_entry_short_circuits_later_grants() {
    let entries = vec![
        entry(0, "contractors", false, permission::WRITE, false),
        entry(1, "bob@rms.io", true, permission::WRITE, true),
    ];
    let sids = resolved(&[("bob@rms.io", true), ("contractors", false)]);
    assert_eq!(evaluate(&entries, &sids, permission::WRITE), Some(false));
}

#[test]
fn membership_grants_through_group_sid() {
    let entries = vec![entry(0, "managers", false, permission::WRITE, true)];
    let member = resolved(&[("carol@rms.io", true), ("managers", false)]);
    let outsider = resolved(&[("dave@rms.io", true)]);
    assert_eq!(evaluate(&entries, &member, permission::WRITE), Some(true));
    assert_eq!(evaluate(&entries, &outsider, permission::WRITE), None);
}

#[test]
fn renamed_group_resolves_identically_for_members() {
    // Rename rewrites the sid on the entry side; the member's resolved sids
    // carry the new name, so the grant keeps applying.
    let before = vec![entry(0, "Managers", false, permission::ADMINISTRATION, true)];
    let after = vec![entry(0, "Admins", false, permission::ADMINISTRATION, true)];
    let member_before = resolved(&[("carol@rms.io", true), ("Managers", false)]);
    let member_after = resolved(&[("carol@rms.io", true), ("Admins", false)]);
    assert_eq!(
        evaluate(&before, &member_before, permission::ADMINISTRATION),
        evaluate(&after, &member_after, permission::ADMINISTRATION)
    );
}

#[test]
fn orphaned_group_sid_stops_matching_after_delete() {
    let entries = vec![entry(0, "managers", false, permission::WRITE, true)];
    // Group deleted: members no longer resolve the group sid.
    let former_member = resolved(&[("carol@rms.io", true)]);
    assert_eq!(evaluate(&entries, &former_member, permission::WRITE), None);
}

#[test]
fn masks_combine_with_bitwise_or() {
    let combined = permission::READ | permission::WRITE | permission::ADMINISTRATION;
    assert_eq!(combined, 1 | 2 | 16);
    assert_ne!(combined & permission::WRITE, 0);
    assert_eq!(combined & permission::DELETE, 0);
}
