//! Persisted attachment-list layout and URL expansion, which must stay
//! bit-for-bit stable for compatibility.

use resource_engine::record::attachments::{
    append_name, contains_name, expand_urls, remove_name, split_names,
};

#[test]
fn list_grows_with_trailing_separator_and_no_leading_one() {
    let list = append_name(None, "first.png");
    assert_eq!(list, "first.png,");
    let list = append_name(Some(&list), "second.png");
    assert_eq!(list, "first.png,second.png,");
    assert!(!list.starts_with(','));
    assert!(list.ends_with(','));
}

#[test]
fn empty_list_is_null_not_empty_string() {
    let list = append_name(None, "only.pdf");
    assert_eq!(remove_name(&list, "only.pdf"), None);
}

#[test]
fn removing_one_keeps_the_rest_in_order() {
    let list = "a.png,b.png,c.png,";
    assert_eq!(remove_name(list, "b.png").as_deref(), Some("a.png,c.png,"));
}

#[test]
fn removing_an_absent_name_leaves_the_value_unchanged() {
    let list = "a.png,b.png,";
    assert_eq!(remove_name(list, "zzz.png").as_deref(), Some(list));
}

#[test]
fn url_expansion_is_endpoint_plus_name_plus_comma() {
    let endpoint = "https://files.rms.io/";
    let stored = "a.png,b.pdf,";
    let expanded = expand_urls(endpoint, stored);
    let expected: String = split_names(stored)
        .iter()
        .map(|name| format!("{}{},", endpoint, name))
        .collect();
    assert_eq!(expanded, expected);
    assert_eq!(
        expanded,
        "https://files.rms.io/a.png,https://files.rms.io/b.pdf,"
    );
}

#[test]
fn round_trip_after_mutations() {
    let mut list = append_name(None, "one.png");
    list = append_name(Some(&list), "two.png");
    list = append_name(Some(&list), "three.png");
    let list = remove_name(&list, "two.png").unwrap();
    assert_eq!(split_names(&list), vec!["one.png", "three.png"]);
    assert!(contains_name(&list, "one.png"));
    assert!(!contains_name(&list, "two.png"));
}
