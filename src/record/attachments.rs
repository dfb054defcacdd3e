//! Delimited attachment lists. The persisted layout is fixed: each filename
//! followed by a trailing comma, no leading separator, and an empty list is
//! NULL rather than an empty string.

/// Append a filename, producing the new stored value.
pub fn append_name(list: Option<&str>, name: &str) -> String {
    match list {
        Some(existing) => format!("{}{},", existing, name),
        None => format!("{},", name),
    }
}

/// Remove the exact `name + ","` token. Removing an absent name leaves the
/// value unchanged; a list emptied by removal collapses to NULL.
pub fn remove_name(list: &str, name: &str) -> Option<String> {
    let token = format!("{},", name);
    let out = list.replace(&token, "");
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Filenames in the stored value, in order.
pub fn split_names(list: &str) -> Vec<&str> {
    list.split(',').filter(|s| !s.is_empty()).collect()
}

/// Whether the exact filename is present in the stored value.
pub fn contains_name(list: &str, name: &str) -> bool {
    split_names(list).iter().any(|n| *n == name)
}

/// Expand each stored filename to `endpoint + filename + ","`, concatenated.
pub fn expand_urls(endpoint: &str, list: &str) -> String {
    let mut out = String::new();
    for name in split_names(list) {
        out.push_str(endpoint);
        out.push_str(name);
        out.push(',');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_trailing_comma_layout() {
        assert_eq!(append_name(None, "a.png"), "a.png,");
        assert_eq!(append_name(Some("a.png,"), "b.png"), "a.png,b.png,");
    }

    #[test]
    fn remove_exact_token() {
        assert_eq!(
            remove_name("a.png,b.png,", "a.png").as_deref(),
            Some("b.png,")
        );
        assert_eq!(
            remove_name("a.png,b.png,", "b.png").as_deref(),
            Some("a.png,")
        );
    }

    #[test]
    fn remove_last_name_collapses_to_null() {
        assert_eq!(remove_name("a.png,", "a.png"), None);
    }

    #[test]
    fn remove_absent_name_is_a_no_op() {
        assert_eq!(
            remove_name("a.png,b.png,", "c.png").as_deref(),
            Some("a.png,b.png,")
        );
    }

    #[test]
    fn split_ignores_trailing_separator() {
        assert_eq!(split_names("a.png,b.png,"), vec!["a.png", "b.png"]);
        assert_eq!(split_names(""), Vec::<&str>::new());
    }

    #[test]
    fn contains_matches_whole_tokens_only() {
        assert!(contains_name("a.png,b.png,", "a.png"));
        assert!(!contains_name("aa.png,", "a.png"));
    }

    #[test]
    fn urls_expand_per_stored_filename() {
        assert_eq!(
            expand_urls("https://files.rms.io/", "a.png,b.png,"),
            "https://files.rms.io/a.png,https://files.rms.io/b.png,"
        );
    }
}
