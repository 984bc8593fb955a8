//! Country allow-list matching

/// Tokens that lift any geographic restriction
const WILDCARD_TOKENS: [&str; 2] = ["worldwide", "all"];

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Decide whether `visitor_country` satisfies `allow_list`.
///
/// An empty list is unrestricted. A blank visitor country never satisfies a
/// non-empty list, wildcard included. Non-wildcard entries must match the
/// country exactly after trimming and lower-casing, so "Austria" does not
/// match "Australia".
pub fn is_allowed<S: AsRef<str>>(allow_list: &[S], visitor_country: &str) -> bool {
    if allow_list.is_empty() {
        return true;
    }

    let country = normalize(visitor_country);
    if country.is_empty() {
        return false;
    }

    let entries: Vec<String> = allow_list.iter().map(|e| normalize(e.as_ref())).collect();

    if entries
        .iter()
        .any(|entry| WILDCARD_TOKENS.contains(&entry.as_str()))
    {
        return true;
    }

    entries.iter().any(|entry| *entry == country)
}

/// Trim entries, drop blanks and case-insensitive duplicates, keep first-seen order
pub fn normalize_list<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(entries.len());
    let mut out = Vec::with_capacity(entries.len());

    for entry in entries {
        let trimmed = entry.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(trimmed.to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_unrestricted() {
        let empty: [&str; 0] = [];
        assert!(is_allowed(&empty, "France"));
        assert!(is_allowed(&empty, ""));
    }

    #[test]
    fn test_blank_country_never_matches_a_restriction() {
        assert!(!is_allowed(&["France"], ""));
        assert!(!is_allowed(&["France"], "   "));
        assert!(!is_allowed(&["ALL"], ""));
    }

    #[test]
    fn test_wildcards_in_any_case_and_position() {
        for list in [
            vec!["ALL"],
            vec!["Worldwide"],
            vec!["US", " all "],
            vec!["France", "Germany", "WORLDWIDE"],
        ] {
            assert!(is_allowed(&list, "Kenya"), "list {:?}", list);
        }
    }

    #[test]
    fn test_exact_match_is_case_and_whitespace_insensitive() {
        assert!(is_allowed(&["  united states "], "United States"));
        assert!(is_allowed(&["FRANCE"], " france"));
    }

    #[test]
    fn test_substrings_do_not_match() {
        assert!(!is_allowed(&["Australia"], "Austria"));
        assert!(!is_allowed(&["Austria"], "Australia"));
        assert!(!is_allowed(&["Niger"], "Nigeria"));
        assert!(!is_allowed(&["Guinea"], "Equatorial Guinea"));
    }

    #[test]
    fn test_unrecognized_tokens_fall_through_to_false() {
        assert!(!is_allowed(&["*", "any", "everywhere"], "Chile"));
    }

    #[test]
    fn test_normalize_list_trims_and_dedupes() {
        let list = normalize_list(&[" US ", "", "us", "Canada", "  ", "CANADA", "France"]);
        assert_eq!(list, vec!["US", "Canada", "France"]);
    }
}
