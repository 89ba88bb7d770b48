//! Tag maps and their canonical string form.
//!
//! A tagged identity is keyed by `(name, canonical tags)`. The canonical
//! string lists the pairs ordered by key, each written as `;key=value`, so
//! two maps holding the same pairs always produce the same bytes.

use std::collections::BTreeMap;

/// Tag set attached to a tagged metric identity.
pub type Tags = BTreeMap<String, String>;

/// Builds a [`Tags`] map from borrowed pairs.
pub fn tags<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Canonical string for a tag map: `;k1=v1;k2=v2` with keys ascending.
///
/// An empty map yields an empty string.
pub fn canonical_tags(tags: &Tags) -> String {
    let mut out = String::with_capacity(tags.iter().map(|(k, v)| k.len() + v.len() + 2).sum());
    for (key, value) in tags {
        out.push(';');
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}

/// Merges two tag maps and renders the canonical string of the result.
///
/// On a key present in both maps the value from `a` is kept.
pub fn merge_tags(a: &Tags, b: &Tags) -> (Tags, String) {
    let merged = match (a.is_empty(), b.is_empty()) {
        (true, true) => return (Tags::new(), String::new()),
        (false, true) => a.clone(),
        (true, false) => b.clone(),
        (false, false) => {
            let mut merged = a.clone();
            for (key, value) in b {
                merged
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
            merged
        }
    };
    let canonical = canonical_tags(&merged);
    (merged, canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut first = Tags::new();
        first.insert("b".into(), "2".into());
        first.insert("a".into(), "1".into());

        let mut second = Tags::new();
        second.insert("a".into(), "1".into());
        second.insert("b".into(), "2".into());

        let (_, s1) = merge_tags(&first, &Tags::new());
        let (_, s2) = merge_tags(&second, &Tags::new());
        assert_eq!(s1, ";a=1;b=2");
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_both_empty() {
        let (merged, canonical) = merge_tags(&Tags::new(), &Tags::new());
        assert!(merged.is_empty());
        assert_eq!(canonical, "");
    }

    #[test]
    fn test_first_map_wins_on_conflict() {
        let a = tags([("dc", "east"), ("host", "web1")]);
        let b = tags([("dc", "west"), ("env", "prod")]);

        let (merged, canonical) = merge_tags(&a, &b);
        assert_eq!(merged.get("dc").map(String::as_str), Some("east"));
        assert_eq!(canonical, ";dc=east;env=prod;host=web1");
    }

    #[test]
    fn test_only_second_map() {
        let b = tags([("env", "prod")]);
        let (merged, canonical) = merge_tags(&Tags::new(), &b);
        assert_eq!(merged, b);
        assert_eq!(canonical, ";env=prod");
    }

    #[test]
    fn test_keys_sort_before_values() {
        // "a-b" sorts after "a" by key even though '-' < '=' bytewise.
        let t = tags([("a-b", "2"), ("a", "1")]);
        assert_eq!(canonical_tags(&t), ";a=1;a-b=2");
    }
}
