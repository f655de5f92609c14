//! Connection string normalization.
//!
//! User supplied connection strings arrive quoted, labelled, with trailing
//! punctuation or with keys that a driver parser rejects. [`sanitize`] turns
//! them into a canonical `key=value;key=value` form.

/// Key synonyms rewritten to their canonical spelling.
const KEY_SYNONYMS: [(&str, &str); 4] = [
    ("User", "Username"),
    ("Uid", "Username"),
    ("Pwd", "Password"),
    ("Addr", "Host"),
];

/// Bare keys that are kept with a default value instead of being dropped.
const BARE_KEY_DEFAULTS: [(&str, &str); 1] = [("Keepalive", "Keepalive=30")];

/// Removes matching surrounding `"` or `'` pairs, however deeply nested.
///
/// Whitespace is trimmed before and between layers. Empty input is returned
/// unchanged.
pub fn strip_quotes(value: &str) -> &str {
    if value.is_empty() {
        return value;
    }
    let mut result = value.trim();
    while result.len() >= 2
        && ((result.starts_with('"') && result.ends_with('"'))
            || (result.starts_with('\'') && result.ends_with('\'')))
    {
        result = result[1..result.len() - 1].trim();
    }
    result
}

/// Normalizes a raw connection string.
///
/// Returns an empty string when nothing usable remains. The result is stable:
/// sanitizing it again yields the same string.
pub fn sanitize(raw: &str) -> String {
    // A changing pass only shortens the string or expands a synonym/bare key
    // into a canonical form that is never expanded again, so this terminates.
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let mut candidate = trim_trailing_punctuation(strip_quotes(raw));

    // `"label": "Host=..."` fragments keep only the right-hand side, however
    // many labels are chained in front.
    while let Some(colon) = candidate.find(':') {
        if colon == 0 || candidate[..colon].contains('=') {
            break;
        }
        let rhs = candidate[colon + 1..].trim();
        if rhs.is_empty() {
            break;
        }
        candidate = trim_trailing_punctuation(strip_quotes(rhs));
    }

    candidate
        .split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(normalize_token)
        .collect::<Vec<_>>()
        .join(";")
}

fn trim_trailing_punctuation(value: &str) -> &str {
    value.trim().trim_end_matches([';', ','])
}

/// Rebuilds one `key=value` token, or drops it when it cannot be repaired.
fn normalize_token(token: &str) -> Option<String> {
    let Some((key, value)) = token.split_once('=') else {
        return BARE_KEY_DEFAULTS
            .iter()
            .find(|(bare, _)| token.eq_ignore_ascii_case(bare))
            .map(|(_, replacement)| replacement.to_string());
    };

    let key = strip_quotes(key.trim());
    let value = strip_quotes(value.trim());
    let key = KEY_SYNONYMS
        .iter()
        .find(|(synonym, _)| key.eq_ignore_ascii_case(synonym))
        .map_or(key, |(_, canonical)| *canonical);

    Some(format!("{}={}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes_nested() {
        assert_eq!(strip_quotes(r#"""a"""#), "a");
        assert_eq!(strip_quotes(r#"" 'Host=x' ""#), "Host=x");
        assert_eq!(strip_quotes("  plain  "), "plain");
    }

    #[test]
    fn test_strip_quotes_edge_cases() {
        assert_eq!(strip_quotes(""), "");
        assert_eq!(strip_quotes("\""), "\"");
        assert_eq!(strip_quotes("\"'"), "\"'");
        assert_eq!(strip_quotes("''"), "");
        assert_eq!(strip_quotes("'a\""), "'a\"");
    }

    #[test]
    fn test_key_synonyms() {
        assert_eq!(
            sanitize("Uid=me;Pwd=secret;Addr=host1"),
            "Username=me;Password=secret;Host=host1"
        );
        assert_eq!(sanitize("USER=me"), "Username=me");
    }

    #[test]
    fn test_bare_tokens() {
        assert_eq!(sanitize("Keepalive;Server=x"), "Keepalive=30;Server=x");
        assert_eq!(sanitize("keepalive;Server=x"), "Keepalive=30;Server=x");
        assert_eq!(sanitize("Foo;Server=x"), "Server=x");
    }

    #[test]
    fn test_quotes_and_trailing_punctuation() {
        assert_eq!(sanitize(r#""Host=x;Port=5432;""#), "Host=x;Port=5432");
        assert_eq!(sanitize("Host=x;Port=5432,"), "Host=x;Port=5432");
        assert_eq!(sanitize("Host='x' ; Database=\"d\""), "Host=x;Database=d");
    }

    #[test]
    fn test_label_fragment_keeps_right_hand_side() {
        assert_eq!(
            sanitize(r#""Default": "Host=db;Port=5432","#),
            "Host=db;Port=5432"
        );
    }

    #[test]
    fn test_chained_labels_are_all_removed() {
        assert_eq!(sanitize("a:b:c:d:e:f:g:h:i:j:Server=x"), "Server=x");
        assert_eq!(sanitize(r#""outer": "inner": "Host=h""#), "Host=h");
    }

    #[test]
    fn test_colon_after_equals_is_kept() {
        assert_eq!(sanitize("Server=tcp:db,1433;Database=x"), "Server=tcp:db,1433;Database=x");
    }

    #[test]
    fn test_value_keeps_everything_after_first_equals() {
        assert_eq!(sanitize("Password=a=b"), "Password=a=b");
    }

    #[test]
    fn test_nothing_usable() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   "), "");
        assert_eq!(sanitize("justtext"), "");
        assert_eq!(sanitize(";;,"), "");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "Uid=me;Pwd=secret;Addr=host1",
            "Keepalive;Server=x",
            r#""Primary": "Host=a;Port=1";"#,
            "a:b:Server=x",
            "a:b:c:d:e:f:g:h:i:j:Server=x",
            "Db='y,'",
            "Host=x;Db=\"'v'\";",
            "'x=1;Uid=a;z=y'",
            "\"'Keepalive'\"",
            "=value;key=",
            "Server=tcp:db,1433",
            "   ",
            "Foo",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {:?}", input);
        }
    }
}
