//! Shared utilities for the regression tracker.

/// Normalize a free-text dimension value into a safe key fragment.
///
/// Spaces are dropped and `.` becomes `:` so the value can never
/// introduce an extra separator into a dotted lineage key. Other
/// whitespace (tabs, newlines) is kept as-is.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .filter(|&c| c != ' ')
        .map(|c| if c == '.' { ':' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_key_examples() {
        assert_eq!(sanitize_key(" "), "");
        assert_eq!(sanitize_key("foo"), "foo");
        assert_eq!(sanitize_key("foo bar"), "foobar");
        assert_eq!(sanitize_key("foo.bar"), "foo:bar");
        assert_eq!(sanitize_key("foo bar.baz+foo"), "foobar:baz+foo");
    }

    #[test]
    fn test_sanitize_key_only_drops_spaces() {
        assert_eq!(sanitize_key(""), "");
        assert_eq!(sanitize_key("gcc\t8.3"), "gcc\t8:3");
        assert_eq!(sanitize_key("a\nb c"), "a\nbc");
    }

    proptest! {
        #[test]
        fn sanitized_keys_have_no_dots_or_spaces(input in ".*") {
            let out = sanitize_key(&input);
            prop_assert!(!out.contains('.'));
            prop_assert!(!out.contains(' '));
        }

        #[test]
        fn sanitize_is_idempotent(input in ".*") {
            let once = sanitize_key(&input);
            prop_assert_eq!(sanitize_key(&once), once.clone());
        }
    }
}
