//! Input Binder and Constant Binder.

pub mod constant;
pub mod input;

use std::collections::HashSet;

/// Transforms a debug name into a variable-legal identifier, resolving
/// collisions by appending underscores until unique.
pub fn sanitize_ident(raw: &str, used: &mut HashSet<String>) -> String {
    let mut sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        sanitized.push_str("v");
    }
    if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    while used.contains(&sanitized) {
        sanitized.push('_');
    }
    used.insert(sanitized.clone());
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_gets_placeholder() {
        let mut used = HashSet::new();
        assert_eq!(sanitize_ident("", &mut used), "v");
    }

    #[test]
    fn leading_digit_gets_prefixed() {
        let mut used = HashSet::new();
        assert_eq!(sanitize_ident("3x", &mut used), "_3x");
    }

    #[test]
    fn illegal_characters_become_underscores() {
        let mut used = HashSet::new();
        assert_eq!(sanitize_ident("my-input.0", &mut used), "my_input_0");
    }

    #[test]
    fn collisions_append_underscores() {
        let mut used = HashSet::new();
        let a = sanitize_ident("x", &mut used);
        let b = sanitize_ident("x", &mut used);
        let c = sanitize_ident("x", &mut used);
        assert_eq!(a, "x");
        assert_eq!(b, "x_");
        assert_eq!(c, "x__");
    }
}
