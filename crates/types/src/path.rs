//! Reserved path syntax.
//!
//! These tokens must stay bit-exact: collaborators that marshal contexts rely on them.

/// Context path separator between path segments (`a/b/c`).
pub const CPS: char = '/';

/// Association path separator used to tokenize attribute tuples (`cp|in|||`).
pub const APS: char = '|';

/// Return-path token meaning "the context itself".
pub const SELF: &str = "_self_";

/// Transient marker path removed from a context after an append.
pub const CLOSURE_PATH: &str = "_closure_";

/// Path used by `set_return_value` when no return path was declared.
pub const DEFAULT_RETURN_PATH: &str = "context/result";

/// Joins two context paths with the path separator, skipping empty sides.
pub fn join(prefix: &str, suffix: &str) -> String {
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, _) => suffix.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}{CPS}{suffix}"),
    }
}

/// Returns the remainder of `path` below `prefix`.
///
/// `Some("")` means `path == prefix`; `None` means `path` is not at or under `prefix`.
/// An empty prefix contains every path.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix(CPS)
}

/// Splits an association tuple (`attr|v1|v2`) into its tokens, keeping empty components.
pub fn tokenize_association(association: &str) -> Vec<&str> {
    association.split(APS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_skips_empty_sides() {
        assert_eq!(join("", "a/b"), "a/b");
        assert_eq!(join("a", ""), "a");
        assert_eq!(join("a", "b/c"), "a/b/c");
    }

    #[test]
    fn strip_prefix_respects_segment_boundaries() {
        assert_eq!(strip_prefix("x/y/z", "x"), Some("y/z"));
        assert_eq!(strip_prefix("x", "x"), Some(""));
        assert_eq!(strip_prefix("xy/z", "x"), None);
        assert_eq!(strip_prefix("anything", ""), Some("anything"));
    }

    #[test]
    fn tokenize_keeps_empty_components() {
        assert_eq!(tokenize_association("cp|in|||"), vec!["cp", "in", "", "", ""]);
    }
}
