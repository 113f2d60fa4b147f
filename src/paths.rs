//! Path-string helpers for the trailing-slash directory convention.

/// True when `candidate` names an immediate child of the directory
/// `parent`.
///
/// The comparison is segment-aware: `"ab/"` is never a parent of
/// `"abc/x"`, and entries nested more than one level down are rejected.
/// A child that is itself a directory keeps its trailing slash.
pub(crate) fn is_immediate_child(parent: &[u8], candidate: &[u8]) -> bool {
    let Some(rest) = candidate.strip_prefix(parent) else {
        return false;
    };
    let rest = if parent.ends_with(b"/") {
        rest
    } else {
        match rest.strip_prefix(b"/") {
            Some(rest) => rest,
            None => return false,
        }
    };
    if rest.is_empty() {
        // The directory entry itself.
        return false;
    }
    match rest.iter().position(|&b| b == b'/') {
        None => true,
        Some(at) => at == rest.len() - 1,
    }
}

/// Rewrite a link's target into a full archive path.
///
/// Absolute targets stand on their own; relative targets replace the
/// final segment of the link's own name.
pub(crate) fn rewrite_link_target(link_name: &[u8], target: &[u8]) -> Vec<u8> {
    if target.starts_with(b"/") {
        return target.to_vec();
    }
    match link_name.iter().rposition(|&b| b == b'/') {
        Some(slash) => {
            let mut path = link_name[..=slash].to_vec();
            path.extend_from_slice(target);
            path
        }
        None => target.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_child() {
        assert!(is_immediate_child(b"dir/", b"dir/a"));
        assert!(is_immediate_child(b"dir/", b"dir/sub/"));
        assert!(!is_immediate_child(b"dir/", b"dir/sub/nested"));
        assert!(!is_immediate_child(b"dir/", b"dir/"));
        assert!(!is_immediate_child(b"dir/", b"other/a"));
    }

    #[test]
    fn test_sibling_prefix_is_not_a_parent() {
        assert!(!is_immediate_child(b"ab/", b"abc/x"));
        assert!(!is_immediate_child(b"ab", b"abc/x"));
        assert!(is_immediate_child(b"ab/", b"ab/x"));
    }

    #[test]
    fn test_parent_without_trailing_slash() {
        assert!(is_immediate_child(b"dir", b"dir/a"));
        assert!(!is_immediate_child(b"dir", b"dir"));
        assert!(!is_immediate_child(b"dir", b"director/a"));
    }

    #[test]
    fn test_rewrite_relative_target() {
        assert_eq!(rewrite_link_target(b"dir/link", b"file.txt"), b"dir/file.txt");
        assert_eq!(rewrite_link_target(b"a/b/link", b"c/d"), b"a/b/c/d");
    }

    #[test]
    fn test_rewrite_top_level_target() {
        // A link at the archive root has no directory component.
        assert_eq!(rewrite_link_target(b"link", b"file.txt"), b"file.txt");
    }

    #[test]
    fn test_rewrite_absolute_target() {
        assert_eq!(rewrite_link_target(b"dir/link", b"/etc/passwd"), b"/etc/passwd");
    }
}
