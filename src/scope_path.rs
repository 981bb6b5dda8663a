use std::path::Path;

pub fn normalize(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

pub fn normalize_path(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

pub fn is_within_scope(path: &str, root: &str) -> bool {
    let path = normalize(path);
    let root = normalize(root);

    if path == root {
        return true;
    }

    if root == "/" {
        return path.starts_with('/');
    }

    if cfg!(windows) {
        let path_lower = path.to_ascii_lowercase();
        let root_lower = root.to_ascii_lowercase();
        return path_lower.starts_with(&(root_lower + "/"));
    }

    path.starts_with(&(root + "/"))
}

/// Path shown in progress messages: relative to `root` when inside it.
pub fn display_relative(path: &str, root: &str) -> String {
    let path = normalize(path);
    let root = normalize(root);
    if path != root && is_within_scope(&path, &root) {
        let prefix_len = if root == "/" { 1 } else { root.len() + 1 };
        return path[prefix_len..].to_string();
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(normalize("/foo/bar/"), "/foo/bar");
        assert_eq!(normalize("/foo/bar///"), "/foo/bar");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn normalize_converts_backslashes() {
        assert_eq!(normalize("C:\\Users\\test"), "C:/Users/test");
    }

    #[test]
    fn within_scope_child_path() {
        assert!(is_within_scope("/foo/bar/baz", "/foo/bar"));
        assert!(!is_within_scope("/foo/barbaz", "/foo/bar"));
    }

    #[test]
    fn relative_display_inside_root() {
        assert_eq!(
            display_relative("/scans/2024/a.png", "/scans/"),
            "2024/a.png"
        );
        assert_eq!(display_relative("/etc/a.png", "/"), "etc/a.png");
    }

    #[test]
    fn relative_display_outside_root_keeps_full_path() {
        assert_eq!(display_relative("/other/a.png", "/scans"), "/other/a.png");
        assert_eq!(display_relative("/scans", "/scans"), "/scans");
    }
}
