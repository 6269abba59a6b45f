//! POSIX path helpers for build-context and container paths.
//!
//! Container paths are always `/`-separated regardless of the host platform,
//! so these work on strings instead of `std::path`.

/// Normalizes a path relative to the build context: `.` segments and empty
/// segments are dropped, `..` pops the previous segment. Returns `None` when
/// the path climbs out of the context.
pub fn normalize_relative(path: &str) -> Option<String> {
    segments(path, false).map(|segments| segments.join("/"))
}

/// Normalizes an absolute container path. `..` at the root stays at the root.
pub fn normalize_absolute(path: &str) -> String {
    format!("/{}", segments(path, true).unwrap_or_default().join("/"))
}

/// Resolves `path` against `base` the way `WORKDIR` and `COPY` destinations do:
/// absolute paths are kept as-is, relative ones are appended to `base`.
pub fn resolve(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        normalize_absolute(path)
    } else {
        normalize_absolute(&format!("{}/{}", base, path))
    }
}

pub fn join(dir: &str, name: &str) -> String {
    resolve(dir, name.trim_start_matches('/'))
}

pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

pub fn parent(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

fn segments(path: &str, clamp_at_root: bool) -> Option<Vec<&str>> {
    path.split('/').try_fold(Vec::new(), |mut acc, segment| {
        match segment {
            "" | "." => {}
            ".." => {
                if acc.pop().is_none() && !clamp_at_root {
                    return None;
                }
            }
            other => acc.push(other),
        }
        Some(acc)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_lose_dot_segments() {
        assert_eq!(normalize_relative("./src/./lib/../main.rs").as_deref(), Some("src/main.rs"));
        assert_eq!(normalize_relative(".").as_deref(), Some(""));
        assert_eq!(normalize_relative("src/../a").as_deref(), Some("a"));
    }

    #[test]
    fn relative_paths_cannot_leave_the_context() {
        assert_eq!(normalize_relative("../a.test"), None);
        assert_eq!(normalize_relative("src/../../a.test"), None);
        assert_eq!(normalize_absolute("/../etc"), "/etc");
    }

    #[test]
    fn resolve_keeps_absolute_and_joins_relative() {
        assert_eq!(resolve("/usr/src", "/tmp/"), "/tmp");
        assert_eq!(resolve("/usr/src", "app"), "/usr/src/app");
        assert_eq!(resolve("/usr/src", "../lib"), "/usr/lib");
        assert_eq!(resolve("/", "."), "/");
    }

    #[test]
    fn basename_and_parent() {
        assert_eq!(basename("dir/file.txt"), "file.txt");
        assert_eq!(basename("file.txt"), "file.txt");
        assert_eq!(parent("/tmp/b.test"), "/tmp");
        assert_eq!(parent("/b.test"), "/");
        assert_eq!(join("/", "b.test"), "/b.test");
        assert_eq!(join("/app", "sub/c.js"), "/app/sub/c.js");
    }
}
