//! Resource path normalization.

/// Normalize a resource path to forward slashes with no empty, `.` or
/// resolvable `..` segments.
///
/// A leading `/` is kept. `..` above the root of an absolute path is
/// dropped; on a relative path it is kept. An empty result is `"."` (or
/// `"/"` when absolute). Trailing slashes are not kept.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
