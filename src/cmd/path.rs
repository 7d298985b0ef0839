//! Remote path normalization against the session's working directory.

/// Resolves `path` against `cwd`, collapsing `.` and `..` segments.
///
/// The result is always absolute, never ends in `/` (except the root), and
/// `..` at the root stays at the root.
pub fn full_path(cwd: &str, path: &str) -> String {
    let joined;
    let source = if path.starts_with('/') {
        path
    } else {
        joined = format!("{}/{}", cwd.trim_end_matches('/'), path);
        joined.as_str()
    };

    let mut segments: Vec<&str> = Vec::new();
    for seg in source.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Splits a partially typed path into the directory portion the user already
/// typed (including the trailing `/`) and the final fragment.
pub fn split_typed(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(n) => path.split_at(n + 1),
        None => ("", path),
    }
}
