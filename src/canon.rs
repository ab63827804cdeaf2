//! Path canonicalization, so that "./foo" and "bar/../foo" name the same file.

/// Lexically canonicalize a path: drop "." and empty components, and fold
/// "x/.." pairs.  Leading ".." components that can't be folded are kept.
pub fn canon_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => match components.last() {
                Some(&last) if last != ".." => {
                    components.pop();
                }
                _ => {
                    if !absolute {
                        components.push("..");
                    }
                }
            },
            c => components.push(c),
        }
    }
    let joined = components.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_owned()
    } else {
        joined
    }
}
