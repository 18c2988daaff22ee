//! Hierarchical tag paths.

/// Normalize a tag path: trimmed, lower case, `/`-separated, no empty segments.
///
/// # Examples
/// ```
/// use bgdb_domain::normalize_tag;
/// assert_eq!(normalize_tag("  Opening/Split "), Some("opening/split".to_string()));
/// assert_eq!(normalize_tag("prime\\5pt"), Some("prime/5pt".to_string()));
/// assert_eq!(normalize_tag("//"), None);
/// ```
pub fn normalize_tag(input: &str) -> Option<String> {
    let normalized = input.trim().replace('\\', "/").to_lowercase();

    let segments: Vec<&str> = normalized
        .split('/')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return None;
    }

    Some(segments.join("/"))
}

/// True when `tags` holds `wanted` or any descendant of it.
pub fn tag_matches(tags: &[String], wanted: &str) -> bool {
    let prefix = format!("{}/", wanted);
    tags.iter().any(|t| t == wanted || t.starts_with(&prefix))
}
