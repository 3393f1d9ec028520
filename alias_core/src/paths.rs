//! Path helpers shared by the store and its backends.

/// Escape the LIKE wildcard characters (`%`, `_`) and the escape character
/// itself so a value can be matched literally.
///
/// # Examples
///
/// ```
/// use alias_core::paths::escape_like;
///
/// assert_eq!(escape_like("/50%_off"), "/50\\%\\_off");
/// ```
#[must_use]
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive literal comparison, the in-process equivalent of an
/// escaped `LIKE` without wildcards.
#[must_use]
pub fn like_eq(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

/// Case-insensitive substring test used by admin listings.
#[must_use]
pub fn like_contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Whether a path is absolute (starts with `/`).
#[must_use]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Split `/segment/rest...` into `("segment", "/rest...")`.
///
/// Returns `None` for single-segment paths, relative paths and paths with an
/// empty first segment or an empty remainder.
///
/// # Examples
///
/// ```
/// use alias_core::paths::split_context_segment;
///
/// assert_eq!(split_context_segment("/one/E"), Some(("one", "/E")));
/// assert_eq!(split_context_segment("/A"), None);
/// ```
#[must_use]
pub fn split_context_segment(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.strip_prefix('/')?;
    let slash = trimmed.find('/')?;
    let (segment, rest) = trimmed.split_at(slash);
    if segment.is_empty() || rest.len() < 2 {
        return None;
    }
    Some((segment, rest))
}

/// Prefix a path with a context segment: `("one", "/x")` becomes `/one/x`.
#[must_use]
pub fn prefix_with_context(context: &str, path: &str) -> String {
    format!("/{}/{}", context, path.trim_start_matches('/'))
}
