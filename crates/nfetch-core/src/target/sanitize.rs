//! Linux-safe path component sanitization.

use crate::name::{Component, ContentName};

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Sanitizes one path component for safe use on Linux.
///
/// - Replaces NUL, `/`, `\`, whitespace and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots and underscores
/// - Limits length to 255 bytes
///
/// Returns `None` when nothing usable is left (including `.` and `..`).
pub fn sanitize_component(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut prev_underscore = false;

    for c in raw.chars() {
        let unsafe_char = c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace();
        if unsafe_char || c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    let clipped = &trimmed[..take];
    match clipped {
        "" | "." | ".." => None,
        s => Some(s.to_string()),
    }
}

/// Relative path components for `name`, each sanitized; unusable components
/// are dropped. A trailing segment component is not part of the path.
pub fn relative_components(name: &ContentName) -> Vec<String> {
    name.without_segment()
        .components()
        .iter()
        .map(Component::to_path_string)
        .filter_map(|c| sanitize_component(&c))
        .collect()
}
