//! Project-specific utilities live here.

/// Characters that are not allowed in file names on common platforms.
const RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make `raw` safe to use as a file name stem.
///
/// Reserved and control characters become `_`; leading and trailing
/// whitespace and dots are dropped. Returns `None` when nothing usable is
/// left.
pub fn sanitize_file_stem(raw: &str) -> Option<String> {
    let replaced: String = raw
        .chars()
        .map(|ch| {
            if RESERVED.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|ch: char| ch.is_whitespace() || ch == '.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
