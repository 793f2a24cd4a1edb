//! Label and path-segment resolution for raw relational cells.

/// Sentinel used for any value that cannot produce a usable label or segment.
pub const SENTINEL: &str = "_";

pub const MAX_SEGMENT_CHARS: usize = 80;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\t', '\r', '\n'];

fn is_missing(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("nan")
}

/// Turns arbitrary text into a filesystem- and URL-safe path segment.
///
/// Total: every input, including `None`, yields a non-empty segment with no
/// forbidden character and no trailing space or dot.
pub fn sanitize_segment(value: Option<&str>) -> String {
    let Some(raw) = value.map(str::trim) else {
        return SENTINEL.to_string();
    };
    if is_missing(raw) {
        return SENTINEL.to_string();
    }

    let replaced: String = raw
        .chars()
        .map(|ch| if FORBIDDEN.contains(&ch) { '_' } else { ch })
        .collect();
    let stripped = replaced.trim_end_matches([' ', '.']);
    let truncated: String = stripped.chars().take(MAX_SEGMENT_CHARS).collect();
    // truncation can expose a new trailing space or dot
    let segment = truncated.trim_end_matches([' ', '.']);

    if segment.is_empty() {
        SENTINEL.to_string()
    } else {
        segment.to_string()
    }
}

/// First candidate that is present, non-blank and not the literal `nan`.
pub fn pick_label(candidates: &[Option<&str>]) -> String {
    candidates
        .iter()
        .flatten()
        .map(|candidate| candidate.trim())
        .find(|candidate| !is_missing(candidate))
        .map(str::to_string)
        .unwrap_or_else(|| SENTINEL.to_string())
}

pub fn pick_segment(candidates: &[Option<&str>]) -> String {
    sanitize_segment(Some(&pick_label(candidates)))
}
