//! Query-parameter parsing shared by the list endpoints.

use hashbrown::HashSet;

use super::error::ApiError;

/// Parses a boolean filter. `true/1/yes` and `false/0/no` are accepted in any
/// case; an absent parameter is `None`; anything else is a client error that
/// names the parameter.
pub fn parse_bool(name: &str, raw: Option<&str>) -> Result<Option<bool>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        _ => Err(ApiError::bad_request(format!(
            "invalid boolean for {name}: {raw:?}"
        ))),
    }
}

/// Positive page size clamped to `max_limit`; absent or unusable values fall
/// back to `default_limit`.
pub fn parse_limit(raw: Option<&str>, default_limit: usize, max_limit: usize) -> usize {
    let max_limit = max_limit.max(1);
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default_limit)
        .clamp(1, max_limit)
}

/// Comma-separated set; blank entries are dropped and an empty set is `None`.
pub fn parse_csv_set(raw: Option<&str>) -> Option<HashSet<String>> {
    let set: HashSet<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!set.is_empty()).then_some(set)
}

/// Trimmed free text; blank is `None`.
pub fn parse_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
