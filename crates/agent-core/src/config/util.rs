/// Returns the value only when it is non-empty after trimming.
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads an environment variable, treating unset and blank the same way.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().as_deref().and_then(non_empty)
}

/// Splits a comma-separated value, dropping blank entries.
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(non_empty)
        .collect()
}

/// Lenient boolean parse for environment overrides.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
