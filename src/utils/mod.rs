pub const UPLOAD_KEYWORDS: &[&str] = &["upload", "file"];

// prepends http:// to targets given without a scheme
pub fn normalize_target(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("target URL is empty".to_string());
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(trimmed.to_string());
    }
    Ok(format!("http://{trimmed}"))
}

/// Resolves `path` against `base` the way a browser resolves a link, so an
/// absolute path replaces whatever path the base already carries.
pub fn join_url(base: &str, path: &str) -> Result<String, String> {
    let base = reqwest::Url::parse(base).map_err(|e| format!("invalid base URL '{base}': {e}"))?;
    base.join(path)
        .map(|u| u.to_string())
        .map_err(|e| format!("cannot join '{path}' onto '{base}': {e}"))
}

pub fn contains_upload_keyword(body: &[u8]) -> bool {
    let lower = body.to_ascii_lowercase();
    UPLOAD_KEYWORDS
        .iter()
        .any(|k| contains_bytes(&lower, k.as_bytes()))
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
