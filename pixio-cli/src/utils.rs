use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::AppError;

/// Parse repeated `--header "Name: value"` flags into a header map
pub fn parse_headers(raw: &[String]) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    for item in raw {
        let (name, value) = item.split_once(':').ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Invalid header: '{item}' (expected \"Name: value\")"
            ))
        })?;
        let name = name
            .trim()
            .parse::<HeaderName>()
            .map_err(|e| AppError::InvalidInput(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| AppError::InvalidInput(format!("Invalid header value in '{item}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers =
            parse_headers(&["Authorization: Bearer token".to_string(), "X-A: b".to_string()])
                .unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer token");
        assert_eq!(headers.get("X-A").unwrap(), "b");
    }

    #[test]
    fn test_parse_headers_rejects_missing_colon() {
        assert!(parse_headers(&["not-a-header".to_string()]).is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
