use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Search by image URL request body
#[derive(Debug, Deserialize)]
pub struct UrlSearchRequest {
    /// Query image URL
    #[serde(default)]
    pub image_url: Option<String>,

    /// Number of results (number or numeric string)
    #[serde(default, deserialize_with = "lenient_top_k")]
    pub top_k: Option<usize>,

    /// Category filter
    #[serde(default)]
    pub category: Option<String>,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind
    pub error: String,

    /// Human-readable detail
    pub message: String,
}

/// Health check body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Parse a result count the way form fields arrive: leading integer digits,
/// anything unusable or non-positive means "use the default"
pub fn parse_top_k(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let digits_end = raw
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '+' || *c == '-'))))
        .map_or(raw.len(), |(i, _)| i);

    raw[..digits_end]
        .parse::<i64>()
        .ok()
        .filter(|k| *k > 0)
        .map(|k| k as usize)
}

fn lenient_top_k<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .filter(|k| *k > 0)
            .map(|k| k as usize),
        Some(Value::String(s)) => parse_top_k(&s),
        _ => None,
    })
}

/// Trimmed category, `None` when blank
pub fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
