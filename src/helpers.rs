use chrono::{DateTime, Utc};
use serde_json::Value;

pub const ACCELERATOR_RESOURCE: &str = "nvidia.com/gpu";

/// Buckets an elapsed duration, truncating to the largest whole unit.
pub fn format_age(total_secs: i64) -> String {
    let secs = total_secs.max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

pub fn parse_age(creation_timestamp: Option<&str>, now: DateTime<Utc>) -> String {
    let ts = match creation_timestamp {
        Some(s) if !s.is_empty() => s,
        _ => return "Unknown".to_string(),
    };

    match DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => format_age((now - dt.to_utc()).num_seconds()),
        Err(_) => "Unknown".to_string(),
    }
}

/// First container's declared request for `resource`, `"0"` when absent.
pub fn resource_request(pod: &Value, resource: &str) -> String {
    let request = pod
        .pointer("/spec/containers/0/resources/requests")
        .and_then(|r| r.get(resource));

    match request {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "0".to_string(),
    }
}

/// Numeric value of a plain accelerator quantity; anything unparseable counts as zero.
pub fn parse_quantity(q: &str) -> f64 {
    q.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}
