//! TLD risk table
//!
//! JSON object of TLD suffix -> risk score. Keys may be written with or
//! without the leading dot; scores are clamped to `0..=MAX_TLD_RISK`.

use serde_json::{Map, Value};
use tg_core::classify::MAX_TLD_RISK;

pub fn parse_tld_risk(text: &str) -> Result<Vec<(String, u8)>, serde_json::Error> {
    let raw: Map<String, Value> = serde_json::from_str(text)?;
    let mut entries = Vec::with_capacity(raw.len());

    for (key, value) in raw {
        let Some(tld) = normalize_tld(&key) else {
            log::debug!("skipping invalid TLD key '{key}'");
            continue;
        };
        let Some(risk) = value.as_f64() else {
            log::debug!("skipping non-numeric risk for '{key}'");
            continue;
        };
        entries.push((tld, clamp_risk(risk)));
    }

    Ok(entries)
}

fn normalize_tld(key: &str) -> Option<String> {
    let trimmed = key.trim().trim_start_matches('.');
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.') {
        return None;
    }
    Some(format!(".{}", trimmed.to_ascii_lowercase()))
}

fn clamp_risk(risk: f64) -> u8 {
    if risk.is_nan() || risk <= 0.0 {
        return 0;
    }
    risk.round().min(f64::from(MAX_TLD_RISK)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_normalized_and_clamped() {
        let mut entries = parse_tld_risk(r#"{".XYZ": 8, "top": 6, ".zip": 42, ".ok": -3, ".bad key": 5}"#)
            .expect("parse");
        entries.sort();
        assert_eq!(
            entries,
            vec![
                (".ok".to_string(), 0),
                (".top".to_string(), 6),
                (".xyz".to_string(), 8),
                (".zip".to_string(), 10),
            ]
        );
    }

    #[test]
    fn test_non_numeric_values_skipped() {
        let entries = parse_tld_risk(r#"{".xyz": "high", ".top": 6.4}"#).expect("parse");
        assert_eq!(entries, vec![(".top".to_string(), 6)]);
    }

    #[test]
    fn test_not_an_object() {
        assert!(parse_tld_risk("[1, 2]").is_err());
    }
}
