//! Box metadata document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const METADATA_NAME: &str = "metadata.json";

/// `metadata.json` at the root of every box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxMetadata {
    pub provider: String,
    pub format: String,
    pub artifact: String,
    pub os_version: String,
    pub created: DateTime<Utc>,
    /// File name of the disk inside the box.
    pub disk: String,
    pub sha256: String,
}

/// Replace everything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "box".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("golden-2022"), "golden-2022");
        assert_eq!(sanitize_name("Win Server/2022 (core)"), "Win_Server_2022__core_");
        assert_eq!(sanitize_name("  "), "box");
        assert_eq!(sanitize_name(".."), "box");
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = BoxMetadata {
            provider: "hyperv".into(),
            format: "vhdx".into(),
            artifact: "golden-2022".into(),
            os_version: "2022".into(),
            created: Utc::now(),
            disk: "golden-2022.vhdx".into(),
            sha256: "00".into(),
        };
        let value: serde_json::Value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["provider"], "hyperv");
        assert_eq!(value["disk"], "golden-2022.vhdx");
    }
}
