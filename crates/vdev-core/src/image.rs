//! Image (project asset store) types
//!
//! Firmware assets fetched during remediation are registered with the
//! service's image store using fixed metadata: type `fwasset`, encoding
//! `plain`, not encapsulated, named after the URL they came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image type tag for firmware assets
pub const FWASSET_TYPE: &str = "fwasset";

/// Encoding used for uploaded firmware assets
pub const PLAIN_ENCODING: &str = "plain";

/// Metadata sent alongside an uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSubmission {
    #[serde(rename = "type")]
    pub kind: String,
    pub encoding: String,
    pub encapsulated: bool,
    pub name: String,
    pub project: String,
}

impl ImageSubmission {
    /// Submission for a firmware asset fetched from `source_url`
    pub fn firmware_asset(project: &str, source_url: &str) -> Self {
        Self {
            kind: FWASSET_TYPE.to_string(),
            encoding: PLAIN_ENCODING.to_string(),
            encapsulated: false,
            name: source_url.to_string(),
            project: project.to_string(),
        }
    }
}

/// Image record returned by the service after upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_asset_submission() {
        let submission = ImageSubmission::firmware_asset("p1", "https://x/fw1");
        assert_eq!(submission.kind, "fwasset");
        assert_eq!(submission.encoding, "plain");
        assert!(!submission.encapsulated);
        assert_eq!(submission.name, "https://x/fw1");
        assert_eq!(submission.project, "p1");

        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["type"], "fwasset");
    }

    #[test]
    fn test_image_record_parse() {
        let record: ImageRecord = serde_json::from_str(
            r#"{"id":"img-1","type":"fwasset","size":4,"createdAt":"2026-01-10T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(record.id, "img-1");
        assert_eq!(record.kind.as_deref(), Some("fwasset"));
        assert_eq!(record.size, Some(4));
        assert!(record.created_at.is_some());
    }
}
