use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One object listed by the upload-management backend. `key` is the merge identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_url: Option<String>,
}

impl UploadRecord {
    /// Sort key: last-modified as unix millis, 0 when missing or unparseable.
    pub fn timestamp_millis(&self) -> i64 {
        self.last_modified
            .as_deref()
            .and_then(parse_timestamp_millis)
            .unwrap_or(0)
    }
}

fn parse_timestamp_millis(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// `GET /uploads?limit&offset` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadsPage {
    #[serde(default)]
    pub items: Vec<UploadRecord>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub next_offset: Option<u64>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// `DELETE /uploads` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

/// Pagination cursor of the upload list. Mutated only by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadListCursor {
    pub next_offset: u64,
    pub has_more: bool,
    pub total: Option<u64>,
    pub visible_count: usize,
}
