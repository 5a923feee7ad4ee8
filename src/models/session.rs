use serde::{Deserialize, Serialize};

/// Server-driven polling parameters, both as duration strings such as `"3s"` or `"1.5s"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingConfig {
    #[serde(default)]
    pub poll_interval: Option<String>,
    #[serde(default)]
    pub timeout_in: Option<String>,
}

/// 外部 Picker 会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerSession {
    pub id: String,
    #[serde(default)]
    pub picker_uri: Option<String>,
    #[serde(default)]
    pub polling_config: Option<PollingConfig>,
    #[serde(default)]
    pub media_items_set: bool,
}

impl PickerSession {
    pub fn is_ready(&self) -> bool {
        self.media_items_set
    }

    pub fn poll_interval(&self) -> Option<&str> {
        self.polling_config
            .as_ref()
            .and_then(|c| c.poll_interval.as_deref())
    }

    pub fn timeout_in(&self) -> Option<&str> {
        self.polling_config.as_ref().and_then(|c| c.timeout_in.as_deref())
    }
}

/// A picking session that had to continue in a full-page redirect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSession {
    pub session_id: String,
    /// unix millis
    pub created_at: i64,
}

impl PendingSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_expired_at(&self, now_ms: i64, max_age_ms: i64) -> bool {
        now_ms - self.created_at > max_age_ms
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedMediaItem {
    pub id: String,
    #[serde(default)]
    pub media_file: Option<MediaFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemsPage {
    #[serde(default)]
    pub media_items: Vec<PickedMediaItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_wire_format() {
        let session: PickerSession = serde_json::from_str(
            r#"{
                "id": "abc",
                "pickerUri": "https://photos.example/picker/abc",
                "pollingConfig": { "pollInterval": "5s", "timeoutIn": "1799.5s" }
            }"#,
        )
        .unwrap();
        assert!(!session.is_ready());
        assert_eq!(session.poll_interval(), Some("5s"));
        assert_eq!(session.timeout_in(), Some("1799.5s"));
    }

    #[test]
    fn test_pending_session_expiry() {
        let pending = PendingSession {
            session_id: "s1".to_string(),
            created_at: 0,
        };
        assert!(!pending.is_expired_at(600_000, 600_000));
        assert!(pending.is_expired_at(600_001, 600_000));
    }
}
