use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};

use crate::error::AppError;

pub const DEFAULT_MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: i64,
    pub level: ActivityLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// User-visible status channel. Newest entry first.
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityEntry>>,
    max_entries: usize,
    sender: broadcast::Sender<ActivityEntry>,
}

impl ActivityLog {
    pub fn new(max_entries: usize) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_entries)),
            max_entries,
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEntry> {
        self.sender.subscribe()
    }

    pub async fn record(&self, level: ActivityLevel, message: impl Into<String>, detail: Option<String>) {
        let entry = ActivityEntry {
            timestamp: chrono::Utc::now().timestamp_millis(),
            level,
            message: message.into(),
            detail,
        };

        match (level, entry.detail.as_deref()) {
            (ActivityLevel::Info, None) => tracing::info!("{}", entry.message),
            (ActivityLevel::Info, Some(d)) => tracing::info!("{} {}", entry.message, d),
            (ActivityLevel::Warn, None) => tracing::warn!("{}", entry.message),
            (ActivityLevel::Warn, Some(d)) => tracing::warn!("{} {}", entry.message, d),
            (ActivityLevel::Error, None) => tracing::error!("{}", entry.message),
            (ActivityLevel::Error, Some(d)) => tracing::error!("{} {}", entry.message, d),
        }

        {
            let mut entries = self.entries.write().await;
            if entries.len() >= self.max_entries {
                entries.pop_back();
            }
            entries.push_front(entry.clone());
        }

        // 没有订阅者时发送失败是正常的
        let _ = self.sender.send(entry);
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Info, message, None).await;
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Warn, message, None).await;
    }

    pub async fn error(&self, message: impl Into<String>, err: &AppError) {
        self.record(ActivityLevel::Error, message, Some(err.to_string()))
            .await;
    }

    pub async fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        self.entries.read().await.iter().take(limit).cloned().collect()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ring_buffer_keeps_newest() {
        let log = ActivityLog::new(3);
        for i in 0..5 {
            log.info(format!("entry {}", i)).await;
        }
        let recent = log.recent(10).await;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "entry 4");
        assert_eq!(recent[2].message, "entry 2");
    }

    #[tokio::test]
    async fn test_subscribers_receive_entries() {
        let log = ActivityLog::default();
        let mut rx = log.subscribe();
        log.error("Upload failed", &AppError::InvalidPresignResponse).await;

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.level, ActivityLevel::Error);
        assert_eq!(entry.detail.as_deref(), Some("Invalid presign response"));
    }
}
