use std::sync::Arc;

use crate::error::AppResult;
use crate::models::PendingSession;
use crate::modules::storage::KeyValueStore;

pub const PENDING_SESSION_KEY: &str = "photopicker.pendingSession";
pub const DEFAULT_MAX_AGE_MS: i64 = 10 * 60 * 1000;

/// Remembers a picking session that continued in a full-page redirect.
pub struct SessionResumptionStore {
    store: Arc<dyn KeyValueStore>,
    max_age_ms: i64,
}

impl SessionResumptionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, max_age_ms: i64) -> Self {
        Self { store, max_age_ms }
    }

    pub fn save(&self, session_id: &str) -> AppResult<()> {
        let pending = PendingSession::new(session_id);
        let value = serde_json::to_string(&pending)?;
        self.store.set(PENDING_SESSION_KEY, &value)?;
        tracing::debug!("[Resume] saved pending session {}", session_id);
        Ok(())
    }

    pub fn load(&self) -> AppResult<Option<PendingSession>> {
        self.load_at(chrono::Utc::now().timestamp_millis())
    }

    /// Expired or unreadable entries are cleared and reported as absent.
    pub fn load_at(&self, now_ms: i64) -> AppResult<Option<PendingSession>> {
        let raw = match self.store.get(PENDING_SESSION_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let pending = match serde_json::from_str::<PendingSession>(&raw) {
            Ok(p) if !p.session_id.is_empty() => p,
            Ok(_) | Err(_) => {
                tracing::warn!("[Resume] discarding unreadable pending session entry");
                self.clear()?;
                return Ok(None);
            }
        };

        if pending.is_expired_at(now_ms, self.max_age_ms) {
            tracing::info!(
                "[Resume] pending session {} expired, discarding",
                pending.session_id
            );
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(pending))
    }

    pub fn clear(&self) -> AppResult<()> {
        self.store.clear(PENDING_SESSION_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::MemoryStore;

    fn store() -> (Arc<MemoryStore>, SessionResumptionStore) {
        let kv = Arc::new(MemoryStore::new());
        let resume = SessionResumptionStore::new(kv.clone(), DEFAULT_MAX_AGE_MS);
        (kv, resume)
    }

    #[test]
    fn test_save_and_load() {
        let (_, resume) = store();
        resume.save("sess-1").unwrap();
        let pending = resume.load().unwrap().unwrap();
        assert_eq!(pending.session_id, "sess-1");
    }

    #[test]
    fn test_older_than_ten_minutes_is_discarded() {
        let (kv, resume) = store();
        let stale = PendingSession {
            session_id: "old".to_string(),
            created_at: 1_000_000,
        };
        kv.set(PENDING_SESSION_KEY, &serde_json::to_string(&stale).unwrap())
            .unwrap();

        let now = 1_000_000 + DEFAULT_MAX_AGE_MS + 1;
        assert!(resume.load_at(now).unwrap().is_none());
        // 过期条目被顺带清除
        assert!(kv.get(PENDING_SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_entry_is_cleared() {
        let (kv, resume) = store();
        kv.set(PENDING_SESSION_KEY, "garbage").unwrap();
        assert!(resume.load().unwrap().is_none());
        assert!(kv.get(PENDING_SESSION_KEY).unwrap().is_none());
    }
}
