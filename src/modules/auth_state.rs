use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{Credential, CredentialKind, IdentityClaims};
use crate::modules::storage::KeyValueStore;

pub const AUTH_STATE_KEY: &str = "photopicker.authState";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedAuth {
    token: String,
    expires_at: i64,
    #[serde(default)]
    user: IdentityClaims,
}

/// Keeps the identity credential across restarts of the same session scope.
pub struct AuthStateStore {
    store: Arc<dyn KeyValueStore>,
    skew_secs: i64,
}

impl AuthStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>, skew_secs: i64) -> Self {
        Self { store, skew_secs }
    }

    pub fn persist(&self, credential: &Credential) -> AppResult<()> {
        if credential.kind != CredentialKind::Identity {
            return Ok(());
        }
        let state = PersistedAuth {
            token: credential.token.clone(),
            expires_at: credential.expires_at,
            user: credential.claims.clone().unwrap_or_default(),
        };
        self.store
            .set(AUTH_STATE_KEY, &serde_json::to_string(&state)?)
    }

    pub fn restore(&self) -> AppResult<Option<Credential>> {
        self.restore_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn restore_at(&self, now_ms: i64) -> AppResult<Option<Credential>> {
        let Some(raw) = self.store.get(AUTH_STATE_KEY)? else {
            return Ok(None);
        };

        let credential = serde_json::from_str::<PersistedAuth>(&raw)
            .ok()
            .filter(|s| !s.token.is_empty())
            .map(|s| Credential::identity(s.token, s.expires_at, s.user))
            .filter(|c| c.is_fresh_at(now_ms, self.skew_secs));

        if credential.is_none() {
            self.clear()?;
        }
        Ok(credential)
    }

    pub fn clear(&self) -> AppResult<()> {
        self.store.clear(AUTH_STATE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::MemoryStore;

    #[test]
    fn test_restore_fresh_identity() {
        let kv = Arc::new(MemoryStore::new());
        let auth = AuthStateStore::new(kv, 60);
        let claims = IdentityClaims {
            email: Some("a@example.com".to_string()),
            ..Default::default()
        };
        let now = 1_700_000_000_000;
        auth.persist(&Credential::identity("jwt".to_string(), now + 3_600_000, claims))
            .unwrap();

        let restored = auth.restore_at(now).unwrap().unwrap();
        assert_eq!(restored.token, "jwt");
        assert_eq!(restored.email(), Some("a@example.com"));
    }

    #[test]
    fn test_stale_identity_is_cleared() {
        let kv = Arc::new(MemoryStore::new());
        let auth = AuthStateStore::new(kv.clone(), 60);
        let now = 1_700_000_000_000;
        auth.persist(&Credential::identity(
            "jwt".to_string(),
            now + 30_000,
            IdentityClaims::default(),
        ))
        .unwrap();

        assert!(auth.restore_at(now).unwrap().is_none());
        assert!(kv.get(AUTH_STATE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_access_credentials_are_not_persisted() {
        let kv = Arc::new(MemoryStore::new());
        let auth = AuthStateStore::new(kv.clone(), 60);
        auth.persist(&Credential::access("ya29".to_string(), 3600, vec![]))
            .unwrap();
        assert!(kv.get(AUTH_STATE_KEY).unwrap().is_none());
    }
}
