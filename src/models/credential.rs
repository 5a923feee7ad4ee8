use serde::{Deserialize, Serialize};

/// 默认提前 60 秒视为过期，避免即将使用时 token 刚好失效
pub const DEFAULT_FRESHNESS_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Identity,
    Access,
}

/// Claims carried by an identity credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub kind: CredentialKind,
    pub token: String,
    /// Absolute expiry, unix millis.
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<IdentityClaims>,
}

impl Credential {
    pub fn identity(token: String, expires_at: i64, claims: IdentityClaims) -> Self {
        Self {
            kind: CredentialKind::Identity,
            token,
            expires_at,
            scopes: Vec::new(),
            claims: Some(claims),
        }
    }

    pub fn access(token: String, expires_in_secs: i64, scopes: Vec<String>) -> Self {
        let expires_at = chrono::Utc::now()
            .timestamp_millis()
            .saturating_add(expires_in_secs.saturating_mul(1000));
        Self {
            kind: CredentialKind::Access,
            token,
            expires_at,
            scopes,
            claims: None,
        }
    }

    /// Fresh iff `now < expiry - skew`.
    pub fn is_fresh_at(&self, now_ms: i64, skew_secs: i64) -> bool {
        now_ms < self.expires_at.saturating_sub(skew_secs.saturating_mul(1000))
    }

    pub fn is_fresh(&self, skew_secs: i64) -> bool {
        self.is_fresh_at(chrono::Utc::now().timestamp_millis(), skew_secs)
    }

    pub fn email(&self) -> Option<&str> {
        self.claims.as_ref().and_then(|c| c.email.as_deref())
    }
}
