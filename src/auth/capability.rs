//! Opaque credential capabilities. The broker only sees these traits; the
//! identity provider's SDK (or a CLI stand-in) lives behind them.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// One notification from an identity prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptEvent {
    /// Signed JWT issued by the identity provider.
    Credential(String),
    Dismissed { reason: Option<String> },
    NotDisplayed { reason: Option<String> },
    Skipped { reason: Option<String> },
}

impl PromptEvent {
    /// Dismissals that precede a credential delivery rather than cancel it.
    pub fn is_credential_handoff(&self) -> bool {
        matches!(
            self,
            PromptEvent::Dismissed { reason: Some(r) }
                if r == "credential_returned" || r == "credential_returned_for_second_factor"
        )
    }
}

#[async_trait]
pub trait IdentityCapability: Send + Sync {
    /// Shows the sign-in prompt. The stream yields notifications until a
    /// credential arrives or the prompt goes away.
    async fn prompt(&self) -> AppResult<BoxStream<'static, PromptEvent>>;
}

/// `prompt` parameter sent with an access-token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Silent when the grant already exists.
    Default,
    Consent,
}

#[derive(Debug, Clone)]
pub struct AccessTokenRequest {
    pub scopes: Vec<String>,
    pub prompt: PromptMode,
    pub login_hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

pub const DEFAULT_ACCESS_LIFETIME_SECS: i64 = 3600;

impl AccessTokenResponse {
    /// `(token, expires_in)` or the error the response stands for.
    pub fn into_grant(self) -> AppResult<(String, i64)> {
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return Err(match error.as_str() {
                "popup_closed" | "access_denied" => AppError::AuthCancelled(error),
                _ => AppError::AuthUnavailable(error),
            });
        }
        let token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::AuthUnavailable("No access token in response".to_string()))?;
        let expires_in = self
            .expires_in
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_ACCESS_LIFETIME_SECS);
        Ok((token, expires_in))
    }
}

#[async_trait]
pub trait AccessCapability: Send + Sync {
    async fn request_access_token(&self, request: AccessTokenRequest) -> AppResult<AccessTokenResponse>;
}

/// Hands out a fixed token, e.g. one supplied through the environment.
pub struct StaticIdentity {
    token: Option<String>,
}

impl StaticIdentity {
    pub fn new(token: Option<String>) -> Self {
        Self { token: token.filter(|t| !t.is_empty()) }
    }

    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }
}

#[async_trait]
impl IdentityCapability for StaticIdentity {
    async fn prompt(&self) -> AppResult<BoxStream<'static, PromptEvent>> {
        let event = match &self.token {
            Some(token) => PromptEvent::Credential(token.clone()),
            None => PromptEvent::NotDisplayed {
                reason: Some("no_identity_token".to_string()),
            },
        };
        Ok(stream::iter(vec![event]).boxed())
    }
}

pub struct StaticAccess {
    token: Option<String>,
    expires_in: i64,
}

impl StaticAccess {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            expires_in: DEFAULT_ACCESS_LIFETIME_SECS,
        }
    }

    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }
}

#[async_trait]
impl AccessCapability for StaticAccess {
    async fn request_access_token(&self, _request: AccessTokenRequest) -> AppResult<AccessTokenResponse> {
        Ok(match &self.token {
            Some(token) => AccessTokenResponse {
                access_token: Some(token.clone()),
                expires_in: Some(self.expires_in),
                error: None,
            },
            None => AccessTokenResponse {
                error: Some("no_access_token".to_string()),
                ..Default::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_parsing() {
        let ok = AccessTokenResponse {
            access_token: Some("ya29".to_string()),
            expires_in: None,
            error: None,
        };
        assert_eq!(ok.into_grant().unwrap(), ("ya29".to_string(), 3600));

        let missing = AccessTokenResponse::default();
        assert_eq!(
            missing.into_grant().unwrap_err(),
            AppError::AuthUnavailable("No access token in response".to_string())
        );

        let closed = AccessTokenResponse {
            error: Some("popup_closed".to_string()),
            ..Default::default()
        };
        assert!(closed.into_grant().unwrap_err().is_cancellation());
    }

    #[test]
    fn test_handoff_dismissal() {
        let handoff = PromptEvent::Dismissed {
            reason: Some("credential_returned".to_string()),
        };
        assert!(handoff.is_credential_handoff());

        let cancel = PromptEvent::Dismissed {
            reason: Some("cancel_called".to_string()),
        };
        assert!(!cancel.is_credential_handoff());
    }
}
