use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::auth::capability::{AccessCapability, AccessTokenRequest, IdentityCapability, PromptEvent, PromptMode};
use crate::auth::jwt;
use crate::error::{AppError, AppResult};
use crate::models::config::AuthConfig;
use crate::models::Credential;
use crate::modules::auth_state::AuthStateStore;
use crate::workspace::SharedWorkingSet;

type AccessFuture = Shared<BoxFuture<'static, AppResult<Credential>>>;

#[derive(Default)]
struct BrokerState {
    identity: Option<Credential>,
    access: Option<Credential>,
    access_in_flight: Option<AccessFuture>,
}

/// 释放 identity 单槽位
struct PendingSlot(Arc<AtomicBool>);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the identity and access credentials.
///
/// Access acquisition is single-flight: concurrent callers await the same
/// request. Identity acquisition has a single pending slot and a second
/// caller fails with [`AppError::AuthBusy`].
pub struct TokenBroker {
    identity_cap: Arc<dyn IdentityCapability>,
    access_cap: Arc<dyn AccessCapability>,
    state: Arc<Mutex<BrokerState>>,
    identity_pending: Arc<AtomicBool>,
    items: SharedWorkingSet,
    auth_state: Option<Arc<AuthStateStore>>,
    scopes: Vec<String>,
    skew_secs: i64,
    identity_fallback_secs: i64,
}

impl TokenBroker {
    pub fn new(
        identity_cap: Arc<dyn IdentityCapability>,
        access_cap: Arc<dyn AccessCapability>,
        items: SharedWorkingSet,
        scopes: Vec<String>,
        settings: &AuthConfig,
    ) -> Self {
        Self {
            identity_cap,
            access_cap,
            state: Arc::new(Mutex::new(BrokerState::default())),
            identity_pending: Arc::new(AtomicBool::new(false)),
            items,
            auth_state: None,
            scopes,
            skew_secs: settings.freshness_skew_secs,
            identity_fallback_secs: settings.identity_fallback_lifetime_secs,
        }
    }

    pub fn with_auth_state(mut self, auth_state: Arc<AuthStateStore>) -> Self {
        self.auth_state = Some(auth_state);
        self
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds the identity credential from the persisted auth state, if fresh.
    pub fn restore_identity(&self) -> Option<Credential> {
        let store = self.auth_state.as_ref()?;
        match store.restore() {
            Ok(Some(credential)) => {
                tracing::info!(
                    "[TokenBroker] restored sign-in for {}",
                    credential.email().unwrap_or("<unknown>")
                );
                self.lock().identity = Some(credential.clone());
                Some(credential)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("[TokenBroker] failed to restore auth state: {}", e);
                None
            }
        }
    }

    pub fn current_identity(&self) -> Option<Credential> {
        self.lock().identity.clone()
    }

    pub fn current_access(&self) -> Option<Credential> {
        self.lock().access.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().access.as_ref().map(|c| c.token.clone())
    }

    pub async fn ensure_identity(&self, force_refresh: bool, allow_prompt: bool) -> AppResult<Credential> {
        if !force_refresh {
            if let Some(credential) = self.lock().identity.as_ref() {
                if credential.is_fresh(self.skew_secs) {
                    return Ok(credential.clone());
                }
            }
        }
        if !force_refresh && !allow_prompt {
            return Err(AppError::AuthUnavailable("sign-in required".to_string()));
        }

        if self
            .identity_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::AuthBusy);
        }
        let _slot = PendingSlot(self.identity_pending.clone());

        let mut events = self.identity_cap.prompt().await?;
        while let Some(event) = events.next().await {
            if event.is_credential_handoff() {
                continue;
            }
            match event {
                PromptEvent::Credential(token) => {
                    let credential = jwt::identity_credential(token, self.identity_fallback_secs);
                    self.lock().identity = Some(credential.clone());
                    if let Some(store) = &self.auth_state {
                        if let Err(e) = store.persist(&credential) {
                            tracing::warn!("[TokenBroker] failed to persist auth state: {}", e);
                        }
                    }
                    tracing::info!("Identity token acquired");
                    return Ok(credential);
                }
                PromptEvent::Dismissed { reason }
                | PromptEvent::NotDisplayed { reason }
                | PromptEvent::Skipped { reason } => {
                    return Err(AppError::AuthCancelled(
                        reason.unwrap_or_else(|| "prompt dismissed".to_string()),
                    ));
                }
            }
        }
        Err(AppError::AuthCancelled("prompt closed".to_string()))
    }

    pub async fn ensure_access(&self, force_consent: bool) -> AppResult<Credential> {
        let pending = {
            let mut state = self.lock();
            if !force_consent {
                if let Some(credential) = state.access.as_ref() {
                    if credential.is_fresh(self.skew_secs) {
                        return Ok(credential.clone());
                    }
                }
            }
            match &state.access_in_flight {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let request = AccessTokenRequest {
                        scopes: self.scopes.clone(),
                        prompt: if force_consent {
                            PromptMode::Consent
                        } else {
                            PromptMode::Default
                        },
                        login_hint: state
                            .identity
                            .as_ref()
                            .and_then(|c| c.email())
                            .map(str::to_string),
                    };
                    let fut = acquire_access(
                        self.access_cap.clone(),
                        self.state.clone(),
                        self.items.clone(),
                        request,
                    )
                    .boxed()
                    .shared();
                    state.access_in_flight = Some(fut.clone());
                    fut
                }
            }
        };
        pending.await
    }

    /// Runs `op` with a fresh access token. When it fails and `retry_if`
    /// accepts the error, forces a new token and retries exactly once.
    pub async fn with_access_retry_on<T, F, Fut, R>(&self, op: F, retry_if: R) -> AppResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = AppResult<T>>,
        R: Fn(&AppError) -> bool,
    {
        let credential = self.ensure_access(false).await?;
        match op(credential.token).await {
            Err(e) if retry_if(&e) => {
                tracing::info!("[TokenBroker] {} - refreshing access token and retrying once", e);
                let refreshed = self.ensure_access(true).await?;
                op(refreshed.token).await
            }
            other => other,
        }
    }

    /// [`Self::with_access_retry_on`] for 401 responses.
    pub async fn with_access<T, F, Fut>(&self, op: F) -> AppResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.with_access_retry_on(op, AppError::is_unauthorized).await
    }
}

async fn acquire_access(
    capability: Arc<dyn AccessCapability>,
    state: Arc<Mutex<BrokerState>>,
    items: SharedWorkingSet,
    request: AccessTokenRequest,
) -> AppResult<Credential> {
    let scopes = request.scopes.clone();
    let outcome = match capability.request_access_token(request).await {
        Ok(response) => response.into_grant(),
        Err(e) => Err(e),
    };

    let credential = {
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.access_in_flight = None;
        let (token, expires_in) = outcome?;
        let credential = Credential::access(token, expires_in, scopes);
        guard.access = Some(credential.clone());
        credential
    };

    tracing::info!("Picker API access token acquired");
    items
        .write()
        .await
        .refresh_media_urls(Some(credential.token.as_str()));
    Ok(credential)
}
