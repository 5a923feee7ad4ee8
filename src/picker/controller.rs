use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::auth::TokenBroker;
use crate::error::{AppError, AppResult};
use crate::models::config::PickerConfig;
use crate::models::{Item, PickedMediaItem, PickerSession};
use crate::modules::monitor::ActivityLog;
use crate::modules::resume::SessionResumptionStore;
use crate::picker::client::PickerApi;
use crate::picker::duration::parse_duration_ms;
use crate::picker::presenter::{Presenter, Shown};
use crate::workspace::SharedWorkingSet;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PickerPhase {
    Idle,
    Creating,
    AwaitingSelection,
    Polling,
    Ready,
    Consuming,
    Resuming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// `added` remote items replaced the previous remote set; `total` is the working-set size.
    Picked { added: usize, total: usize },
    /// Picking continues in a full-page redirect; the session was saved for resumption.
    NavigatedAway { session_id: String },
}

/// Drives one picking session at a time: create, present, poll, consume, delete.
pub struct PickerSessionController {
    api: Arc<dyn PickerApi>,
    broker: Arc<TokenBroker>,
    presenter: Presenter,
    resume: Arc<SessionResumptionStore>,
    items: SharedWorkingSet,
    activity: Arc<ActivityLog>,
    settings: PickerConfig,
    flow: Mutex<()>,
    phase: watch::Sender<PickerPhase>,
}

impl PickerSessionController {
    pub fn new(
        api: Arc<dyn PickerApi>,
        broker: Arc<TokenBroker>,
        presenter: Presenter,
        resume: Arc<SessionResumptionStore>,
        items: SharedWorkingSet,
        activity: Arc<ActivityLog>,
        settings: PickerConfig,
    ) -> Self {
        let (phase, _) = watch::channel(PickerPhase::Idle);
        Self {
            api,
            broker,
            presenter,
            resume,
            items,
            activity,
            settings,
            flow: Mutex::new(()),
            phase,
        }
    }

    pub fn phase(&self) -> PickerPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: PickerPhase) {
        self.phase.send_replace(phase);
    }

    /// Runs a full picking flow. Fails fast with [`AppError::PickerBusy`]
    /// while another flow (or a resumption) is running.
    pub async fn pick(&self) -> AppResult<PickOutcome> {
        let _flow = self.flow.try_lock().map_err(|_| AppError::PickerBusy)?;

        let mut session_id: Option<String> = None;
        let result = self.run_pick(&mut session_id).await;
        if let Err(e) = &result {
            self.activity.error("Picker flow failed", e).await;
        }

        if let Some(id) = session_id {
            self.cleanup_session(&id).await;
        }
        self.set_phase(PickerPhase::Idle);
        result
    }

    async fn run_pick(&self, session_id: &mut Option<String>) -> AppResult<PickOutcome> {
        let pre_opened = self.presenter.prepare();

        self.set_phase(PickerPhase::Creating);
        let max_items = self.settings.max_item_count;
        let api = &self.api;
        let session = self
            .broker
            .with_access(|token| async move { api.create_session(&token, max_items).await })
            .await?;
        *session_id = Some(session.id.clone());
        self.activity
            .info(format!("Picker session created ({})", session.id))
            .await;

        if let Some(uri) = session.picker_uri.as_deref().filter(|u| !u.is_empty()) {
            self.set_phase(PickerPhase::AwaitingSelection);
            if let Shown::NeedsRedirect { popup_blocked } = self.presenter.show(pre_opened, uri) {
                self.resume.save(&session.id)?;
                if popup_blocked {
                    self.activity
                        .warn("Popup blocked; continuing the picker in this page")
                        .await;
                } else {
                    self.activity.info("Navigating to the picker").await;
                }
                self.presenter.redirect(uri);
                return Ok(PickOutcome::NavigatedAway {
                    session_id: session.id,
                });
            }
        }

        let ready = self.poll_until_ready(&session).await?;
        let outcome = self.consume(&ready.id).await?;
        self.resume.clear()?;
        Ok(outcome)
    }

    /// Re-enters an interrupted flow at polling if a pending session exists.
    pub async fn resume_pending(&self) -> AppResult<Option<PickOutcome>> {
        let Some(pending) = self.resume.load()? else {
            return Ok(None);
        };
        let _flow = self.flow.try_lock().map_err(|_| AppError::PickerBusy)?;

        self.set_phase(PickerPhase::Resuming);
        self.activity
            .info(format!("Resuming picker session {}", pending.session_id))
            .await;

        let result = self.run_resume(&pending.session_id).await;
        if let Err(e) = &result {
            self.activity
                .error("Failed to resume the previous picker session", e)
                .await;
            if let Err(clear_err) = self.resume.clear() {
                tracing::warn!("[Picker] failed to clear pending session: {}", clear_err);
            }
        }
        self.set_phase(PickerPhase::Idle);
        result.map(Some)
    }

    async fn run_resume(&self, session_id: &str) -> AppResult<PickOutcome> {
        let api = &self.api;
        let session = self
            .broker
            .with_access(|token| async move { api.get_session(&token, session_id).await })
            .await?;

        let ready = if session.is_ready() {
            session
        } else {
            self.poll_until_ready(&session).await?
        };

        let outcome = self.consume(&ready.id).await?;
        self.resume.clear()?;
        self.delete_session(&ready.id).await;
        Ok(outcome)
    }

    /// Polls until the item set is finalized. Interval and timeout are re-read
    /// from every response; a timeout of zero disables the limit.
    async fn poll_until_ready(&self, session: &PickerSession) -> AppResult<PickerSession> {
        self.set_phase(PickerPhase::Polling);
        let default_interval = self.settings.default_poll_interval_ms;
        let mut timeout_ms = parse_duration_ms(session.timeout_in(), self.settings.default_timeout_ms);
        let started = Instant::now();
        let api = &self.api;
        let id = session.id.as_str();

        loop {
            let current = self
                .broker
                .with_access(|token| async move { api.get_session(&token, id).await })
                .await?;
            if current.is_ready() {
                self.set_phase(PickerPhase::Ready);
                self.activity.info("Picker session completed").await;
                return Ok(current);
            }

            let interval_ms = parse_duration_ms(current.poll_interval(), default_interval);
            timeout_ms = parse_duration_ms(current.timeout_in(), timeout_ms);

            tokio::time::sleep(Duration::from_millis(interval_ms)).await;

            if timeout_ms > 0 && started.elapsed() >= Duration::from_millis(timeout_ms) {
                return Err(AppError::SessionTimeout);
            }
        }
    }

    async fn list_all(&self, session_id: &str) -> AppResult<Vec<PickedMediaItem>> {
        let api = &self.api;
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token_ref = page_token.as_deref();
            let page = self
                .broker
                .with_access(|token| async move {
                    api.list_media_items(&token, session_id, token_ref).await
                })
                .await?;
            all.extend(page.media_items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(all),
            }
        }
    }

    async fn consume(&self, session_id: &str) -> AppResult<PickOutcome> {
        self.set_phase(PickerPhase::Consuming);
        let picked = self.list_all(session_id).await?;
        let remote: Vec<Item> = picked.into_iter().map(map_picked_item).collect();

        let (added, total) = {
            let mut set = self.items.write().await;
            let added = set.replace_remote(remote);
            (added, set.len())
        };
        self.activity
            .info(format!("Picked {} item(s) (total {})", added, total))
            .await;
        Ok(PickOutcome::Picked { added, total })
    }

    /// Deletes the session unless a pending redirect still refers to it.
    async fn cleanup_session(&self, session_id: &str) {
        match self.resume.load() {
            Ok(Some(pending)) if pending.session_id == session_id => {
                tracing::debug!("[Picker] keeping session {} for resumption", session_id);
                return;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("[Picker] failed to read pending session: {}", e),
        }
        if self.broker.current_access().is_none() {
            return;
        }
        self.delete_session(session_id).await;
    }

    async fn delete_session(&self, session_id: &str) {
        let api = &self.api;
        let result = self
            .broker
            .with_access(|token| async move { api.delete_session(&token, session_id).await })
            .await;
        if let Err(e) = result {
            let err = AppError::SessionDeleteFailed(e.to_string());
            self.activity
                .record(
                    crate::modules::monitor::ActivityLevel::Warn,
                    "Failed to delete picker session",
                    Some(err.to_string()),
                )
                .await;
        }
    }
}

fn map_picked_item(item: PickedMediaItem) -> Item {
    let media = item.media_file.unwrap_or_default();
    let filename = media
        .filename
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| format!("{}.jpg", item.id));
    let mime_type = media
        .mime_type
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
    Item::remote(item.id, media.base_url.unwrap_or_default(), filename, mime_type)
}
