use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::TokenBroker;
use crate::error::{AppError, AppResult};
use crate::models::config::UploadConfig;
use crate::models::{DeleteOutcome, UploadListCursor, UploadRecord, UploadsPage};
use crate::modules::monitor::ActivityLog;
use crate::uploads::client::UploadsApi;

/// Upserts `incoming` into `existing` by key (or replaces the cache when
/// `reset`) and sorts by last-modified descending. Returns the merged list
/// and how many keys were not cached before (the page size on reset).
pub fn merge_uploads(
    existing: &[UploadRecord],
    incoming: Vec<UploadRecord>,
    reset: bool,
) -> (Vec<UploadRecord>, usize) {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, UploadRecord> = HashMap::new();

    if !reset {
        for record in existing.iter().filter(|r| !r.key.is_empty()) {
            if by_key.insert(record.key.clone(), record.clone()).is_none() {
                order.push(record.key.clone());
            }
        }
    }

    let incoming_len = incoming.len();
    let mut fresh = 0;
    for record in incoming.into_iter().filter(|r| !r.key.is_empty()) {
        let key = record.key.clone();
        if by_key.insert(key.clone(), record).is_none() {
            fresh += 1;
            order.push(key);
        }
    }

    let mut merged: Vec<UploadRecord> = order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect();
    // 稳定排序，时间相同的保持原有顺序
    merged.sort_by_key(|r| std::cmp::Reverse(r.timestamp_millis()));

    (merged, if reset { incoming_len } else { fresh })
}

/// Cached upload list plus its pagination cursor and selection.
#[derive(Debug, Default)]
pub struct UploadListState {
    records: Vec<UploadRecord>,
    cursor: UploadListCursor,
    selected: BTreeSet<String>,
    loading: bool,
    fetched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMorePlan {
    /// A fetch is already running.
    Ignored,
    /// Nothing to request; `expanded` cached records became visible.
    Done { expanded: usize },
    Fetch { offset: u64, limit: usize, expanded: usize },
}

impl UploadListState {
    pub fn records(&self) -> &[UploadRecord] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Folds one fetched page into the cache and recomputes the cursor.
    pub fn apply_page(
        &mut self,
        page: UploadsPage,
        offset: u64,
        limit: usize,
        reset_visible: bool,
        initial_visible: usize,
    ) -> usize {
        let incoming_len = page.items.len();
        let previous_visible = self.cursor.visible_count;
        let baseline = if previous_visible == 0 {
            initial_visible
        } else {
            previous_visible
        };
        let resetting = reset_visible || offset == 0;

        let (merged, added) = merge_uploads(&self.records, page.items, resetting);
        self.records = merged;
        let cached = self.records.len();

        self.cursor.visible_count = if resetting {
            let desired = if reset_visible {
                initial_visible.max(baseline.min(cached))
            } else {
                baseline.max(initial_visible)
            };
            cached.min(desired)
        } else {
            cached.min(baseline + added)
        };

        self.fetched = true;
        let valid: HashSet<&str> = self.records.iter().map(|r| r.key.as_str()).collect();
        self.selected.retain(|k| valid.contains(k.as_str()));

        let default_next = offset + incoming_len as u64;
        let computed_next = page.next_offset.unwrap_or(default_next);
        let mut next_offset = computed_next.max(default_next);
        if let Some(total) = self.cursor.total {
            next_offset = next_offset.min(total);
        }
        self.cursor.next_offset = next_offset;

        let mut server_has_more = match page.has_more {
            Some(flag) => flag,
            None => {
                let full = incoming_len == limit && incoming_len > 0;
                match page.total {
                    Some(total) if full => computed_next < total,
                    _ => full,
                }
            }
        };
        // 游标没有前进，避免无限翻页
        if server_has_more && offset > 0 && added == 0 {
            server_has_more = false;
        }

        let next_total = match page.total {
            Some(total) => Some(total),
            None if !server_has_more => Some(cached as u64),
            None => self.cursor.total,
        };
        self.cursor.total = next_total;

        self.cursor.has_more = match next_total {
            Some(total) if cached as u64 >= total => false,
            Some(_) => true,
            None => server_has_more,
        };

        added
    }

    /// Shows cached-but-hidden records first; asks for a fetch only for the rest.
    pub fn plan_load_more(&mut self, page_step: usize) -> LoadMorePlan {
        if self.loading {
            return LoadMorePlan::Ignored;
        }
        let previous = self.cursor.visible_count;
        let desired = previous + page_step;
        let cached = self.records.len();

        let mut expanded = 0;
        if cached > previous {
            let new_visible = cached.min(desired);
            if new_visible > previous {
                self.cursor.visible_count = new_visible;
                expanded = new_visible - previous;
            }
        }

        if self.cursor.visible_count >= desired {
            return LoadMorePlan::Done { expanded };
        }
        if let Some(total) = self.cursor.total {
            if cached as u64 >= total {
                return LoadMorePlan::Done { expanded };
            }
        }

        let need = desired - self.cursor.visible_count;
        let limit = match self.cursor.total {
            Some(total) => need.min((total - cached as u64) as usize),
            None => need,
        };
        if limit == 0 {
            return LoadMorePlan::Done { expanded };
        }

        LoadMorePlan::Fetch {
            offset: self.cursor.next_offset,
            limit,
            expanded,
        }
    }

    /// Drops a record the backend confirmed as deleted.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.key != key);
        self.selected.remove(key);
        let removed = self.records.len() != before;
        if removed {
            self.cursor.total = self.cursor.total.map(|t| t.saturating_sub(1));
            self.cursor.next_offset = self.cursor.next_offset.saturating_sub(1);
            self.cursor.visible_count = self.cursor.visible_count.min(self.records.len());
        }
        removed
    }

    pub fn toggle_selection(&mut self, key: &str, selected: bool) {
        if key.is_empty() {
            return;
        }
        if selected {
            if self.records.iter().any(|r| r.key == key) {
                self.selected.insert(key.to_string());
            }
        } else {
            self.selected.remove(key);
        }
    }

    pub fn selected_keys(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn view(&self) -> UploadListView {
        let cached = self.records.len();
        let visible = self.cursor.visible_count.min(cached);
        let remaining_hidden = cached - visible;
        let remaining_total = self
            .cursor
            .total
            .map(|t| t.saturating_sub(visible as u64));
        UploadListView {
            items: self.records[..visible].to_vec(),
            visible_count: visible,
            cached_count: cached,
            total: self.cursor.total,
            has_more: self.cursor.has_more,
            remaining_hidden,
            remaining_total,
            can_load_more: remaining_hidden > 0
                || self.cursor.has_more
                || remaining_total.is_some_and(|r| r > 0),
            loading: self.loading,
            fetched: self.fetched,
            selected: self.selected_keys(),
        }
    }
}

/// Read-only snapshot for rendering the upload list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadListView {
    pub items: Vec<UploadRecord>,
    pub visible_count: usize,
    pub cached_count: usize,
    pub total: Option<u64>,
    pub has_more: bool,
    pub remaining_hidden: usize,
    pub remaining_total: Option<u64>,
    pub can_load_more: bool,
    pub loading: bool,
    pub fetched: bool,
    pub selected: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkDeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, AppError)>,
}

pub struct UploadListReconciler {
    api: Option<Arc<dyn UploadsApi>>,
    broker: Arc<TokenBroker>,
    state: RwLock<UploadListState>,
    activity: Arc<ActivityLog>,
    initial_visible: usize,
    page_step: usize,
}

impl UploadListReconciler {
    pub fn new(
        api: Option<Arc<dyn UploadsApi>>,
        broker: Arc<TokenBroker>,
        activity: Arc<ActivityLog>,
        settings: &UploadConfig,
    ) -> Self {
        Self {
            api,
            broker,
            state: RwLock::new(UploadListState::default()),
            activity,
            initial_visible: settings.initial_visible.max(1),
            page_step: settings.page_step.max(1),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_some()
    }

    pub async fn view(&self) -> UploadListView {
        self.state.read().await.view()
    }

    fn require_api(&self) -> AppResult<&Arc<dyn UploadsApi>> {
        self.api
            .as_ref()
            .ok_or_else(|| AppError::Config("upload.manage_endpoint is not configured".to_string()))
    }

    /// Fetches `limit` records from `offset` and merges them. Identity
    /// failures abort before any cached state changes.
    pub async fn fetch_page(&self, offset: u64, limit: usize, reset_visible: bool) -> AppResult<()> {
        let api = match self.require_api() {
            Ok(api) => api,
            Err(e) => {
                self.activity.warn(e.to_string()).await;
                return Err(e);
            }
        };
        let identity = match self.broker.ensure_identity(false, true).await {
            Ok(identity) => identity,
            Err(e) => {
                self.activity
                    .error("Sign-in is required to list uploads", &e)
                    .await;
                return Err(e);
            }
        };

        let limit = limit.max(1);
        self.state.write().await.loading = true;
        let result = api.list(&identity.token, offset, limit).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(page) => {
                let resetting = reset_visible || offset == 0;
                let previous_visible = state.cursor.visible_count;
                state.apply_page(page, offset, limit, reset_visible, self.initial_visible);
                let visible = state.cursor.visible_count;
                let known = state.cursor.total.unwrap_or(state.records.len() as u64);
                drop(state);

                self.activity
                    .info(format!("Fetched upload list (showing {} of {})", visible, known))
                    .await;
                if !resetting && visible > previous_visible {
                    tracing::info!(
                        "[Uploads] {} more shown (total {})",
                        visible - previous_visible,
                        visible
                    );
                }
                Ok(())
            }
            Err(e) => {
                drop(state);
                self.activity.error("Failed to fetch upload list", &e).await;
                Err(e)
            }
        }
    }

    /// Back to the first page with the default window.
    pub async fn reload(&self) -> AppResult<()> {
        self.fetch_page(0, self.initial_visible, true).await
    }

    /// Resetting refresh that keeps the current window size.
    pub async fn refresh(&self) -> AppResult<()> {
        let visible = self.state.read().await.cursor.visible_count;
        let limit = visible.max(self.initial_visible);
        self.fetch_page(0, limit, true).await
    }

    pub async fn load_more(&self) -> AppResult<LoadMorePlan> {
        let plan = self.state.write().await.plan_load_more(self.page_step);
        let expanded = match plan {
            LoadMorePlan::Ignored => 0,
            LoadMorePlan::Done { expanded } | LoadMorePlan::Fetch { expanded, .. } => expanded,
        };
        if expanded > 0 {
            self.activity
                .info(format!("Showing {} more cached upload(s)", expanded))
                .await;
        }
        if let LoadMorePlan::Fetch { offset, limit, .. } = plan {
            tracing::info!("[Uploads] fetching up to {} more from offset {}", limit, offset);
            self.fetch_page(offset, limit, false).await?;
        }
        Ok(plan)
    }

    /// Removes `key` from the cache only after the backend confirms.
    pub async fn delete(&self, key: &str) -> AppResult<DeleteOutcome> {
        match self.delete_remote(key).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.activity
                    .error(format!("Failed to delete {}", key), &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn delete_remote(&self, key: &str) -> AppResult<DeleteOutcome> {
        let api = self.require_api()?;
        let identity = self.broker.ensure_identity(false, true).await?;
        let outcome = api.delete(&identity.token, key).await?;

        self.state.write().await.remove(key);
        if let Some(warning) = outcome.warning.as_deref() {
            self.activity
                .warn(format!("Deleted {} with warning: {}", key, warning))
                .await;
        } else {
            self.activity.info(format!("Deleted {}", key)).await;
        }
        Ok(outcome)
    }

    pub async fn toggle_selection(&self, key: &str, selected: bool) {
        self.state.write().await.toggle_selection(key, selected);
    }

    pub async fn selected_keys(&self) -> Vec<String> {
        self.state.read().await.selected_keys()
    }

    /// Deletes every selected key; per-key failures are reported, not fatal.
    pub async fn delete_selected(&self) -> AppResult<BulkDeleteReport> {
        let keys = self.selected_keys().await;
        if keys.is_empty() {
            return Ok(BulkDeleteReport::default());
        }
        self.require_api()?;
        self.broker.ensure_identity(false, true).await?;

        let mut report = BulkDeleteReport::default();
        for key in keys {
            match self.delete(&key).await {
                Ok(_) => report.deleted.push(key),
                Err(e) => report.failed.push((key, e)),
            }
        }

        self.state.write().await.selected.clear();
        if let Err(e) = self.refresh().await {
            tracing::warn!("[Uploads] refresh after delete failed: {}", e);
        }
        Ok(report)
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, records: Vec<UploadRecord>, visible: usize, total: Option<u64>) {
        let mut state = self.state.write().await;
        state.cursor.next_offset = records.len() as u64;
        state.cursor.visible_count = visible;
        state.cursor.total = total;
        state.cursor.has_more = total.map_or(false, |t| t > records.len() as u64);
        state.records = records;
        state.fetched = true;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::broker::tests::{broker_with, test_jwt, CountingAccess, ScriptedIdentity};
    use crate::auth::PromptEvent;
    use crate::modules::monitor::ActivityLevel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    pub(crate) fn record(key: &str, last_modified: &str) -> UploadRecord {
        UploadRecord {
            key: key.to_string(),
            last_modified: Some(last_modified.to_string()),
            ..Default::default()
        }
    }

    fn day(n: u32) -> String {
        format!("2024-01-{:02}T00:00:00+00:00", n)
    }

    /// Backend holding `records` newest-first, paginated by offset.
    #[derive(Default)]
    pub(crate) struct FakeUploadsApi {
        pub records: Mutex<Vec<UploadRecord>>,
        pub list_calls: Mutex<Vec<(u64, usize)>>,
        pub fail_delete: Vec<String>,
        pub deletes: AtomicUsize,
    }

    #[async_trait]
    impl UploadsApi for FakeUploadsApi {
        async fn list(&self, _id_token: &str, offset: u64, limit: usize) -> AppResult<UploadsPage> {
            self.list_calls.lock().unwrap().push((offset, limit));
            let records = self.records.lock().unwrap();
            let total = records.len() as u64;
            let items: Vec<UploadRecord> = records
                .iter()
                .skip(offset as usize)
                .take(limit)
                .cloned()
                .collect();
            let next = offset + items.len() as u64;
            Ok(UploadsPage {
                items,
                total: Some(total),
                next_offset: (next < total).then_some(next),
                has_more: Some(next < total),
            })
        }

        async fn delete(&self, _id_token: &str, key: &str) -> AppResult<DeleteOutcome> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.iter().any(|k| k == key) {
                return Err(AppError::FetchFailed {
                    status: Some(500),
                    message: "boom".to_string(),
                });
            }
            self.records.lock().unwrap().retain(|r| r.key != key);
            Ok(DeleteOutcome {
                removed: vec![key.to_string()],
                warning: None,
            })
        }
    }

    pub(crate) fn reconciler_with(api: Option<Arc<dyn UploadsApi>>, signed_in: bool) -> UploadListReconciler {
        let events = if signed_in {
            vec![PromptEvent::Credential(test_jwt("u@example.com"))]
        } else {
            vec![PromptEvent::Dismissed {
                reason: Some("cancel_called".to_string()),
            }]
        };
        let (broker, _) = broker_with(
            Arc::new(ScriptedIdentity { events }),
            Arc::new(CountingAccess::new(Duration::ZERO)),
        );
        UploadListReconciler::new(
            api,
            Arc::new(broker),
            Arc::new(ActivityLog::default()),
            &UploadConfig::default(),
        )
    }

    #[test]
    fn test_merge_dedupes_and_sorts() {
        let existing = vec![record("a", &day(2)), record("b", &day(1))];
        let incoming = vec![record("b", &day(5)), record("c", &day(3))];
        let (merged, added) = merge_uploads(&existing, incoming, false);
        let keys: Vec<&str> = merged.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
        assert_eq!(added, 1);

        let (reset, added) = merge_uploads(&merged, vec![record("z", &day(1))], true);
        assert_eq!(reset.len(), 1);
        assert_eq!(added, 1);
    }

    #[test]
    fn test_two_page_scenario() {
        let mut state = UploadListState::default();
        let page1: UploadsPage = serde_json::from_str(
            r#"{"items":[{"key":"a","lastModified":"2024-01-02"}],"hasMore":true}"#,
        )
        .unwrap();
        state.apply_page(page1, 0, 5, true, 5);
        assert!(state.cursor.has_more);
        assert_eq!(state.cursor.next_offset, 1);

        let page2: UploadsPage = serde_json::from_str(
            r#"{"items":[{"key":"b","lastModified":"2024-01-03"}],"hasMore":false}"#,
        )
        .unwrap();
        state.apply_page(page2, 1, 5, false, 5);

        let keys: Vec<&str> = state.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(!state.cursor.has_more);
        assert_eq!(state.cursor.total, Some(2));
        assert_eq!(state.cursor.visible_count, 2);
    }

    #[test]
    fn test_non_advancing_page_stops_pagination() {
        let mut state = UploadListState::default();
        state.apply_page(
            UploadsPage {
                items: vec![record("a", &day(2)), record("b", &day(1))],
                has_more: Some(true),
                ..Default::default()
            },
            0,
            2,
            true,
            5,
        );
        assert!(state.cursor.has_more);

        // 服务端仍说还有更多，但返回的都是已缓存的记录
        state.apply_page(
            UploadsPage {
                items: vec![record("b", &day(1))],
                has_more: Some(true),
                ..Default::default()
            },
            2,
            2,
            false,
            5,
        );
        assert!(!state.cursor.has_more);
        assert_eq!(state.records.len(), 2);
    }

    #[test]
    fn test_has_more_false_when_total_reached() {
        let mut state = UploadListState::default();
        state.apply_page(
            UploadsPage {
                items: vec![record("a", &day(2)), record("b", &day(1))],
                total: Some(2),
                has_more: Some(true),
                next_offset: None,
            },
            0,
            2,
            true,
            5,
        );
        assert!(!state.cursor.has_more);

        state.apply_page(
            UploadsPage {
                items: vec![record("c", &day(3))],
                total: Some(4),
                has_more: Some(false),
                next_offset: None,
            },
            0,
            1,
            true,
            5,
        );
        // 已知总数大于缓存数时仍然可以继续加载
        assert!(state.cursor.has_more);
    }

    #[test]
    fn test_inferred_has_more_from_full_page() {
        let mut state = UploadListState::default();
        state.apply_page(
            UploadsPage {
                items: vec![record("a", &day(2)), record("b", &day(1))],
                ..Default::default()
            },
            0,
            2,
            true,
            5,
        );
        assert!(state.cursor.has_more);
        assert_eq!(state.cursor.total, None);

        state.apply_page(
            UploadsPage {
                items: vec![record("c", &day(3))],
                ..Default::default()
            },
            2,
            2,
            false,
            5,
        );
        assert!(!state.cursor.has_more);
        assert_eq!(state.cursor.total, Some(3));
    }

    #[test]
    fn test_reset_visible_window_policy() {
        let mut state = UploadListState::default();
        state.cursor.visible_count = 12;
        let items: Vec<UploadRecord> = (1..=8).map(|d| record(&format!("k{}", d), &day(d))).collect();
        state.apply_page(
            UploadsPage {
                items,
                ..Default::default()
            },
            0,
            20,
            true,
            5,
        );
        // 至少 initial，至多之前的可见数，且不超过缓存数
        assert_eq!(state.cursor.visible_count, 8);
    }

    #[tokio::test]
    async fn test_load_more_served_from_cache_makes_no_request() {
        let api = Arc::new(FakeUploadsApi::default());
        let reconciler = reconciler_with(Some(api.clone()), true);
        let records: Vec<UploadRecord> = (1..=20).rev().map(|d| record(&format!("k{}", d), &day(d))).collect();
        reconciler.seed(records, 5, Some(20)).await;

        let plan = reconciler.load_more().await.unwrap();
        assert_eq!(plan, LoadMorePlan::Done { expanded: 10 });
        assert_eq!(reconciler.view().await.visible_count, 15);
        assert!(api.list_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_more_fetches_remainder() {
        let api = Arc::new(FakeUploadsApi::default());
        *api.records.lock().unwrap() = (1..=20).rev().map(|d| record(&format!("k{}", d), &day(d))).collect();
        let reconciler = reconciler_with(Some(api.clone()), true);

        reconciler.fetch_page(0, 5, true).await.unwrap();
        assert_eq!(reconciler.view().await.visible_count, 5);

        let plan = reconciler.load_more().await.unwrap();
        assert_eq!(
            plan,
            LoadMorePlan::Fetch {
                offset: 5,
                limit: 10,
                expanded: 0
            }
        );
        let view = reconciler.view().await;
        assert_eq!(view.visible_count, 15);
        assert!(view.has_more);
        assert_eq!(view.remaining_total, Some(5));
        assert_eq!(*api.list_calls.lock().unwrap(), vec![(0, 5), (5, 10)]);
    }

    #[tokio::test]
    async fn test_fetch_without_identity_keeps_cache() {
        let api = Arc::new(FakeUploadsApi::default());
        let reconciler = reconciler_with(Some(api.clone()), false);
        reconciler.seed(vec![record("a", &day(1))], 1, Some(1)).await;

        let err = reconciler.fetch_page(0, 5, true).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(reconciler.view().await.cached_count, 1);
        assert!(api.list_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_config_error() {
        let reconciler = reconciler_with(None, true);
        assert!(matches!(
            reconciler.fetch_page(0, 5, true).await,
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_selected_continues_past_failures() {
        let api = Arc::new(FakeUploadsApi {
            fail_delete: vec!["k2".to_string()],
            ..Default::default()
        });
        *api.records.lock().unwrap() = (1..=4).rev().map(|d| record(&format!("k{}", d), &day(d))).collect();
        let reconciler = reconciler_with(Some(api.clone()), true);
        reconciler.fetch_page(0, 5, true).await.unwrap();

        reconciler.toggle_selection("k1", true).await;
        reconciler.toggle_selection("k2", true).await;
        reconciler.toggle_selection("k3", true).await;
        reconciler.toggle_selection("missing", true).await;
        assert_eq!(reconciler.selected_keys().await, vec!["k1", "k2", "k3"]);

        let report = reconciler.delete_selected().await.unwrap();
        assert_eq!(report.deleted, vec!["k1".to_string(), "k3".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(api.deletes.load(Ordering::SeqCst), 3);

        let view = reconciler.view().await;
        let keys: Vec<&str> = view.items.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["k4", "k2"]);
        assert!(view.selected.is_empty());
        assert_eq!(view.total, Some(2));
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_record() {
        let api = Arc::new(FakeUploadsApi {
            fail_delete: vec!["a".to_string()],
            ..Default::default()
        });
        let reconciler = reconciler_with(Some(api), true);
        reconciler.seed(vec![record("a", &day(1))], 1, Some(1)).await;

        assert!(reconciler.delete("a").await.is_err());
        assert_eq!(reconciler.view().await.cached_count, 1);

        let recent = reconciler.activity.recent(5).await;
        assert_eq!(recent[0].level, ActivityLevel::Error);
        assert_eq!(recent[0].message, "Failed to delete a");
    }

    #[tokio::test]
    async fn test_signed_out_delete_is_logged() {
        let api = Arc::new(FakeUploadsApi::default());
        let reconciler = reconciler_with(Some(api.clone()), false);
        reconciler.seed(vec![record("a", &day(1))], 1, Some(1)).await;

        assert!(reconciler.delete("a").await.is_err());
        assert_eq!(api.deletes.load(Ordering::SeqCst), 0);
        let recent = reconciler.activity.recent(5).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].level, ActivityLevel::Error);
    }
}
