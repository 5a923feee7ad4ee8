// Picker 会话后端 (sessions / mediaItems)

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::json;
use url::Url;

use crate::error::{AppError, AppResult};
use crate::models::{MediaItemsPage, PickerSession};

#[async_trait]
pub trait PickerApi: Send + Sync {
    async fn create_session(&self, access_token: &str, max_item_count: u32) -> AppResult<PickerSession>;

    async fn get_session(&self, access_token: &str, session_id: &str) -> AppResult<PickerSession>;

    async fn list_media_items(
        &self,
        access_token: &str,
        session_id: &str,
        page_token: Option<&str>,
    ) -> AppResult<MediaItemsPage>;

    /// A session that is already gone (404) counts as deleted.
    async fn delete_session(&self, access_token: &str, session_id: &str) -> AppResult<()>;
}

pub struct HttpPickerApi {
    http_client: Client,
    base_url: String,
}

impl HttpPickerApi {
    pub fn new(http_client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Config(format!("invalid picker base url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("picker base url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl PickerApi for HttpPickerApi {
    async fn create_session(&self, access_token: &str, max_item_count: u32) -> AppResult<PickerSession> {
        let url = self.endpoint(&["sessions"])?;
        let resp = self
            .http_client
            .post(url)
            .bearer_auth(access_token)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&json!({ "pickingConfig": { "maxItemCount": max_item_count } }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::SessionCreateFailed {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn get_session(&self, access_token: &str, session_id: &str) -> AppResult<PickerSession> {
        let url = self.endpoint(&["sessions", session_id])?;
        let resp = self.http_client.get(url).bearer_auth(access_token).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::http(status, "sessions.get", &body));
        }
        Ok(resp.json().await?)
    }

    async fn list_media_items(
        &self,
        access_token: &str,
        session_id: &str,
        page_token: Option<&str>,
    ) -> AppResult<MediaItemsPage> {
        let mut url = self.endpoint(&["mediaItems"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("sessionId", session_id);
            if let Some(token) = page_token.filter(|t| !t.is_empty()) {
                query.append_pair("pageToken", token);
            }
        }
        let resp = self.http_client.get(url).bearer_auth(access_token).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::http(status, "mediaItems.list", &body));
        }
        Ok(resp.json().await?)
    }

    async fn delete_session(&self, access_token: &str, session_id: &str) -> AppResult<()> {
        if session_id.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&["sessions", session_id])?;
        let resp = self
            .http_client
            .delete(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AppError::http(status, "sessions.delete", &body))
    }
}
