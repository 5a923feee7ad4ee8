// 上传管理 / 预签名后端

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::models::{DeleteOutcome, UploadsPage};

#[async_trait]
pub trait UploadsApi: Send + Sync {
    async fn list(&self, id_token: &str, offset: u64, limit: usize) -> AppResult<UploadsPage>;

    async fn delete(&self, id_token: &str, key: &str) -> AppResult<DeleteOutcome>;
}

/// Raw presign response: `{ url }` for PUT, `{ url, fields }` for form POST.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PresignTarget {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fields: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadMethod {
    Put { url: String },
    Post { url: String, fields: BTreeMap<String, String> },
}

impl UploadMethod {
    pub fn label(&self) -> &'static str {
        match self {
            UploadMethod::Put { .. } => "PUT",
            UploadMethod::Post { .. } => "POST",
        }
    }
}

impl PresignTarget {
    pub fn into_method(self) -> AppResult<UploadMethod> {
        let url = self
            .url
            .filter(|u| !u.is_empty())
            .ok_or(AppError::InvalidPresignResponse)?;
        Ok(match self.fields {
            Some(fields) => UploadMethod::Post { url, fields },
            None => UploadMethod::Put { url },
        })
    }
}

#[async_trait]
pub trait PresignApi: Send + Sync {
    async fn presign(&self, id_token: Option<&str>, key: &str, content_type: &str) -> AppResult<PresignTarget>;
}

pub struct HttpUploadsApi {
    http_client: Client,
    endpoint: String,
}

impl HttpUploadsApi {
    pub fn new(http_client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl UploadsApi for HttpUploadsApi {
    async fn list(&self, id_token: &str, offset: u64, limit: usize) -> AppResult<UploadsPage> {
        let resp = self
            .http_client
            .get(&self.endpoint)
            .bearer_auth(id_token)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::http(status, "uploads.list", &body));
        }
        Ok(resp.json().await?)
    }

    async fn delete(&self, id_token: &str, key: &str) -> AppResult<DeleteOutcome> {
        let resp = self
            .http_client
            .delete(&self.endpoint)
            .bearer_auth(id_token)
            .json(&json!({ "key": key }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::http(status, "uploads.delete", &body));
        }
        Ok(resp.json().await?)
    }
}

pub struct HttpPresignApi {
    http_client: Client,
    endpoint: String,
}

impl HttpPresignApi {
    pub fn new(http_client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PresignApi for HttpPresignApi {
    async fn presign(&self, id_token: Option<&str>, key: &str, content_type: &str) -> AppResult<PresignTarget> {
        let mut req = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({ "key": key, "contentType": content_type }));
        if let Some(token) = id_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::http(status, "Presign endpoint", &body));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::collections::HashMap;

    #[test]
    fn test_presign_target_selects_method() {
        let put = PresignTarget {
            url: Some("https://s3/put".to_string()),
            fields: None,
        };
        assert_eq!(
            put.into_method().unwrap(),
            UploadMethod::Put {
                url: "https://s3/put".to_string()
            }
        );

        let post: PresignTarget =
            serde_json::from_str(r#"{"url":"https://s3/bucket","fields":{"key":"k","policy":"p"}}"#).unwrap();
        assert_eq!(post.into_method().unwrap().label(), "POST");

        assert_eq!(
            PresignTarget::default().into_method().unwrap_err(),
            AppError::InvalidPresignResponse
        );
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let app = Router::new().route(
            "/uploads",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(headers.get("authorization").unwrap(), "Bearer id-tok");
                assert_eq!(q.get("limit").map(String::as_str), Some("5"));
                assert_eq!(q.get("offset").map(String::as_str), Some("10"));
                Json(json!({
                    "items": [{ "key": "uploads/a.jpg", "size": 3, "lastModified": "2024-01-02T00:00:00+00:00" }],
                    "count": 1,
                    "total": 11,
                    "nextOffset": null,
                    "hasMore": false
                }))
            })
            .delete(|Json(body): Json<Value>| async move {
                let key = body["key"].as_str().unwrap_or_default().to_string();
                if key.is_empty() {
                    return (StatusCode::BAD_REQUEST, Json(json!({ "error": "key required" })));
                }
                (StatusCode::OK, Json(json!({ "removed": [key] })))
            }),
        );
        let base = serve(app).await;
        let api = HttpUploadsApi::new(Client::new(), format!("{}/uploads", base));

        let page = api.list("id-tok", 10, 5).await.unwrap();
        assert_eq!(page.total, Some(11));
        assert_eq!(page.items[0].key, "uploads/a.jpg");

        let outcome = api.delete("id-tok", "uploads/a.jpg").await.unwrap();
        assert_eq!(outcome.removed, vec!["uploads/a.jpg".to_string()]);

        let err = api.delete("id-tok", "").await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_presign_sends_identity() {
        let app = Router::new().route(
            "/presign",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let authorized = headers.get("authorization").is_some();
                Json(json!({
                    "url": format!("https://s3/{}", body["key"].as_str().unwrap_or_default()),
                    "fields": if authorized { json!({ "ct": body["contentType"] }) } else { Value::Null }
                }))
            }),
        );
        let base = serve(app).await;
        let api = HttpPresignApi::new(Client::new(), format!("{}/presign", base));

        let signed = api.presign(Some("id"), "uploads/x.jpg", "image/jpeg").await.unwrap();
        assert_eq!(signed.url.as_deref(), Some("https://s3/uploads/x.jpg"));
        assert_eq!(
            signed.fields.unwrap().get("ct").map(String::as_str),
            Some("image/jpeg")
        );

        let anonymous = api.presign(None, "k", "image/png").await.unwrap();
        assert!(anonymous.fields.is_none());
    }
}
