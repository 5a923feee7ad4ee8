//! Byte transfer: downloads of picked media and presigned PUT / form POST
//! uploads with byte-level progress.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, multipart, Client};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult};

/// Receives upload progress as a percentage.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait Transfer: Send + Sync {
    async fn download(&self, url: &str) -> AppResult<Blob>;

    async fn put(&self, url: &str, body: Bytes, content_type: &str, progress: ProgressFn) -> AppResult<()>;

    /// Form fields first, then the file as `file`.
    async fn post_form(
        &self,
        url: &str,
        fields: &BTreeMap<String, String>,
        body: Bytes,
        filename: &str,
        content_type: &str,
        progress: ProgressFn,
    ) -> AppResult<()>;
}

pub struct HttpTransfer {
    http_client: Client,
}

impl HttpTransfer {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Streams `bytes` in chunks, reporting progress as each chunk is handed to the connection.
fn progress_body(bytes: Bytes, progress: ProgressFn) -> reqwest::Body {
    let total = bytes.len();
    let stream = async_stream::stream! {
        let mut offset = 0usize;
        while offset < total {
            let end = (offset + CHUNK_SIZE).min(total);
            let chunk = bytes.slice(offset..end);
            offset = end;
            progress(percent(offset, total));
            yield Ok::<Bytes, std::io::Error>(chunk);
        }
    };
    reqwest::Body::wrap_stream(stream)
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn download(&self, url: &str) -> AppResult<Blob> {
        let resp = self.http_client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::http(status, "Download", ""));
        }
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;
        Ok(Blob { bytes, content_type })
    }

    async fn put(&self, url: &str, body: Bytes, content_type: &str, progress: ProgressFn) -> AppResult<()> {
        let len = body.len();
        let resp = self
            .http_client
            .put(url)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, len)
            .body(progress_body(body, progress))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::http(status, "PUT", &text));
        }
        Ok(())
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &BTreeMap<String, String>,
        body: Bytes,
        filename: &str,
        content_type: &str,
        progress: ProgressFn,
    ) -> AppResult<()> {
        let len = body.len() as u64;
        let mut form = multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        let file = multipart::Part::stream_with_length(progress_body(body, progress), len)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        form = form.part("file", file);

        let resp = self.http_client.post(url).multipart(form).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::http(status, "POST", &text));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::Router;
    use std::sync::Mutex;

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Arc::new(move |p| sink.lock().unwrap().push(p)), seen)
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
    }

    #[tokio::test]
    async fn test_put_reports_progress() {
        let app = Router::new().route(
            "/obj",
            put(|headers: HeaderMap, body: Bytes| async move {
                assert_eq!(headers.get("content-type").unwrap(), "image/jpeg");
                if body.len() == 200_000 {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        );
        let base = serve(app).await;
        let transfer = HttpTransfer::new(Client::new());
        let (progress, seen) = recorder();

        transfer
            .put(
                &format!("{}/obj", base),
                Bytes::from(vec![7u8; 200_000]),
                "image/jpeg",
                progress,
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 4);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100);
    }

    #[tokio::test]
    async fn test_post_form_sends_fields_and_file() {
        let app = Router::new().route(
            "/bucket",
            post(|body: Bytes| async move {
                let text = String::from_utf8_lossy(&body).to_string();
                let key_at = text.find("name=\"key\"");
                let file_at = text.find("name=\"file\"");
                match (key_at, file_at) {
                    (Some(k), Some(f)) if k < f && text.contains("PIXELS") => StatusCode::NO_CONTENT,
                    _ => StatusCode::BAD_REQUEST,
                }
            }),
        );
        let base = serve(app).await;
        let transfer = HttpTransfer::new(Client::new());
        let (progress, seen) = recorder();
        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), "uploads/x.jpg".to_string());
        fields.insert("policy".to_string(), "abc".to_string());

        transfer
            .post_form(
                &format!("{}/bucket", base),
                &fields,
                Bytes::from_static(b"PIXELS"),
                "x.jpg",
                "image/jpeg",
                progress,
            )
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn test_download_error_carries_status() {
        let app = Router::new().route("/media", get(|| async { StatusCode::UNAUTHORIZED }));
        let base = serve(app).await;
        let transfer = HttpTransfer::new(Client::new());

        let err = transfer.download(&format!("{}/media", base)).await.unwrap_err();
        assert!(err.is_unauthorized());
    }
}
