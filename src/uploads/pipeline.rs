//! Sequential upload of every pending working-set item to object storage.

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::auth::TokenBroker;
use crate::error::{AppError, AppResult};
use crate::models::config::UploadConfig;
use crate::models::UploadStatus;
use crate::modules::monitor::ActivityLog;
use crate::uploads::client::{PresignApi, UploadMethod};
use crate::uploads::keys;
use crate::uploads::reconciler::UploadListReconciler;
use crate::uploads::transfer::{Blob, ProgressFn, Transfer};
use crate::workspace::{PendingSource, PendingUpload, SharedWorkingSet};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
    pub refreshed: bool,
}

pub struct UploadPipeline {
    broker: Arc<TokenBroker>,
    presign: Option<Arc<dyn PresignApi>>,
    transfer: Arc<dyn Transfer>,
    reconciler: Arc<UploadListReconciler>,
    items: SharedWorkingSet,
    activity: Arc<ActivityLog>,
    key_prefix: String,
}

impl UploadPipeline {
    pub fn new(
        broker: Arc<TokenBroker>,
        presign: Option<Arc<dyn PresignApi>>,
        transfer: Arc<dyn Transfer>,
        reconciler: Arc<UploadListReconciler>,
        items: SharedWorkingSet,
        activity: Arc<ActivityLog>,
        settings: &UploadConfig,
    ) -> Self {
        Self {
            broker,
            presign,
            transfer,
            reconciler,
            items,
            activity,
            key_prefix: settings.key_prefix.clone(),
        }
    }

    /// Uploads every item not yet uploaded, one at a time. A failed item is
    /// marked and the batch moves on; the upload list is refreshed once at
    /// the end.
    pub async fn upload_all(&self) -> AppResult<BatchReport> {
        let presign = match &self.presign {
            Some(presign) => presign.clone(),
            None => {
                let err = AppError::Config("upload.presign_endpoint is not configured".to_string());
                self.activity.error("Cannot upload", &err).await;
                return Err(err);
            }
        };

        let pending = self.items.read().await.pending();
        if pending.is_empty() {
            self.activity
                .info("All selected photos are already uploaded")
                .await;
            return Ok(BatchReport::default());
        }

        if let Err(e) = self.broker.ensure_identity(false, true).await {
            self.activity.error("Please sign in with Google", &e).await;
            return Err(e);
        }
        let has_remote = self.items.read().await.has_pending_remote();
        if has_remote {
            if let Err(e) = self.broker.ensure_access(false).await {
                self.activity
                    .error("Failed to get Google Photos access", &e)
                    .await;
                return Err(e);
            }
        }
        self.items
            .write()
            .await
            .refresh_media_urls(self.broker.access_token().as_deref());

        tracing::info!("[Upload] starting batch of {} item(s)", pending.len());
        let mut report = BatchReport::default();
        for item in pending {
            match self.upload_one(presign.as_ref(), &item).await {
                Ok(key) => {
                    self.items
                        .write()
                        .await
                        .set_status(&item.id, 100, UploadStatus::Uploaded, "uploaded");
                    self.activity.info(format!("Uploaded: {}", key)).await;
                    report.uploaded.push(item.id);
                }
                Err(e) => {
                    let mut items = self.items.write().await;
                    let progress = items.get(&item.id).map(|i| i.progress).unwrap_or(0);
                    items.set_status(&item.id, progress, UploadStatus::Error, "error");
                    drop(items);

                    let err = AppError::UploadItemFailed {
                        item: item.filename.clone(),
                        reason: e.to_string(),
                    };
                    self.activity.error("Upload failed", &err).await;
                    report.failed.push(item.id);
                }
            }
        }

        if self.reconciler.is_configured() {
            report.refreshed = self.reconciler.refresh().await.is_ok();
        } else {
            tracing::warn!("[Upload] manage endpoint not configured, skipping list refresh");
        }
        Ok(report)
    }

    async fn upload_one(&self, presign: &dyn PresignApi, item: &PendingUpload) -> AppResult<String> {
        let (stage, label) = match item.source {
            PendingSource::Local(_) => (UploadStatus::Preparing, "preparing"),
            PendingSource::Remote { .. } => (UploadStatus::Downloading, "downloading"),
        };
        self.items.write().await.set_status(&item.id, 0, stage, label);

        let blob = self.fetch_bytes(item).await?;
        let filename = if item.filename.is_empty() {
            format!("{}.jpg", item.id)
        } else {
            item.filename.clone()
        };
        let key = keys::object_key(&self.key_prefix, &filename, Utc::now());
        let content_type = blob
            .content_type
            .filter(|t| !t.is_empty())
            .or_else(|| Some(item.mime_type.clone()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        self.items.write().await.set_status(
            &item.id,
            5,
            UploadStatus::RequestingUrl,
            UploadStatus::RequestingUrl.label(),
        );
        let identity = self.broker.current_identity().map(|c| c.token);
        let method = presign
            .presign(identity.as_deref(), &key, &content_type)
            .await?
            .into_method()?;

        self.send(&item.id, &filename, method, blob.bytes, &content_type)
            .await?;
        Ok(key)
    }

    async fn fetch_bytes(&self, item: &PendingUpload) -> AppResult<Blob> {
        match &item.source {
            PendingSource::Local(bytes) => Ok(Blob {
                bytes: bytes.clone(),
                content_type: Some(item.mime_type.clone()),
            }),
            source @ PendingSource::Remote { .. } => {
                let transfer = &self.transfer;
                // 401 / 400 都视为 token 失效
                self.broker
                    .with_access_retry_on(
                        |token| async move {
                            let url = source
                                .download_url(Some(&token))
                                .ok_or_else(|| AppError::Config("remote item without base URL".to_string()))?;
                            transfer.download(&url).await
                        },
                        |e| matches!(e.status(), Some(400) | Some(401)),
                    )
                    .await
            }
        }
    }

    /// Runs the transfer while a forwarder task copies progress into the item.
    async fn send(
        &self,
        id: &str,
        filename: &str,
        method: UploadMethod,
        body: Bytes,
        content_type: &str,
    ) -> AppResult<()> {
        let text = format!("uploading ({})", method.label());
        let (tx, mut rx) = watch::channel(5u8);
        let latest = rx.clone();
        let progress: ProgressFn = Arc::new(move |p| {
            let _ = tx.send(p.max(5));
        });

        let items = self.items.clone();
        let item_id = id.to_string();
        let forwarder_text = text.clone();
        let forwarder = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let p = *rx.borrow_and_update();
                items
                    .write()
                    .await
                    .set_status(&item_id, p, UploadStatus::Uploading, &forwarder_text);
            }
        });

        let result = match method {
            UploadMethod::Put { url } => self.transfer.put(&url, body, content_type, progress).await,
            UploadMethod::Post { url, fields } => {
                self.transfer
                    .post_form(&url, &fields, body, filename, content_type, progress)
                    .await
            }
        };

        // 停掉转发任务后补写最后一次进度，最终状态由调用方写入
        forwarder.abort();
        let _ = forwarder.await;
        let last = *latest.borrow();
        self.items
            .write()
            .await
            .set_status(id, last, UploadStatus::Uploading, &text);
        result
    }
}
