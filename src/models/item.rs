use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

pub const THUMB_VARIANT: &str = "w400-h400-c";
pub const DOWNLOAD_VARIANT: &str = "d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Ready,
    Preparing,
    Downloading,
    RequestingUrl,
    Uploading,
    Uploaded,
    Error,
}

impl UploadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Ready => "ready",
            UploadStatus::Preparing => "preparing",
            UploadStatus::Downloading => "downloading",
            UploadStatus::RequestingUrl => "requesting upload URL",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Error => "error",
        }
    }
}

/// Table of temporary `blob:` references handed out for local files.
/// Entries live exactly as long as the owning [`LocalBlob`].
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    entries: DashMap<String, Bytes>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(&self, bytes: Bytes) -> String {
        let url = format!("blob:{}", uuid::Uuid::new_v4());
        self.entries.insert(url.clone(), bytes);
        url
    }

    fn revoke(&self, url: &str) {
        if self.entries.remove(url).is_some() {
            tracing::debug!("[PreviewRegistry] revoked {}", url);
        }
    }

    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        self.entries.get(url).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bytes of a user-supplied file plus its revocable preview reference.
#[derive(Debug)]
pub struct LocalBlob {
    bytes: Bytes,
    object_url: String,
    registry: Arc<PreviewRegistry>,
}

impl LocalBlob {
    pub fn register(registry: &Arc<PreviewRegistry>, bytes: Bytes) -> Self {
        let object_url = registry.create(bytes.clone());
        Self {
            bytes,
            object_url,
            registry: Arc::clone(registry),
        }
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn object_url(&self) -> &str {
        &self.object_url
    }
}

impl Drop for LocalBlob {
    fn drop(&mut self) {
        self.registry.revoke(&self.object_url);
    }
}

#[derive(Debug)]
pub enum ItemOrigin {
    /// Picked from the remote library; `base_url` is the URL template root.
    Remote { base_url: String },
    Local(LocalBlob),
}

impl ItemOrigin {
    pub fn is_local(&self) -> bool {
        matches!(self, ItemOrigin::Local(_))
    }

    /// 缩略图地址，远端条目需要拼接最新的 access token
    pub fn preview_url(&self, access_token: Option<&str>) -> String {
        match self {
            ItemOrigin::Remote { base_url } => build_media_url(base_url, THUMB_VARIANT, access_token),
            ItemOrigin::Local(blob) => blob.object_url().to_string(),
        }
    }

    pub fn download_url(&self, access_token: Option<&str>) -> String {
        match self {
            ItemOrigin::Remote { base_url } => {
                build_media_url(base_url, DOWNLOAD_VARIANT, access_token)
            }
            ItemOrigin::Local(blob) => blob.object_url().to_string(),
        }
    }}

/// One entry of the working set, picked or local.
#[derive(Debug)]
pub struct Item {
    pub id: String,
    pub origin: ItemOrigin,
    pub filename: String,
    pub mime_type: String,
    pub thumb_url: String,
    pub download_url: String,
    pub progress: u8,
    pub status: UploadStatus,
    pub status_text: String,
    pub uploaded: bool,
}

impl Item {
    pub fn remote(id: String, base_url: String, filename: String, mime_type: String) -> Self {
        Self::with_origin(id, ItemOrigin::Remote { base_url }, filename, mime_type)
    }

    pub fn local(id: String, blob: LocalBlob, filename: String, mime_type: String) -> Self {
        Self::with_origin(id, ItemOrigin::Local(blob), filename, mime_type)
    }

    fn with_origin(id: String, origin: ItemOrigin, filename: String, mime_type: String) -> Self {
        let mut item = Self {
            id,
            origin,
            filename,
            mime_type,
            thumb_url: String::new(),
            download_url: String::new(),
            progress: 0,
            status: UploadStatus::Ready,
            status_text: UploadStatus::Ready.label().to_string(),
            uploaded: false,
        };
        item.refresh_urls(None);
        item
    }

    pub fn is_local(&self) -> bool {
        self.origin.is_local()
    }

    pub fn refresh_urls(&mut self, access_token: Option<&str>) {
        self.thumb_url = self.origin.preview_url(access_token);
        self.download_url = self.origin.download_url(access_token);
    }

    pub fn set_progress(&mut self, percent: u8, status: UploadStatus, status_text: &str) {
        self.progress = percent.min(100);
        self.status = status;
        self.status_text = status_text.to_string();
    }

    pub fn view(&self) -> ItemView {
        ItemView {
            id: self.id.clone(),
            source: if self.is_local() { "local" } else { "remote" },
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            thumb_url: self.thumb_url.clone(),
            download_url: self.download_url.clone(),
            progress: self.progress,
            status: self.status,
            status_text: self.status_text.clone(),
            uploaded: self.uploaded,
        }
    }
}

/// Serializable snapshot of an [`Item`] for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: String,
    pub source: &'static str,
    pub filename: String,
    pub mime_type: String,
    pub thumb_url: String,
    pub download_url: String,
    pub progress: u8,
    pub status: UploadStatus,
    pub status_text: String,
    pub uploaded: bool,
}

/// `<base>=<variant>?access_token=<token>`; the token query is omitted when absent.
pub fn build_media_url(base_url: &str, variant: &str, access_token: Option<&str>) -> String {
    if base_url.is_empty() {
        return String::new();
    }
    let variant_part = if variant.is_empty() {
        String::new()
    } else {
        format!("={}", variant)
    };
    let token_query = match access_token {
        Some(token) if !token.is_empty() => {
            let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
            format!("?access_token={}", encoded)
        }
        _ => String::new(),
    };
    format!("{}{}{}", base_url, variant_part, token_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_media_url() {
        assert_eq!(
            build_media_url("https://lh3.example/abc", "d", Some("ya29.a/b")),
            "https://lh3.example/abc=d?access_token=ya29.a%2Fb"
        );
        assert_eq!(
            build_media_url("https://lh3.example/abc", THUMB_VARIANT, None),
            "https://lh3.example/abc=w400-h400-c"
        );
        assert_eq!(build_media_url("", "d", Some("t")), "");
    }

    #[test]
    fn test_local_blob_revoked_on_drop() {
        let registry = Arc::new(PreviewRegistry::new());
        let blob = LocalBlob::register(&registry, Bytes::from_static(b"jpeg"));
        let url = blob.object_url().to_string();
        assert!(url.starts_with("blob:"));

        let item = Item::local("local-1".to_string(), blob, "a.jpg".to_string(), "image/jpeg".to_string());
        assert_eq!(item.thumb_url, url);
        assert_eq!(registry.resolve(&url), Some(Bytes::from_static(b"jpeg")));

        drop(item);
        assert!(registry.resolve(&url).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remote_urls_follow_token() {
        let mut item = Item::remote(
            "m1".to_string(),
            "https://lh3.example/m1".to_string(),
            "m1.jpg".to_string(),
            "image/jpeg".to_string(),
        );
        assert_eq!(item.download_url, "https://lh3.example/m1=d");
        item.refresh_urls(Some("tok"));
        assert_eq!(item.thumb_url, "https://lh3.example/m1=w400-h400-c?access_token=tok");
        assert_eq!(item.download_url, "https://lh3.example/m1=d?access_token=tok");
    }
}
