//! The working item collection: picked remote items plus local files.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::item::build_media_url;
use crate::models::item::DOWNLOAD_VARIANT;
use crate::models::{Item, ItemOrigin, ItemView, LocalBlob, PreviewRegistry, UploadStatus};

pub type SharedWorkingSet = Arc<RwLock<WorkingSet>>;

/// What the pipeline needs to upload one item, detached from the collection lock.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub source: PendingSource,
}

#[derive(Debug, Clone)]
pub enum PendingSource {
    Local(Bytes),
    Remote { base_url: String },
}

impl PendingSource {
    /// Full-resolution download URL for a remote item with the given token.
    pub fn download_url(&self, access_token: Option<&str>) -> Option<String> {
        match self {
            PendingSource::Remote { base_url } => {
                Some(build_media_url(base_url, DOWNLOAD_VARIANT, access_token))
            }
            PendingSource::Local(_) => None,
        }
    }
}

pub struct WorkingSet {
    items: Vec<Item>,
    local_seq: u64,
    registry: Arc<PreviewRegistry>,
    access_token: Option<String>,
}

impl WorkingSet {
    pub fn new(registry: Arc<PreviewRegistry>) -> Self {
        Self {
            items: Vec::new(),
            local_seq: 0,
            registry,
            access_token: None,
        }
    }

    pub fn shared(registry: Arc<PreviewRegistry>) -> SharedWorkingSet {
        Arc::new(RwLock::new(Self::new(registry)))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn views(&self) -> Vec<ItemView> {
        self.items.iter().map(Item::view).collect()
    }

    /// Local items stay, previous remote items are replaced by `remote`.
    /// Returns the number of remote items now held.
    pub fn replace_remote(&mut self, remote: Vec<Item>) -> usize {
        self.items.retain(|i| i.is_local());
        let added = remote.len();
        let token = self.access_token.clone();
        for mut item in remote {
            item.refresh_urls(token.as_deref());
            self.items.push(item);
        }
        added
    }

    pub fn add_local(&mut self, filename: String, mime_type: String, bytes: Bytes) -> String {
        self.local_seq += 1;
        let id = format!(
            "local-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            self.local_seq
        );
        let blob = LocalBlob::register(&self.registry, bytes);
        self.items
            .push(Item::local(id.clone(), blob, filename, mime_type));
        id
    }

    /// Recomputes every item's derived URLs for a new access token.
    pub fn refresh_media_urls(&mut self, access_token: Option<&str>) {
        self.access_token = access_token.map(str::to_string);
        for item in self.items.iter_mut() {
            item.refresh_urls(access_token);
        }
    }

    pub fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Item),
    {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }

    pub fn set_status(&mut self, id: &str, percent: u8, status: UploadStatus, text: &str) {
        self.update(id, |item| {
            item.set_progress(percent, status, text);
            if status == UploadStatus::Uploaded {
                item.uploaded = true;
            }
        });
    }

    /// Snapshot of items not yet uploaded, in collection order.
    pub fn pending(&self) -> Vec<PendingUpload> {
        self.items
            .iter()
            .filter(|i| !i.uploaded)
            .map(|i| PendingUpload {
                id: i.id.clone(),
                filename: i.filename.clone(),
                mime_type: i.mime_type.clone(),
                source: match &i.origin {
                    ItemOrigin::Local(blob) => PendingSource::Local(blob.bytes()),
                    ItemOrigin::Remote { base_url } => PendingSource::Remote {
                        base_url: base_url.clone(),
                    },
                },
            })
            .collect()
    }

    pub fn has_pending_remote(&self) -> bool {
        self.items.iter().any(|i| !i.uploaded && !i.is_local())
    }

    /// Drops the item, releasing its temporary reference if local.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Page unload: every local reference is released.
    pub fn release_all(&mut self) {
        let released = self.items.iter().filter(|i| i.is_local()).count();
        self.items.clear();
        if released > 0 {
            tracing::debug!("[WorkingSet] released {} local references", released);
        }
    }
}

/// MIME type for an image file extension, `None` for anything else.
pub fn mime_for_image_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|s| s.to_str())
        .and_then(mime_for_image_extension)
}
