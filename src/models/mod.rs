pub mod config;
pub mod credential;
pub mod item;
pub mod session;
pub mod upload;

pub use config::AppConfig;
pub use credential::{Credential, CredentialKind, IdentityClaims};
pub use item::{Item, ItemOrigin, ItemView, LocalBlob, PreviewRegistry, UploadStatus};
pub use session::{MediaFile, MediaItemsPage, PendingSession, PickedMediaItem, PickerSession, PollingConfig};
pub use upload::{DeleteOutcome, UploadListCursor, UploadRecord, UploadsPage};
