pub mod client;
pub mod keys;
pub mod pipeline;
pub mod reconciler;
pub mod transfer;

pub use client::{HttpPresignApi, HttpUploadsApi, PresignApi, UploadMethod, UploadsApi};
pub use pipeline::{BatchReport, UploadPipeline};
pub use reconciler::{BulkDeleteReport, LoadMorePlan, UploadListReconciler, UploadListView};
pub use transfer::{HttpTransfer, Transfer};
