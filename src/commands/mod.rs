use serde::Serialize;
use std::path::PathBuf;

use crate::context::AppContext;
use crate::models::ItemView;
use crate::modules::logger;
use crate::modules::monitor::ActivityEntry;
use crate::picker::PickOutcome;
use crate::uploads::{BatchReport, BulkDeleteReport, LoadMorePlan, UploadListView};
use crate::workspace::mime_for_path;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupReport {
    pub signed_in_as: Option<String>,
    pub resumed: Option<usize>,
}

/// 启动：恢复登录状态并继续未完成的选图会话
pub async fn start(ctx: &AppContext) -> Result<StartupReport, String> {
    let mut report = StartupReport::default();
    if let Some(credential) = ctx.broker.restore_identity() {
        report.signed_in_as = credential.email().map(str::to_string);
    }
    report.resumed = resume_pending(ctx).await?;
    Ok(report)
}

/// 页面重新可见时调用
pub async fn on_visible(ctx: &AppContext) -> Result<Option<usize>, String> {
    resume_pending(ctx).await
}

async fn resume_pending(ctx: &AppContext) -> Result<Option<usize>, String> {
    match ctx.picker.resume_pending().await.map_err(|e| e.to_string())? {
        Some(PickOutcome::Picked { added, .. }) => Ok(Some(added)),
        _ => Ok(None),
    }
}

/// 登录 (必要时弹出提示)
pub async fn sign_in(ctx: &AppContext) -> Result<Option<String>, String> {
    let credential = ctx
        .broker
        .ensure_identity(false, true)
        .await
        .map_err(|e| e.to_string())?;
    let email = credential.email().map(str::to_string);
    ctx.activity
        .info(format!(
            "Signed in as {}",
            email.as_deref().unwrap_or("<unknown>")
        ))
        .await;
    Ok(email)
}

/// 打开 Google Photos Picker 选图
pub async fn pick_photos(ctx: &AppContext) -> Result<PickOutcome, String> {
    ctx.picker.pick().await.map_err(|e| e.to_string())
}

/// 添加本地图片，非图片文件会被跳过
pub async fn add_local_files(ctx: &AppContext, paths: Vec<PathBuf>) -> Result<usize, String> {
    let mut added = 0;
    for path in paths {
        let Some(mime_type) = mime_for_path(&path) else {
            tracing::debug!("Skipping non-image file {}", path.display());
            continue;
        };
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let message = format!("读取文件失败 {}: {}", path.display(), e);
                logger::log_warn(&message);
                ctx.activity.warn(message).await;
                continue;
            }
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ctx.items
            .write()
            .await
            .add_local(filename, mime_type.to_string(), bytes.into());
        added += 1;
    }

    if added > 0 {
        ctx.items
            .write()
            .await
            .refresh_media_urls(ctx.broker.access_token().as_deref());
        ctx.activity
            .info(format!("Added {} local file(s)", added))
            .await;
    } else {
        ctx.activity.warn("No image files were selected").await;
    }
    Ok(added)
}

pub async fn list_items(ctx: &AppContext) -> Vec<ItemView> {
    ctx.items.read().await.views()
}

pub async fn remove_item(ctx: &AppContext, id: String) -> bool {
    ctx.items.write().await.remove(&id)
}

/// 上传所有未上传的图片
pub async fn upload_all(ctx: &AppContext) -> Result<BatchReport, String> {
    let report = ctx.pipeline.upload_all().await.map_err(|e| e.to_string())?;
    if !report.failed.is_empty() {
        logger::log_warn(&format!(
            "{} of {} upload(s) failed",
            report.failed.len(),
            report.failed.len() + report.uploaded.len()
        ));
    }
    Ok(report)
}

/// 重新拉取上传列表第一页
pub async fn refresh_uploads(ctx: &AppContext) -> Result<UploadListView, String> {
    ctx.uploads.reload().await.map_err(|e| e.to_string())?;
    Ok(ctx.uploads.view().await)
}

pub async fn load_more_uploads(ctx: &AppContext) -> Result<UploadListView, String> {
    let plan = ctx.uploads.load_more().await.map_err(|e| e.to_string())?;
    if plan == LoadMorePlan::Ignored {
        tracing::debug!("load more ignored, a fetch is already running");
    }
    Ok(ctx.uploads.view().await)
}

pub async fn get_uploads_view(ctx: &AppContext) -> UploadListView {
    ctx.uploads.view().await
}

pub async fn toggle_upload_selection(ctx: &AppContext, key: String, selected: bool) -> Vec<String> {
    ctx.uploads.toggle_selection(&key, selected).await;
    ctx.uploads.selected_keys().await
}

/// 删除单个已上传对象
pub async fn delete_upload(ctx: &AppContext, key: String) -> Result<UploadListView, String> {
    ctx.uploads.delete(&key).await.map_err(|e| e.to_string())?;
    Ok(ctx.uploads.view().await)
}

/// 批量删除选中的对象
pub async fn delete_selected_uploads(ctx: &AppContext) -> Result<BulkDeleteReport, String> {
    ctx.uploads.delete_selected().await.map_err(|e| e.to_string())
}

pub async fn get_activity(ctx: &AppContext, limit: usize) -> Vec<ActivityEntry> {
    ctx.activity.recent(limit).await
}

/// 页面卸载：释放所有本地临时引用
pub async fn unload(ctx: &AppContext) {
    ctx.items.write().await.release_all();
}
