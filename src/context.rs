//! Wires configuration, persistence and the external capabilities into the
//! long-lived services shared by every command.

use std::sync::Arc;

use crate::auth::{AccessCapability, IdentityCapability, TokenBroker};
use crate::error::AppResult;
use crate::models::{AppConfig, PreviewRegistry};
use crate::modules::auth_state::AuthStateStore;
use crate::modules::monitor::ActivityLog;
use crate::modules::resume::SessionResumptionStore;
use crate::modules::storage::{FileStore, KeyValueStore};
use crate::picker::{HttpPickerApi, PickerApi, PickerSessionController, Presenter, WindowHost};
use crate::uploads::{
    HttpPresignApi, HttpTransfer, HttpUploadsApi, PresignApi, Transfer, UploadListReconciler,
    UploadPipeline, UploadsApi,
};
use crate::utils::http;
use crate::workspace::{SharedWorkingSet, WorkingSet};

const STATE_FILE: &str = "photo_relay_state.json";

/// Backends the services talk to. Production uses the HTTP clients;
/// tests substitute fakes.
pub struct Backends {
    pub picker: Arc<dyn PickerApi>,
    pub uploads: Option<Arc<dyn UploadsApi>>,
    pub presign: Option<Arc<dyn PresignApi>>,
    pub transfer: Arc<dyn Transfer>,
}

impl Backends {
    pub fn http(config: &AppConfig) -> Self {
        let client = http::create_client(&config.http);
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        Self {
            picker: Arc::new(HttpPickerApi::new(client.clone(), config.picker.base_url.clone())),
            uploads: non_empty(&config.upload.manage_endpoint)
                .map(|e| Arc::new(HttpUploadsApi::new(client.clone(), e)) as Arc<dyn UploadsApi>),
            presign: non_empty(&config.upload.presign_endpoint)
                .map(|e| Arc::new(HttpPresignApi::new(client.clone(), e)) as Arc<dyn PresignApi>),
            transfer: Arc::new(HttpTransfer::new(client)),
        }
    }
}

pub struct Capabilities {
    pub identity: Arc<dyn IdentityCapability>,
    pub access: Arc<dyn AccessCapability>,
    pub window_host: Arc<dyn WindowHost>,
}

/// 全局应用状态
pub struct AppContext {
    pub config: AppConfig,
    pub items: SharedWorkingSet,
    pub registry: Arc<PreviewRegistry>,
    pub activity: Arc<ActivityLog>,
    pub broker: Arc<TokenBroker>,
    pub resume: Arc<SessionResumptionStore>,
    pub picker: PickerSessionController,
    pub uploads: Arc<UploadListReconciler>,
    pub pipeline: UploadPipeline,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        capabilities: Capabilities,
        backends: Backends,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let registry = Arc::new(PreviewRegistry::new());
        let items = WorkingSet::shared(registry.clone());
        let activity = Arc::new(ActivityLog::default());

        let auth_state = Arc::new(AuthStateStore::new(store.clone(), config.auth.freshness_skew_secs));
        let broker = Arc::new(
            TokenBroker::new(
                capabilities.identity,
                capabilities.access,
                items.clone(),
                config.google.scopes.clone(),
                &config.auth,
            )
            .with_auth_state(auth_state),
        );

        let resume = Arc::new(SessionResumptionStore::new(
            store,
            config.auth.pending_session_max_age_secs * 1000,
        ));
        let picker = PickerSessionController::new(
            backends.picker,
            broker.clone(),
            Presenter::new(capabilities.window_host, config.picker.presentation),
            resume.clone(),
            items.clone(),
            activity.clone(),
            config.picker.clone(),
        );

        let uploads = Arc::new(UploadListReconciler::new(
            backends.uploads,
            broker.clone(),
            activity.clone(),
            &config.upload,
        ));
        let pipeline = UploadPipeline::new(
            broker.clone(),
            backends.presign,
            backends.transfer,
            uploads.clone(),
            items.clone(),
            activity.clone(),
            &config.upload,
        );

        Self {
            config,
            items,
            registry,
            activity,
            broker,
            resume,
            picker,
            uploads,
            pipeline,
        }
    }

    /// HTTP backends with persisted state under the data directory.
    pub fn from_config(config: AppConfig, capabilities: Capabilities) -> AppResult<Self> {
        let data_dir = crate::modules::config::get_data_dir().map_err(crate::error::AppError::Config)?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(data_dir.join(STATE_FILE)));
        let backends = Backends::http(&config);
        Ok(Self::new(config, capabilities, backends, store))
    }
}
