use serde::{Deserialize, Serialize};

use crate::picker::presenter::PresentationMode;

pub const PICKER_SCOPE: &str = "https://www.googleapis.com/auth/photospicker.mediaitems.readonly";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub picker: PickerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Identity provider client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_scopes() -> Vec<String> {
    vec![PICKER_SCOPE.to_string()]
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            scopes: default_scopes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerConfig {
    #[serde(default = "default_picker_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_item_count")]
    pub max_item_count: u32,
    /// 服务端未给出 pollInterval 时使用
    #[serde(default = "default_poll_interval_ms")]
    pub default_poll_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub presentation: PresentationMode,
}

fn default_picker_base_url() -> String {
    "https://photospicker.googleapis.com/v1".to_string()
}

fn default_max_item_count() -> u32 {
    200
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_timeout_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            base_url: default_picker_base_url(),
            max_item_count: default_max_item_count(),
            default_poll_interval_ms: default_poll_interval_ms(),
            default_timeout_ms: default_timeout_ms(),
            presentation: PresentationMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Returns `{ url }` or `{ url, fields }`.
    #[serde(default)]
    pub presign_endpoint: Option<String>,
    /// Listing and deleting uploaded objects.
    #[serde(default)]
    pub manage_endpoint: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_initial_visible")]
    pub initial_visible: usize,
    #[serde(default = "default_page_step")]
    pub page_step: usize,
}

fn default_key_prefix() -> String {
    "uploads/".to_string()
}

fn default_initial_visible() -> usize {
    5
}

fn default_page_step() -> usize {
    10
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            presign_endpoint: None,
            manage_endpoint: None,
            key_prefix: default_key_prefix(),
            initial_visible: default_initial_visible(),
            page_step: default_page_step(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_skew_secs")]
    pub freshness_skew_secs: i64,
    #[serde(default = "default_pending_max_age_secs")]
    pub pending_session_max_age_secs: i64,
    /// Used when an identity credential carries no `exp` claim.
    #[serde(default = "default_identity_lifetime_secs")]
    pub identity_fallback_lifetime_secs: i64,
}

fn default_skew_secs() -> i64 {
    crate::models::credential::DEFAULT_FRESHNESS_SKEW_SECS
}

fn default_pending_max_age_secs() -> i64 {
    10 * 60
}

fn default_identity_lifetime_secs() -> i64 {
    55 * 60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            freshness_skew_secs: default_skew_secs(),
            pending_session_max_age_secs: default_pending_max_age_secs(),
            identity_fallback_lifetime_secs: default_identity_lifetime_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

/// 上游代理配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
}
