pub mod auth_state;
pub mod config;
pub mod logger;
pub mod monitor;
pub mod resume;
pub mod storage;

pub use config::{load_app_config, load_app_config_from, save_app_config};
pub use monitor::ActivityLog;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
