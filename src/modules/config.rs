use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const DATA_DIR: &str = "photo-relay";
const CONFIG_FILE: &str = "photo_relay_config.json";

/// 获取数据目录路径，不存在时创建
pub fn get_data_dir() -> Result<PathBuf, String> {
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or("无法获取用户数据目录")?;
    let data_dir = base.join(DATA_DIR);

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir).map_err(|e| format!("创建数据目录失败: {}", e))?;
    }

    Ok(data_dir)
}

/// 加载应用配置
pub fn load_app_config() -> AppResult<AppConfig> {
    let data_dir = get_data_dir().map_err(AppError::Config)?;
    load_app_config_from(&data_dir.join(CONFIG_FILE))
}

pub fn load_app_config_from(path: &Path) -> AppResult<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("读取配置文件失败: {}", e)))?;

    serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("解析配置文件失败: {}", e)))
}

/// 保存应用配置
pub fn save_app_config(config: &AppConfig) -> AppResult<()> {
    let data_dir = get_data_dir().map_err(AppError::Config)?;
    save_app_config_to(config, &data_dir.join(CONFIG_FILE))
}

pub fn save_app_config_to(config: &AppConfig, path: &Path) -> AppResult<()> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("序列化配置失败: {}", e)))?;

    fs::write(path, content).map_err(|e| AppError::Config(format!("保存配置失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_app_config_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.upload.page_step, 10);
        assert!(config.upload.manage_endpoint.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = AppConfig::default();
        config.google.client_id = "client-123".to_string();
        config.upload.presign_endpoint = Some("https://api.example/presign".to_string());
        save_app_config_to(&config, &path).unwrap();

        let loaded = load_app_config_from(&path).unwrap();
        assert_eq!(loaded.google.client_id, "client-123");
        assert_eq!(
            loaded.upload.presign_endpoint.as_deref(),
            Some("https://api.example/presign")
        );
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        match load_app_config_from(&path) {
            Err(AppError::Config(msg)) => assert!(msg.contains("解析配置文件失败")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
