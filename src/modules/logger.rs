use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "photo-relay.log";

// 文件日志的后台写线程，进程存活期间必须保持
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

pub fn get_log_dir() -> Result<PathBuf, String> {
    let data_dir = super::config::get_data_dir()?;
    Ok(data_dir.join(LOG_DIR))
}

/// Installs console + daily-rolling file logging. Safe to call more than once.
pub fn init_logger() {
    match get_log_dir() {
        Ok(dir) => init_logger_in(&dir),
        Err(e) => {
            eprintln!("无法确定日志目录，仅输出到控制台: {}", e);
            init_console_only();
        }
    }
}

pub fn init_logger_in(log_dir: &Path) {
    if LOG_GUARD.get().is_some() {
        return;
    }
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("创建日志目录失败: {}", e);
        init_console_only();
        return;
    }

    let _ = tracing_log::LogTracer::init();

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false));

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = LOG_GUARD.set(guard);
        tracing::info!("日志系统已初始化: {}", log_dir.display());
    }
}

fn init_console_only() {
    let _ = tracing_log::LogTracer::init();
    let subscriber = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false));
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn log_warn(message: &str) {
    tracing::warn!("{}", message);
}
