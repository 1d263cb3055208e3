//! 日志初始化
//!
//! 控制台 + 文件两路输出，级别由 `RUST_LOG` 控制（默认 info）。

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::utils::logging::log_header;

/// 初始化日志
///
/// # 参数
/// - `stage`: 阶段名称，用于日志文件名
/// - `config`: 程序配置（日志目录）
///
/// # 返回
/// 返回日志文件路径
pub fn init(stage: &str, config: &Config) -> AppResult<PathBuf> {
    fs::create_dir_all(&config.log_dir)
        .map_err(|e| AppError::file_write_failed(&config.log_dir, e))?;

    let log_file_path = config.log_dir.join(format!(
        "{}_{}.log",
        stage,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    fs::write(&log_file_path, log_header(stage))
        .map_err(|e| AppError::file_write_failed(&log_file_path, e))?;

    let log_file = OpenOptions::new()
        .append(true)
        .open(&log_file_path)
        .map_err(|e| AppError::file_write_failed(&log_file_path, e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // 重复初始化（例如测试中）时保留已有的订阅者
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init();

    Ok(log_file_path)
}
