//! JSON / JSONL 文件读写
//!
//! 所有协调文件都经由这里读写，写入前自动创建父目录。

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::error::{AppError, AppResult};

/// 读取并反序列化 JSON 文件
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path, e))?;
    serde_json::from_str(&content).map_err(|e| AppError::json_invalid(path, e))
}

/// 以缩进格式写入 JSON 文件
pub async fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    let mut content =
        serde_json::to_string_pretty(value).map_err(|e| AppError::json_invalid(path, e))?;
    content.push('\n');
    write_text(path, &content).await
}

/// 每个元素一行写入 JSONL 文件
pub async fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> AppResult<()> {
    let mut content = String::new();
    for item in items {
        let line = serde_json::to_string(item).map_err(|e| AppError::json_invalid(path, e))?;
        content.push_str(&line);
        content.push('\n');
    }
    write_text(path, &content).await
}

/// 读取 JSONL 文件，跳过空行
pub async fn read_jsonl<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path, e))?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| AppError::json_invalid(path, e)))
        .collect()
}

/// 写入文本文件
pub async fn write_text(path: &Path, content: &str) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::file_write_failed(parent, e))?;
    }
    fs::write(path, content)
        .await
        .map_err(|e| AppError::file_write_failed(path, e))
}
