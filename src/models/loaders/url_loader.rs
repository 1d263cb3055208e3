use std::path::Path;

use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, ConfigError};

/// 从 JSON 文件加载 URL 列表
///
/// 支持两种格式：
/// - 字符串数组：`["https://...", ...]`
/// - 对象数组：`[{"certificate_link": "https://..."}, {"url": "https://..."}]`
///
/// 对象中两个字段都没有的记录会被跳过。
pub async fn load_urls(path: &Path) -> AppResult<Vec<String>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(AppError::input_not_found(path));
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path, e))?;

    let raw: Value = serde_json::from_str(&content).map_err(|e| malformed(path, e.to_string()))?;
    let items = match raw {
        Value::Array(items) => items,
        _ => return Err(malformed(path, "顶层必须是 JSON 数组".to_string())),
    };

    let total = items.len();
    let mut urls = Vec::with_capacity(total);
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            Value::String(url) => urls.push(url),
            Value::Object(map) => {
                let url = ["url", "certificate_link"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .filter(|url| !url.trim().is_empty());
                match url {
                    Some(url) => urls.push(url.to_string()),
                    None => warn!("第 {} 条记录没有 url / certificate_link 字段，已跳过", idx),
                }
            }
            other => {
                return Err(malformed(
                    path,
                    format!("第 {} 个元素既不是字符串也不是对象: {}", idx, other),
                ))
            }
        }
    }

    info!("✓ 从 {} 加载了 {} 条记录，提取 {} 个 URL", path.display(), total, urls.len());
    Ok(urls)
}

fn malformed(path: &Path, reason: String) -> AppError {
    ConfigError::MalformedInput {
        path: path.display().to_string(),
        reason,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_string_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        fs::write(&path, r#"["https://a/1", "https://a/2"]"#).await.unwrap();

        let urls = load_urls(&path).await.unwrap();
        assert_eq!(urls, vec!["https://a/1", "https://a/2"]);
    }

    #[tokio::test]
    async fn test_load_record_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        fs::write(
            &path,
            r#"[{"diamond_id": "1", "certificate_link": "https://a/1"},
                {"diamond_id": "2"},
                {"url": "https://a/3"}]"#,
        )
        .await
        .unwrap();

        let urls = load_urls(&path).await.unwrap();
        assert_eq!(urls, vec!["https://a/1", "https://a/3"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_urls(&dir.path().join("none.json")).await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_non_array_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj.json");
        fs::write(&path, r#"{"urls": []}"#).await.unwrap();

        let err = load_urls(&path).await.unwrap_err();
        assert!(err.is_config());
    }
}
