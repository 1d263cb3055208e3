use std::path::Path;

use tokio::fs;
use tracing::debug;

use crate::error::{AppResult, ConfigError};

/// 读取提示词模板文件
pub async fn load_prompt(path: &Path) -> AppResult<String> {
    let prompt = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::PromptFileUnreadable {
            path: path.display().to_string(),
            source,
        })?;

    debug!("已加载提示词 {} ({} 字符)", path.display(), prompt.chars().count());
    Ok(prompt)
}
