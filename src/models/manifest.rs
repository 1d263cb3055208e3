//! 任务清单（manifest）
//!
//! 记录每个分片的输入文件路径，由 `create-concurrent` 写入，
//! 之后只读，驱动提交和轮询两个阶段。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::utils::json_file;

/// 任务清单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// 本次创建的标识，提交记录据此判断是否属于当前清单
    #[serde(default)]
    pub run_id: String,
    /// 输入 URL 总数
    pub total_urls: usize,
    /// 每个请求包含的 URL 数
    pub batch_size: usize,
    /// job_index → 分片信息
    pub jobs: BTreeMap<usize, ManifestEntry>,
}

/// 单个分片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// 输入 JSONL 文件路径
    pub input_file: PathBuf,
    /// 文件中的请求行数
    pub requests: usize,
    /// 分片包含的 URL 数
    pub urls: usize,
}

impl Manifest {
    /// 加载清单，文件不存在时返回配置错误
    pub async fn load(path: &Path) -> AppResult<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(AppError::input_not_found(path));
        }
        let manifest: Manifest = json_file::read_json(path).await?;
        info!(
            "✓ 已加载清单: {} 个任务, 共 {} 个 URL",
            manifest.jobs.len(),
            manifest.total_urls
        );
        Ok(manifest)
    }

    /// 生成新的创建标识
    pub fn new_run_id() -> String {
        chrono::Local::now().format("%Y%m%d%H%M%S%9f").to_string()
    }

    /// 保存清单
    pub async fn save(&self, path: &Path) -> AppResult<()> {
        json_file::write_json_pretty(path, self).await
    }
}
