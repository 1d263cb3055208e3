//! 单个任务的处理流程 - 流程层
//!
//! 核心职责：定义"一个分片"在远端的生命周期
//!
//! 1. 提交：读取输入文件 → 上传 → 创建任务
//! 2. 查询：获取任务状态
//! 3. 取回：下载原始结果（本地已有同一任务的结果则复用）

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::BatchApi;
use crate::error::{AppError, AppResult, RemoteApiError};
use crate::models::{BatchSnapshot, SubmissionRecord};
use crate::utils::json_file;
use crate::workflow::job_ctx::JobCtx;

/// 任务处理流程
///
/// - 只依赖 `BatchApi` 能力
/// - 不决定重试和并发，交给编排层
#[derive(Clone)]
pub struct JobFlow {
    api: Arc<dyn BatchApi>,
}

impl JobFlow {
    pub fn new(api: Arc<dyn BatchApi>) -> Self {
        Self { api }
    }

    /// 上传输入文件并创建批处理任务
    ///
    /// # 参数
    /// - `ctx`: 任务上下文
    /// - `input_file`: 本地 JSONL 输入文件
    ///
    /// # 返回
    /// 成功时返回提交记录；任何一步失败都返回错误，由调用方记录
    pub async fn submit(&self, ctx: &JobCtx, input_file: &Path) -> AppResult<SubmissionRecord> {
        let bytes = tokio::fs::read(input_file)
            .await
            .map_err(|e| AppError::file_read_failed(input_file, e))?;
        let filename = input_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "batch_input.jsonl".to_string());

        info!("{} 📤 上传输入文件: {}", ctx, input_file.display());
        let file_id = self.api.upload_file(&filename, bytes).await?;
        info!("{} ✓ 文件已上传: {}", ctx, file_id);

        let batch = self.api.create_batch(&file_id).await?;
        info!(
            "{} ✅ 已创建批处理任务: {} (状态: {})",
            ctx,
            batch.id,
            batch.status.as_str()
        );

        Ok(SubmissionRecord::success(
            input_file.to_path_buf(),
            file_id,
            batch.id,
        ))
    }

    /// 查询任务当前状态
    pub async fn check(&self, ctx: &JobCtx, job_id: &str) -> Result<BatchSnapshot, RemoteApiError> {
        let snapshot = self.api.retrieve_batch(job_id).await?;
        let counts = snapshot.counts();
        info!(
            "{} 状态: {} | 完成 {}/{} | 失败 {}",
            ctx,
            snapshot.status.as_str(),
            counts.completed,
            counts.total,
            counts.failed
        );
        if let Some(details) = snapshot.error_details() {
            warn!("{} ⚠️ 任务错误: {}", ctx, details);
        }
        Ok(snapshot)
    }

    /// 取回已完成任务的原始结果
    ///
    /// 原始结果旁的标记文件记录了下载它的任务ID。
    /// 只有标记与当前任务一致时才复用本地文件，否则重新下载并覆盖。
    ///
    /// # 返回
    /// 原始 JSONL 文本
    pub async fn fetch_results(
        &self,
        ctx: &JobCtx,
        snapshot: &BatchSnapshot,
        raw_path: &Path,
    ) -> AppResult<String> {
        let marker_path = job_marker_path(raw_path);
        if tokio::fs::try_exists(raw_path).await.unwrap_or(false) {
            let owner = tokio::fs::read_to_string(&marker_path)
                .await
                .unwrap_or_default();
            if owner.trim() == snapshot.id {
                info!("{} 📄 结果文件已存在，跳过下载: {}", ctx, raw_path.display());
                return tokio::fs::read_to_string(raw_path)
                    .await
                    .map_err(|e| AppError::file_read_failed(raw_path, e));
            }
            warn!(
                "{} ⚠️ 结果文件 {} 不属于当前任务，重新下载",
                ctx,
                raw_path.display()
            );
        }

        let file_id =
            snapshot
                .output_file_id
                .as_deref()
                .ok_or_else(|| RemoteApiError::MissingOutputFile {
                    job_id: snapshot.id.clone(),
                })?;

        if snapshot.counts().failed > 0 {
            if let Some(error_file) = &snapshot.error_file_id {
                warn!(
                    "{} ⚠️ {} 个请求失败，错误文件: {}",
                    ctx,
                    snapshot.counts().failed,
                    error_file
                );
            }
        }

        info!("{} 📥 下载结果文件: {}", ctx, file_id);
        let content = self.api.download_file(file_id).await?;
        json_file::write_text(raw_path, &content).await?;
        json_file::write_text(&marker_path, &format!("{}\n", snapshot.id)).await?;
        info!("{} ✓ 原始结果已保存: {}", ctx, raw_path.display());
        Ok(content)
    }
}

/// 原始结果文件旁记录所属任务ID的标记文件
pub fn job_marker_path(raw_path: &Path) -> PathBuf {
    let mut name = raw_path.as_os_str().to_owned();
    name.push(".job");
    PathBuf::from(name)
}
