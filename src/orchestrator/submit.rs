//! 提交阶段 - 编排层
//!
//! 单任务：上传一个文件，任务ID以纯文本保存。
//! 并发模式：按清单并发提交，已成功的分片不再提交，任务ID文件只在全部返回后写一次。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::clients::BatchApi;
use crate::error::{AppError, AppResult};
use crate::models::{JobIds, Manifest, SubmissionRecord};
use crate::orchestrator::worker_pool::{run_bounded, validate_workers};
use crate::utils::json_file;
use crate::utils::logging::{log_startup, print_final_stats, FinalStats};
use crate::workflow::{JobCtx, JobFlow};

/// 并发提交统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubmitSummary {
    pub total: usize,
    pub submitted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SubmitSummary {
    /// 本次需要提交的分片全部失败
    pub fn all_failed(&self) -> bool {
        self.failed > 0 && self.submitted == 0 && self.skipped == 0
    }
}

/// 提交单个输入文件
///
/// # 返回
/// 返回远端任务ID
pub async fn submit_single(
    api: Arc<dyn BatchApi>,
    input_file: &Path,
    job_id_file: &Path,
) -> AppResult<String> {
    log_startup("提交批处理任务", &format!("输入文件: {}", input_file.display()));

    if !tokio::fs::try_exists(input_file).await.unwrap_or(false) {
        return Err(AppError::input_not_found(input_file));
    }

    let flow = JobFlow::new(api);
    let record = flow.submit(&JobCtx::new(0), input_file).await?;
    let job_id = record.job_id.unwrap_or_default();

    json_file::write_text(job_id_file, &format!("{}\n", job_id)).await?;
    info!("✅ 任务ID已保存至: {}", job_id_file.display());
    Ok(job_id)
}

/// 按清单并发提交
///
/// # 参数
/// - `manifest_path`: 清单文件
/// - `max_workers`: 最大并发数
/// - `job_ids_path`: 任务ID文件；已存在时只跳过同一清单、同一输入文件已成功提交的分片
pub async fn submit_concurrent(
    api: Arc<dyn BatchApi>,
    manifest_path: &Path,
    max_workers: usize,
    job_ids_path: &Path,
) -> AppResult<SubmitSummary> {
    let max_workers = validate_workers(max_workers)?;
    log_startup("并发提交批处理任务", &format!("最大并发数: {}", max_workers));

    let manifest = Manifest::load(manifest_path).await?;
    let mut job_ids = JobIds::load_or_default(job_ids_path).await?;

    let mut summary = SubmitSummary {
        total: manifest.jobs.len(),
        ..SubmitSummary::default()
    };

    // 不在当前清单中的旧记录直接丢弃
    let before = job_ids.0.len();
    job_ids.0.retain(|job_index, _| manifest.jobs.contains_key(job_index));
    if job_ids.0.len() < before {
        warn!("🧹 丢弃 {} 条不属于当前清单的提交记录", before - job_ids.0.len());
    }

    let mut pending: Vec<(usize, PathBuf)> = Vec::new();
    for (job_index, entry) in &manifest.jobs {
        match job_ids.0.get(job_index) {
            Some(record) if record.is_current_success(&manifest.run_id, &entry.input_file) => {
                info!(
                    "[任务 {}] ⏭️ 已提交过 ({})，跳过",
                    job_index,
                    record.job_id.as_deref().unwrap_or("-")
                );
                summary.skipped += 1;
            }
            _ => pending.push((*job_index, entry.input_file.clone())),
        }
    }

    let inputs: BTreeMap<usize, PathBuf> = pending.iter().cloned().collect();
    let flow = JobFlow::new(api);
    let results = run_bounded(max_workers, pending, move |job_index, input_file| {
        let flow = flow.clone();
        async move {
            flow.submit(&JobCtx::new(job_index), &input_file)
                .await
                .map_err(|e| {
                    error!("[任务 {}] ❌ 提交失败: {}", job_index, e);
                    e
                })
        }
    })
    .await;

    for (job_index, result) in results {
        let input_file = inputs.get(&job_index).cloned().unwrap_or_default();
        let record = match result.map_err(AppError::from).and_then(|r| r) {
            Ok(record) => {
                summary.submitted += 1;
                record
            }
            Err(e) => {
                summary.failed += 1;
                SubmissionRecord::failed(input_file, e)
            }
        };
        job_ids
            .0
            .insert(job_index, record.with_run_id(&manifest.run_id));
    }

    job_ids.save(job_ids_path).await?;

    print_final_stats(
        "提交完成统计",
        FinalStats {
            success: summary.submitted + summary.skipped,
            failed: summary.failed,
            pending: 0,
            total: summary.total,
        },
        Some(job_ids_path),
    );
    Ok(summary)
}

/// 读取单任务模式的任务ID文件
pub async fn read_job_id_file(path: &Path) -> AppResult<String> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(AppError::input_not_found(path));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path, e))?;
    let job_id = content.trim();
    if job_id.is_empty() {
        return Err(AppError::invalid_argument(
            "--job-id-file",
            format!("{} 中没有任务ID", path.display()),
        ));
    }
    Ok(job_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_job_id_file_trims() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch_job_id.txt");
        tokio::fs::write(&path, "batch_abc\n").await.unwrap();
        let job_id = tokio_test::assert_ok!(read_job_id_file(&path).await);
        assert_eq!(job_id, "batch_abc");

        tokio::fs::write(&path, "  \n").await.unwrap();
        let err = tokio_test::assert_err!(read_job_id_file(&path).await);
        assert!(err.is_config());
        assert!(read_job_id_file(&dir.path().join("none.txt"))
            .await
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn test_all_failed() {
        let summary = SubmitSummary {
            total: 2,
            failed: 2,
            ..SubmitSummary::default()
        };
        assert!(summary.all_failed());
        let partial = SubmitSummary {
            submitted: 1,
            ..summary
        };
        assert!(!partial.all_failed());
    }
}
