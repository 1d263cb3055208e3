//! 轮询与汇总阶段 - 编排层
//!
//! ## 职责
//!
//! 1. **轮询**：每轮通过有界并发池查询所有未完成任务
//! 2. **取回**：任务完成时下载原始结果（本地已有则复用）
//! 3. **汇总**：按 custom_id 拼回 URL，排序后一次性写出
//!
//! 停止条件由 `PollTracker::decide` 决定，本模块只负责 IO 和等待。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::clients::BatchApi;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{load_urls, BatchSnapshot, JobIds, JobStatus, Manifest, ResultRecord};
use crate::orchestrator::create::RAW_RESULTS_PREFIX;
use crate::orchestrator::submit::read_job_id_file;
use crate::orchestrator::worker_pool::{run_bounded, validate_workers};
use crate::services::request_index::RequestIndex;
use crate::services::result_parser;
use crate::utils::json_file;
use crate::utils::logging::{log_round_start, log_startup, print_final_stats, FinalStats};
use crate::workflow::{FinishReason, JobCtx, JobFlow, NextAction, PollSettings, PollTracker};

/// 原始结果文件名（并发模式）
pub fn raw_results_file_name(job_index: usize) -> String {
    format!("{}{}.jsonl", RAW_RESULTS_PREFIX, job_index)
}

/// 轮询汇总结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    /// 提交阶段就已失败的分片
    pub submit_failed: usize,
    pub records: usize,
    pub skipped_lines: usize,
    /// (job_index, 错误信息)
    pub failures: Vec<(usize, String)>,
    pub output: PathBuf,
}

impl CheckSummary {
    /// 没有任何任务完成且没有任务仍在运行
    pub fn all_failed(&self) -> bool {
        self.completed == 0 && self.pending == 0 && (self.failed + self.submit_failed) > 0
    }
}

/// 待轮询的任务
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub job_index: usize,
    pub job_id: String,
    pub raw_path: PathBuf,
}

/// 单任务模式：轮询、下载、解析
///
/// # 参数
/// - `job_id`: 命令行给出的任务ID；为空时读取 `job_id_file`
/// - `raw_output`: 原始结果 JSONL
/// - `parsed_output`: 解析后的 JSON
/// - `urls_file` / `batch_size`: 用于重建 custom_id → URL 的对应关系
pub async fn check_single(
    api: Arc<dyn BatchApi>,
    job_id: Option<String>,
    job_id_file: &Path,
    raw_output: &Path,
    parsed_output: &Path,
    urls_file: &Path,
    batch_size: usize,
    settings: &PollSettings,
) -> AppResult<CheckSummary> {
    let job_id = match job_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => read_job_id_file(job_id_file).await?,
    };
    log_startup("检查批处理任务", &format!("任务ID: {}", job_id));

    let urls = load_urls(urls_file).await?;
    let index = RequestIndex::from_urls(&urls, batch_size)?;

    let targets = vec![PollTarget {
        job_index: 0,
        job_id,
        raw_path: raw_output.to_path_buf(),
    }];
    run_check(api, targets, 0, &index, settings, 1, parsed_output).await
}

/// 并发模式：按任务ID文件轮询所有分片并合并结果
///
/// 每个分片的原始结果保存在批处理目录下的 `batch_results_{job_index}.jsonl`。
pub async fn check_concurrent(
    config: &Config,
    api: Arc<dyn BatchApi>,
    job_ids_file: &Path,
    manifest_file: &Path,
    output_file: &Path,
    settings: &PollSettings,
    max_workers: usize,
) -> AppResult<CheckSummary> {
    let max_workers = validate_workers(max_workers)?;
    log_startup("并发检查批处理任务", &format!("最大并发数: {}", max_workers));

    let job_ids = JobIds::load(job_ids_file).await?;
    let manifest = Manifest::load(manifest_file).await?;
    let index = RequestIndex::from_manifest(&manifest).await?;

    let mut targets = Vec::new();
    let mut submit_failed = 0;
    let mut stale = 0;
    for (job_index, record) in &job_ids.0 {
        let current = manifest
            .jobs
            .get(job_index)
            .is_some_and(|entry| record.belongs_to(&manifest.run_id, &entry.input_file));
        if !current {
            stale += 1;
            continue;
        }
        match record.submitted_job_id() {
            Some(job_id) => targets.push(PollTarget {
                job_index: *job_index,
                job_id: job_id.to_string(),
                raw_path: config.batch_path(raw_results_file_name(*job_index)),
            }),
            None => submit_failed += 1,
        }
    }

    if stale > 0 {
        warn!("⚠️ {} 条提交记录不属于当前清单，已忽略", stale);
    }
    if submit_failed > 0 {
        warn!("⚠️ {} 个分片提交失败，不参与轮询", submit_failed);
    }

    run_check(
        api,
        targets,
        submit_failed,
        &index,
        settings,
        max_workers,
        output_file,
    )
    .await
}

/// 轮询直到停止条件满足，然后汇总已完成任务的结果
pub async fn run_check(
    api: Arc<dyn BatchApi>,
    targets: Vec<PollTarget>,
    submit_failed: usize,
    index: &RequestIndex,
    settings: &PollSettings,
    max_workers: usize,
    output: &Path,
) -> AppResult<CheckSummary> {
    let raw_paths: BTreeMap<usize, PathBuf> = targets
        .iter()
        .map(|t| (t.job_index, t.raw_path.clone()))
        .collect();
    let total = targets.len();

    let mut tracker = PollTracker::new(targets.into_iter().map(|t| (t.job_index, t.job_id)));
    let mut raw_results: BTreeMap<usize, String> = BTreeMap::new();
    let flow = JobFlow::new(api);
    let started = Instant::now();
    let mut round = 0;

    let reason = loop {
        let pending = tracker.pending();
        if pending.is_empty() {
            break FinishReason::AllTerminal;
        }
        round += 1;
        log_round_start(round, pending.len(), total);

        let items: Vec<(usize, (String, PathBuf))> = pending
            .into_iter()
            .map(|(job_index, job_id)| {
                let raw_path = raw_paths.get(&job_index).cloned().unwrap_or_default();
                (job_index, (job_id, raw_path))
            })
            .collect();

        let worker_flow = flow.clone();
        let results = run_bounded(
            max_workers,
            items,
            move |job_index, (job_id, raw_path): (String, PathBuf)| {
                let flow = worker_flow.clone();
                async move { poll_once(&flow, job_index, job_id, raw_path).await }
            },
        )
        .await;

        for (job_index, result) in results {
            match result.map_err(AppError::from).and_then(|r| r) {
                Ok((snapshot, raw)) => {
                    if let Some(status) = tracker.observe(job_index, &snapshot) {
                        log_transition(job_index, status, &snapshot);
                    }
                    if let Some(raw) = raw {
                        raw_results.insert(job_index, raw);
                    }
                }
                Err(e) => {
                    error!("[任务 {}] ❌ 检查失败: {}", job_index, e);
                    tracker.mark_failed(job_index, e);
                }
            }
        }

        match tracker.decide(settings, started.elapsed()) {
            NextAction::PollAgain { after } => {
                info!(
                    "⏳ {} 个任务未完成，{} 秒后再次检查",
                    tracker.pending().len(),
                    after.as_secs()
                );
                tokio::time::sleep(after).await;
            }
            NextAction::Finish(reason) => break reason,
        }
    };
    log_finish(reason, &tracker);

    let (records, skipped_lines) = aggregate(&raw_results, index);
    json_file::write_json_pretty(output, &records).await?;

    let summary = CheckSummary {
        total,
        completed: tracker.count(|s| s == JobStatus::Completed),
        failed: tracker.count(JobStatus::is_failure),
        pending: tracker.count(|s| !s.is_terminal()),
        submit_failed,
        records: records.len(),
        skipped_lines,
        failures: tracker
            .records()
            .filter(|r| r.status.is_failure())
            .map(|r| {
                (
                    r.job_index,
                    r.error.clone().unwrap_or_else(|| "未知错误".to_string()),
                )
            })
            .collect(),
        output: output.to_path_buf(),
    };

    for (job_index, message) in &summary.failures {
        warn!("[任务 {}] ❌ {}", job_index, message);
    }
    print_final_stats(
        "检查完成统计",
        FinalStats {
            success: summary.completed,
            failed: summary.failed + summary.submit_failed,
            pending: summary.pending,
            total: summary.total + summary.submit_failed,
        },
        Some(output),
    );
    info!(
        "📄 共 {} 条结果，跳过 {} 行",
        summary.records, summary.skipped_lines
    );

    Ok(summary)
}

/// 查询一次任务状态，已完成时取回原始结果
async fn poll_once(
    flow: &JobFlow,
    job_index: usize,
    job_id: String,
    raw_path: PathBuf,
) -> AppResult<(BatchSnapshot, Option<String>)> {
    let ctx = JobCtx::submitted(job_index, job_id.clone());
    let snapshot = flow.check(&ctx, &job_id).await?;
    let raw = if JobStatus::from(snapshot.status) == JobStatus::Completed {
        Some(flow.fetch_results(&ctx, &snapshot, &raw_path).await?)
    } else {
        None
    };
    Ok((snapshot, raw))
}

/// 解析所有已取回的结果，按 (请求顺序, 组内位置) 排序
fn aggregate(raw_results: &BTreeMap<usize, String>, index: &RequestIndex) -> (Vec<ResultRecord>, usize) {
    let mut keyed = Vec::new();
    let mut skipped = 0;
    for (job_index, raw) in raw_results {
        let parsed = result_parser::parse_output(*job_index, raw, index);
        skipped += parsed.skipped;
        keyed.extend(parsed.records);
    }
    keyed.sort_by_key(|(key, _)| *key);
    (keyed.into_iter().map(|(_, record)| record).collect(), skipped)
}

fn log_transition(job_index: usize, status: JobStatus, snapshot: &BatchSnapshot) {
    match status {
        JobStatus::Completed => info!("[任务 {}] ✅ 已完成", job_index),
        s if s.is_failure() => error!(
            "[任务 {}] ❌ 进入终态: {}",
            job_index,
            snapshot.status.as_str()
        ),
        _ => info!("[任务 {}] 状态变为: {}", job_index, snapshot.status.as_str()),
    }
}

fn log_finish(reason: FinishReason, tracker: &PollTracker) {
    match reason {
        FinishReason::AllTerminal => info!("✓ 所有任务均已结束"),
        FinishReason::SinglePass => info!("✓ 单轮检查结束 (--no-wait)"),
        FinishReason::FailedFast => warn!("⚠️ 有任务失败，停止轮询 (--fail-fast)"),
        FinishReason::TimedOut => warn!("⚠️ 超过最长等待时间，停止轮询"),
    }
    for (job_index, job_id) in tracker.pending() {
        warn!("[任务 {}] ⏳ 仍未完成: {}", job_index, job_id);
    }
}
