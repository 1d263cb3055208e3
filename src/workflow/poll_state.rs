//! 轮询状态机
//!
//! 只根据观察到的状态做决定，不做任何 IO。
//! 终态不会被后续观察覆盖。

use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::{BatchSnapshot, JobStatus, RequestCounts};

/// 遇到失败任务时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 等所有任务进入终态
    #[default]
    WaitForAll,
    /// 任一任务失败立即停止轮询
    FailFast,
}

/// 轮询参数
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
    /// 只查询一轮
    pub no_wait: bool,
    pub policy: FailurePolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_wait: None,
            no_wait: false,
            policy: FailurePolicy::WaitForAll,
        }
    }
}

/// 单个任务的跟踪记录
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_index: usize,
    pub job_id: String,
    pub status: JobStatus,
    pub output_file_id: Option<String>,
    pub counts: RequestCounts,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// 全部进入终态
    AllTerminal,
    /// 单轮模式
    SinglePass,
    /// 有任务失败且策略为 fail-fast
    FailedFast,
    /// 超过最长等待时间
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    PollAgain { after: Duration },
    Finish(FinishReason),
}

/// 轮询跟踪器
#[derive(Debug, Default)]
pub struct PollTracker {
    jobs: BTreeMap<usize, JobRecord>,
}

impl PollTracker {
    /// 以已提交的任务创建跟踪器，初始状态为 Pending
    pub fn new(submitted: impl IntoIterator<Item = (usize, String)>) -> Self {
        let jobs = submitted
            .into_iter()
            .map(|(job_index, job_id)| {
                (
                    job_index,
                    JobRecord {
                        job_index,
                        job_id,
                        status: JobStatus::Pending,
                        output_file_id: None,
                        counts: RequestCounts::default(),
                        error: None,
                    },
                )
            })
            .collect();
        Self { jobs }
    }

    /// 记录一次状态观察
    ///
    /// # 返回
    /// 状态发生变化时返回新状态
    pub fn observe(&mut self, job_index: usize, snapshot: &BatchSnapshot) -> Option<JobStatus> {
        let record = self.jobs.get_mut(&job_index)?;
        if record.status.is_terminal() {
            return None;
        }

        let status = JobStatus::from(snapshot.status);
        record.counts = snapshot.counts();
        record.output_file_id = snapshot.output_file_id.clone();
        if status.is_failure() {
            record.error = snapshot
                .error_details()
                .or_else(|| Some(format!("任务状态: {}", snapshot.status.as_str())));
        }

        if record.status == status {
            None
        } else {
            record.status = status;
            Some(status)
        }
    }

    /// 标记任务失败（查询出错、结果取回失败等）
    pub fn mark_failed(&mut self, job_index: usize, error: impl ToString) {
        if let Some(record) = self.jobs.get_mut(&job_index) {
            record.status = JobStatus::Failed;
            record.error = Some(error.to_string());
        }
    }

    /// 尚未进入终态的任务
    pub fn pending(&self) -> Vec<(usize, String)> {
        self.jobs
            .values()
            .filter(|r| !r.status.is_terminal())
            .map(|r| (r.job_index, r.job_id.clone()))
            .collect()
    }

    pub fn get(&self, job_index: usize) -> Option<&JobRecord> {
        self.jobs.get(&job_index)
    }

    pub fn records(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.values()
    }

    pub fn count(&self, predicate: impl Fn(JobStatus) -> bool) -> usize {
        self.jobs.values().filter(|r| predicate(r.status)).count()
    }

    /// 根据当前状态决定下一步
    ///
    /// # 参数
    /// - `settings`: 轮询参数
    /// - `elapsed`: 自开始轮询以来经过的时间
    pub fn decide(&self, settings: &PollSettings, elapsed: Duration) -> NextAction {
        if self.pending().is_empty() {
            return NextAction::Finish(FinishReason::AllTerminal);
        }
        if settings.no_wait {
            return NextAction::Finish(FinishReason::SinglePass);
        }
        if settings.policy == FailurePolicy::FailFast && self.count(JobStatus::is_failure) > 0 {
            return NextAction::Finish(FinishReason::FailedFast);
        }
        if let Some(max_wait) = settings.max_wait {
            if elapsed >= max_wait {
                return NextAction::Finish(FinishReason::TimedOut);
            }
        }
        NextAction::PollAgain {
            after: settings.interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteBatchStatus;
    use serde_json::json;

    fn snapshot(status: &str) -> BatchSnapshot {
        let output_file_id = (status == "completed").then_some("file-out");
        serde_json::from_value(json!({
            "id": "batch",
            "status": status,
            "output_file_id": output_file_id,
            "request_counts": {"total": 2, "completed": 2, "failed": 0}
        }))
        .unwrap()
    }

    fn tracker() -> PollTracker {
        PollTracker::new(vec![(0, "batch_0".to_string()), (1, "batch_1".to_string())])
    }

    #[test]
    fn test_observe_reports_transitions_only() {
        let mut tracker = tracker();
        assert_eq!(
            tracker.observe(0, &snapshot("in_progress")),
            Some(JobStatus::Running)
        );
        assert_eq!(tracker.observe(0, &snapshot("finalizing")), None);
        assert_eq!(
            tracker.observe(0, &snapshot("completed")),
            Some(JobStatus::Completed)
        );
        assert_eq!(
            tracker.get(0).unwrap().output_file_id.as_deref(),
            Some("file-out")
        );
    }

    #[test]
    fn test_terminal_status_never_regresses() {
        let mut tracker = tracker();
        tracker.observe(0, &snapshot("completed"));
        assert_eq!(tracker.observe(0, &snapshot("in_progress")), None);
        assert_eq!(tracker.get(0).unwrap().status, JobStatus::Completed);

        tracker.mark_failed(1, "network down");
        assert_eq!(tracker.observe(1, &snapshot("completed")), None);
        assert_eq!(tracker.get(1).unwrap().error.as_deref(), Some("network down"));
    }

    #[test]
    fn test_failed_job_keeps_error_details() {
        let mut tracker = tracker();
        let failed: BatchSnapshot = serde_json::from_value(json!({
            "id": "batch_0",
            "status": "failed",
            "errors": {"data": [{"code": "invalid_request", "message": "bad line", "line": 1}]}
        }))
        .unwrap();
        assert_eq!(tracker.observe(0, &failed), Some(JobStatus::Failed));
        assert!(tracker
            .get(0)
            .unwrap()
            .error
            .as_deref()
            .unwrap()
            .contains("invalid_request"));
        assert_eq!(failed.status, RemoteBatchStatus::Failed);
    }

    #[test]
    fn test_decide() {
        let mut tracker = tracker();
        let settings = PollSettings {
            interval: Duration::from_secs(5),
            max_wait: Some(Duration::from_secs(60)),
            ..PollSettings::default()
        };

        assert_eq!(
            tracker.decide(&settings, Duration::ZERO),
            NextAction::PollAgain {
                after: Duration::from_secs(5)
            }
        );
        assert_eq!(
            tracker.decide(&settings, Duration::from_secs(60)),
            NextAction::Finish(FinishReason::TimedOut)
        );

        let single = PollSettings {
            no_wait: true,
            ..settings.clone()
        };
        assert_eq!(
            tracker.decide(&single, Duration::ZERO),
            NextAction::Finish(FinishReason::SinglePass)
        );

        tracker.observe(0, &snapshot("expired"));
        assert!(matches!(
            tracker.decide(&settings, Duration::ZERO),
            NextAction::PollAgain { .. }
        ));
        let fail_fast = PollSettings {
            policy: FailurePolicy::FailFast,
            ..settings.clone()
        };
        assert_eq!(
            tracker.decide(&fail_fast, Duration::ZERO),
            NextAction::Finish(FinishReason::FailedFast)
        );

        tracker.observe(1, &snapshot("completed"));
        assert_eq!(
            tracker.decide(&fail_fast, Duration::ZERO),
            NextAction::Finish(FinishReason::AllTerminal)
        );
    }
}
