//! 批处理任务模型
//!
//! - `BatchSnapshot`：远端返回的 batch 对象（只取用到的字段）
//! - `JobStatus`：本地状态机使用的六种状态
//! - `JobIds`：提交阶段写出的任务ID文件

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::utils::json_file;

/// 远端 batch 状态（OpenAI 文档中的取值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteBatchStatus {
    Validating,
    InProgress,
    Finalizing,
    Cancelling,
    Completed,
    Failed,
    Expired,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl RemoteBatchStatus {
    /// 是否仍在占用队列
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RemoteBatchStatus::Validating
                | RemoteBatchStatus::InProgress
                | RemoteBatchStatus::Finalizing
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RemoteBatchStatus::Validating => "validating",
            RemoteBatchStatus::InProgress => "in_progress",
            RemoteBatchStatus::Finalizing => "finalizing",
            RemoteBatchStatus::Cancelling => "cancelling",
            RemoteBatchStatus::Completed => "completed",
            RemoteBatchStatus::Failed => "failed",
            RemoteBatchStatus::Expired => "expired",
            RemoteBatchStatus::Cancelled => "cancelled",
            RemoteBatchStatus::Unknown => "unknown",
        }
    }
}

/// 本地任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl JobStatus {
    /// 终态之后不再轮询
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Expired | JobStatus::Cancelled
        )
    }

    /// 以失败告终的终态
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Expired | JobStatus::Cancelled
        )
    }
}

impl From<RemoteBatchStatus> for JobStatus {
    fn from(status: RemoteBatchStatus) -> Self {
        match status {
            RemoteBatchStatus::Validating | RemoteBatchStatus::Unknown => JobStatus::Pending,
            RemoteBatchStatus::InProgress
            | RemoteBatchStatus::Finalizing
            | RemoteBatchStatus::Cancelling => JobStatus::Running,
            RemoteBatchStatus::Completed => JobStatus::Completed,
            RemoteBatchStatus::Failed => JobStatus::Failed,
            RemoteBatchStatus::Expired => JobStatus::Expired,
            RemoteBatchStatus::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// 请求计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchErrors {
    #[serde(default)]
    pub data: Vec<BatchErrorItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchErrorItem {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
}

/// 远端 batch 对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub id: String,
    pub status: RemoteBatchStatus,
    #[serde(default)]
    pub input_file_id: Option<String>,
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub error_file_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub request_counts: Option<RequestCounts>,
    #[serde(default)]
    pub errors: Option<BatchErrors>,
}

impl BatchSnapshot {
    /// 拼接 `errors.data` 中的错误信息
    pub fn error_details(&self) -> Option<String> {
        let errors = self.errors.as_ref()?;
        if errors.data.is_empty() {
            return None;
        }
        let details: Vec<String> = errors
            .data
            .iter()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.code.as_deref().unwrap_or("unknown"),
                    e.message.as_deref().unwrap_or("")
                )
            })
            .collect();
        Some(details.join("; "))
    }

    pub fn counts(&self) -> RequestCounts {
        self.request_counts.unwrap_or_default()
    }
}

// ========== 任务ID文件 ==========

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Success,
    Failed,
}

/// 单个分片的提交记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub job_id: Option<String>,
    pub file_id: Option<String>,
    pub input_file: PathBuf,
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 提交时清单的创建标识
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl SubmissionRecord {
    pub fn success(input_file: PathBuf, file_id: String, job_id: String) -> Self {
        Self {
            job_id: Some(job_id),
            file_id: Some(file_id),
            input_file,
            status: SubmissionStatus::Success,
            error: None,
            run_id: None,
        }
    }

    pub fn failed(input_file: PathBuf, error: impl ToString) -> Self {
        Self {
            job_id: None,
            file_id: None,
            input_file,
            status: SubmissionStatus::Failed,
            error: Some(error.to_string()),
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    /// 记录是否来自该清单的该分片
    pub fn belongs_to(&self, run_id: &str, input_file: &Path) -> bool {
        self.input_file.as_path() == input_file && self.run_id.as_deref().unwrap_or_default() == run_id
    }

    /// 是否是针对该清单分片的成功提交
    pub fn is_current_success(&self, run_id: &str, input_file: &Path) -> bool {
        self.status == SubmissionStatus::Success && self.belongs_to(run_id, input_file)
    }

    /// 成功提交时返回远端任务ID
    pub fn submitted_job_id(&self) -> Option<&str> {
        match self.status {
            SubmissionStatus::Success => self.job_id.as_deref(),
            SubmissionStatus::Failed => None,
        }
    }
}

/// 任务ID文件：job_index → 提交记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIds(pub BTreeMap<usize, SubmissionRecord>);

impl JobIds {
    /// 加载任务ID文件，不存在时返回配置错误
    pub async fn load(path: &Path) -> AppResult<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(AppError::input_not_found(path));
        }
        json_file::read_json(path).await
    }

    /// 加载任务ID文件，不存在时返回空表
    pub async fn load_or_default(path: &Path) -> AppResult<Self> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            json_file::read_json(path).await
        } else {
            Ok(Self::default())
        }
    }

    pub async fn save(&self, path: &Path) -> AppResult<()> {
        json_file::write_json_pretty(path, self).await
    }

    /// 成功提交的任务：(job_index, job_id)
    pub fn submitted(&self) -> Vec<(usize, String)> {
        self.0
            .iter()
            .filter_map(|(idx, record)| record.submitted_job_id().map(|id| (*idx, id.to_string())))
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.0
            .values()
            .filter(|r| r.status == SubmissionStatus::Failed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        assert_eq!(JobStatus::from(RemoteBatchStatus::Validating), JobStatus::Pending);
        assert_eq!(JobStatus::from(RemoteBatchStatus::Finalizing), JobStatus::Running);
        assert_eq!(JobStatus::from(RemoteBatchStatus::Cancelling), JobStatus::Running);
        assert!(JobStatus::from(RemoteBatchStatus::Expired).is_failure());
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Completed.is_failure());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_snapshot_tolerates_unknown_status_and_missing_fields() {
        let snapshot: BatchSnapshot =
            serde_json::from_value(json!({"id": "batch_1", "status": "paused"})).unwrap();
        assert_eq!(snapshot.status, RemoteBatchStatus::Unknown);
        assert_eq!(snapshot.counts(), RequestCounts::default());
        assert!(snapshot.error_details().is_none());
    }

    #[test]
    fn test_error_details() {
        let snapshot: BatchSnapshot = serde_json::from_value(json!({
            "id": "batch_1",
            "status": "failed",
            "errors": {"data": [
                {"code": "invalid_json_line", "message": "bad line", "line": 3},
                {"message": "other"}
            ]}
        }))
        .unwrap();
        assert_eq!(
            snapshot.error_details().unwrap(),
            "invalid_json_line: bad line; unknown: other"
        );
    }

    #[test]
    fn test_job_ids_wire_format() {
        let ids = JobIds(BTreeMap::from([
            (
                0,
                SubmissionRecord::success(
                    PathBuf::from("in_0.jsonl"),
                    "file-0".to_string(),
                    "batch_0".to_string(),
                ),
            ),
            (1, SubmissionRecord::failed(PathBuf::from("in_1.jsonl"), "boom")),
        ]));

        let value = serde_json::to_value(&ids).unwrap();
        assert_eq!(value["0"]["job_id"], "batch_0");
        assert_eq!(value["1"]["status"], "failed");
        assert_eq!(value["1"]["error"], "boom");
        assert!(value["0"].get("error").is_none());

        assert_eq!(ids.submitted(), vec![(0, "batch_0".to_string())]);
        assert_eq!(ids.failed_count(), 1);
    }

    #[test]
    fn test_success_only_counts_for_same_run_and_input() {
        let record = SubmissionRecord::success(
            PathBuf::from("in_0.jsonl"),
            "file-0".to_string(),
            "batch_0".to_string(),
        )
        .with_run_id("run-a");

        assert!(record.is_current_success("run-a", Path::new("in_0.jsonl")));
        assert!(!record.is_current_success("run-b", Path::new("in_0.jsonl")));
        assert!(!record.is_current_success("run-a", Path::new("in_1.jsonl")));

        let failed = SubmissionRecord::failed(PathBuf::from("in_0.jsonl"), "boom").with_run_id("run-a");
        assert!(!failed.is_current_success("run-a", Path::new("in_0.jsonl")));
    }
}
