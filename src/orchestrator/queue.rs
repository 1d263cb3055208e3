//! 队列查看 - 编排层

use std::sync::Arc;

use chrono::TimeZone;
use tracing::info;

use crate::clients::BatchApi;
use crate::error::AppResult;
use crate::models::BatchSnapshot;
use crate::utils::logging::log_startup;

/// 队列统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueSummary {
    pub listed: usize,
    /// validating / in_progress / finalizing
    pub active: usize,
}

/// 列出最近的批处理任务
pub async fn show_queue(api: Arc<dyn BatchApi>, limit: u32) -> AppResult<QueueSummary> {
    log_startup("批处理队列", &format!("最多显示 {} 个任务", limit));

    let batches = api.list_batches(limit).await?;
    for batch in &batches {
        info!("{}", describe(batch));
    }

    let summary = QueueSummary {
        listed: batches.len(),
        active: batches.iter().filter(|b| b.status.is_active()).count(),
    };
    info!("{}", "=".repeat(60));
    info!(
        "📊 共 {} 个任务，其中 {} 个正在处理",
        summary.listed, summary.active
    );
    Ok(summary)
}

fn describe(batch: &BatchSnapshot) -> String {
    let created = batch
        .created_at
        .and_then(|ts| chrono::Local.timestamp_opt(ts, 0).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let counts = batch.counts();
    format!(
        "{} | {:<12} | 创建于 {} | 完成 {}/{} | 失败 {}",
        batch.id,
        batch.status.as_str(),
        created,
        counts.completed,
        counts.total,
        counts.failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_without_timestamp() {
        let batch: BatchSnapshot = serde_json::from_value(json!({
            "id": "batch_1",
            "status": "in_progress",
            "request_counts": {"total": 4, "completed": 1, "failed": 0}
        }))
        .unwrap();
        let line = describe(&batch);
        assert!(line.starts_with("batch_1 | in_progress"));
        assert!(line.contains("创建于 -"));
        assert!(line.contains("完成 1/4"));
    }
}
