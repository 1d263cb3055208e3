//! 有界并发池
//!
//! Semaphore 限制同时运行的 worker 数量，每个条目一个 tokio 任务。
//! 单个 worker 崩溃只影响它自己的条目。

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::error;

use crate::error::{AppError, AppResult, RemoteApiError};

/// 校验并发宽度
pub fn validate_workers(max_workers: usize) -> AppResult<usize> {
    if max_workers == 0 {
        return Err(AppError::invalid_argument(
            "--max-workers",
            "必须大于等于 1",
        ));
    }
    Ok(max_workers)
}

/// 以有界并发处理所有条目
///
/// # 参数
/// - `max_workers`: 最大并发数
/// - `items`: (索引, 输入) 列表
/// - `work`: 每个条目的处理函数
///
/// # 返回
/// 按输入顺序返回 (索引, 结果)；worker 异常退出时结果为 `WorkerFailed`
pub async fn run_bounded<I, O, F, Fut>(
    max_workers: usize,
    items: Vec<(usize, I)>,
    work: F,
) -> Vec<(usize, Result<O, RemoteApiError>)>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(usize, I) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut indices = Vec::with_capacity(items.len());
    let mut handles = Vec::with_capacity(items.len());

    for (index, input) in items {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("[任务 {}] 无法获取 worker: {}", index, e);
                continue;
            }
        };

        let work = work.clone();
        indices.push(index);
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            work(index, input).await
        }));
    }

    join_all(handles)
        .await
        .into_iter()
        .zip(indices)
        .map(|(joined, index)| {
            let result = joined.map_err(|e| {
                error!("[任务 {}] worker 执行失败: {}", index, e);
                RemoteApiError::WorkerFailed(e.to_string())
            });
            (index, result)
        })
        .collect()
}
