//! 批处理 API 能力边界
//!
//! 编排层只依赖这个 trait，测试时可以换成内存实现。

use async_trait::async_trait;

use crate::error::RemoteApiError;
use crate::models::BatchSnapshot;

/// 远端批处理服务
#[async_trait]
pub trait BatchApi: Send + Sync {
    /// 上传 JSONL 输入文件（purpose = batch），返回文件ID
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String, RemoteApiError>;

    /// 以已上传文件创建批处理任务
    async fn create_batch(&self, input_file_id: &str) -> Result<BatchSnapshot, RemoteApiError>;

    /// 查询任务状态
    async fn retrieve_batch(&self, job_id: &str) -> Result<BatchSnapshot, RemoteApiError>;

    /// 下载文件内容
    async fn download_file(&self, file_id: &str) -> Result<String, RemoteApiError>;

    /// 列出最近的任务
    async fn list_batches(&self, limit: u32) -> Result<Vec<BatchSnapshot>, RemoteApiError>;
}
