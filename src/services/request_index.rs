//! 请求索引 - 业务能力层
//!
//! custom_id → (任务序号, 原始 URL 组)。结果只按 custom_id 精确匹配回原请求，
//! 不依赖结果在输出文件中的位置。

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::manifest::Manifest;
use crate::models::request::BatchRequestLine;
use crate::services::request_builder;
use crate::utils::json_file;

/// 索引中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRequest {
    /// 全局顺序：先按 job_index，再按文件内的行序
    pub ordinal: usize,
    pub job_index: usize,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestIndex {
    entries: HashMap<String, IndexedRequest>,
}

impl RequestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一条请求，custom_id 重复时保留先出现的一条
    pub fn insert(&mut self, custom_id: String, job_index: usize, urls: Vec<String>) {
        let ordinal = self.entries.len();
        if self.entries.contains_key(&custom_id) {
            warn!("custom_id 重复，忽略后出现的请求: {}", custom_id);
            return;
        }
        self.entries.insert(
            custom_id,
            IndexedRequest {
                ordinal,
                job_index,
                urls,
            },
        );
    }

    pub fn get(&self, custom_id: &str) -> Option<&IndexedRequest> {
        self.entries.get(custom_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 从清单中每个分片的输入文件重建索引
    pub async fn from_manifest(manifest: &Manifest) -> AppResult<Self> {
        let mut index = Self::new();
        for (job_index, entry) in &manifest.jobs {
            let lines: Vec<BatchRequestLine> = json_file::read_jsonl(&entry.input_file).await?;
            for line in lines {
                let urls = line.urls();
                index.insert(line.custom_id, *job_index, urls);
            }
        }
        info!("✓ 请求索引已建立: {} 个请求", index.len());
        Ok(index)
    }

    /// 单任务模式：按原始 URL 列表和批大小重新分组
    pub fn from_urls(urls: &[String], batch_size: usize) -> AppResult<Self> {
        let mut index = Self::new();
        for group in request_builder::build_single_groups(urls, batch_size)? {
            index.insert(group.custom_id, 0, group.urls);
        }
        Ok(index)
    }
}
