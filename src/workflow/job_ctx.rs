//! 任务上下文
//!
//! 封装"我正在处理第几个分片、对应哪个远端任务"这一信息

use std::fmt::Display;

/// 任务上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 分片索引
    pub job_index: usize,

    /// 远端任务ID（提交之前为空）
    pub job_id: Option<String>,
}

impl JobCtx {
    /// 尚未提交的分片
    pub fn new(job_index: usize) -> Self {
        Self {
            job_index,
            job_id: None,
        }
    }

    /// 已提交的任务
    pub fn submitted(job_index: usize, job_id: impl Into<String>) -> Self {
        Self {
            job_index,
            job_id: Some(job_id.into()),
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.job_id {
            Some(job_id) => write!(f, "[任务 {} #{}]", self.job_index, job_id),
            None => write!(f, "[任务 {}]", self.job_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(JobCtx::new(3).to_string(), "[任务 3]");
        assert_eq!(
            JobCtx::submitted(0, "batch_abc").to_string(),
            "[任务 0 #batch_abc]"
        );
    }
}
