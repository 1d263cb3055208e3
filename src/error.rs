//! 错误类型
//!
//! 三类错误对应三种处理策略：
//! - `ConfigError`：致命，在任何远程调用之前终止
//! - `RemoteApiError`：按任务记录，不影响其他任务
//! - `ParseError`：跳过单行结果，继续汇总
//!
//! `FileError` 只对协调文件（manifest、任务ID文件、最终输出）致命。

use std::path::Path;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 远程 API 错误
    #[error("API错误: {0}")]
    Remote(#[from] RemoteApiError),
    /// 结果解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },

    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 输入文件不存在
    #[error("输入文件不存在: {path}")]
    InputFileNotFound { path: String },

    /// 提示词文件无法读取
    #[error("无法读取提示词文件 ({path}): {source}")]
    PromptFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 输入文件格式不正确
    #[error("输入文件格式不正确 ({path}): {reason}")]
    MalformedInput { path: String, reason: String },

    /// 命令行参数不合法
    #[error("参数 {name} 不合法: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// 指定的 dotenv 文件无法加载
    #[error("无法加载环境变量文件 ({path}): {source}")]
    EnvFileFailed {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}

/// 远程 API 错误
#[derive(Debug, Error)]
pub enum RemoteApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// 响应内容与文档结构不符
    #[error("API响应无法解析 ({endpoint}): {source}")]
    UnexpectedPayload {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// 任务已完成但没有输出文件
    #[error("任务 {job_id} 已完成但没有输出文件")]
    MissingOutputFile { job_id: String },

    /// worker 任务异常退出
    #[error("worker 任务执行失败: {0}")]
    WorkerFailed(String),
}

/// 结果解析错误
#[derive(Debug, Error)]
pub enum ParseError {
    /// 结果行不是合法 JSON
    #[error("第 {line} 行不是合法的结果对象: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// 单个请求在远端失败
    #[error("请求 {custom_id} 失败 (status={status_code:?}): {message}")]
    RequestFailed {
        custom_id: String,
        status_code: Option<u16>,
        message: String,
    },

    /// 响应缺少必要字段
    #[error("请求 {custom_id} 的响应缺少字段: {field}")]
    MissingField { custom_id: String, field: String },

    /// custom_id 不在请求索引中
    #[error("未知的 custom_id: {custom_id}")]
    UnknownCustomId { custom_id: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON 内容不合法
    #[error("JSON解析失败 ({path}): {source}")]
    JsonInvalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: &Path, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: &Path, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 创建 JSON 解析错误
    pub fn json_invalid(path: &Path, source: serde_json::Error) -> Self {
        AppError::File(FileError::JsonInvalid {
            path: path.display().to_string(),
            source,
        })
    }

    /// 创建输入文件不存在错误
    pub fn input_not_found(path: &Path) -> Self {
        AppError::Config(ConfigError::InputFileNotFound {
            path: path.display().to_string(),
        })
    }

    /// 创建参数不合法错误
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        })
    }

    /// 是否为致命的配置错误
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_))
    }
}

impl RemoteApiError {
    /// 创建网络请求失败错误
    pub fn request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        RemoteApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_fatal() {
        let err = AppError::input_not_found(Path::new("missing.json"));
        assert!(err.is_config());
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_remote_error_is_not_config() {
        let err: AppError = RemoteApiError::MissingOutputFile {
            job_id: "batch_1".to_string(),
        }
        .into();
        assert!(!err.is_config());
        assert!(err.to_string().contains("batch_1"));
    }
}
