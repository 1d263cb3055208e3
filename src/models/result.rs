//! 批处理结果模型

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 输出文件中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutputLine {
    #[serde(default)]
    pub id: Option<String>,
    pub custom_id: String,
    #[serde(default)]
    pub response: Option<BatchOutputResponse>,
    #[serde(default)]
    pub error: Option<BatchOutputError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutputResponse {
    pub status_code: u16,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutputError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Chat Completions 响应体中用到的部分
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionBody {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// 模型输出：能解析成 JSON 的保留结构，否则保留原文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedResponse {
    Structured(Value),
    Raw(String),
}

/// 汇总后的单条结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub job_index: usize,
    pub custom_id: String,
    pub url: String,
    pub parsed_response: ParsedResponse,
}
