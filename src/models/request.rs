//! 批处理请求行
//!
//! 对应 Batch API 输入 JSONL 的一行：`{custom_id, method, url, body}`。

use serde::{Deserialize, Serialize};

/// Batch API 请求的目标端点
pub const BATCH_ENDPOINT: &str = "/v1/chat/completions";

/// 批处理输入文件中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestLine {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: ChatRequestBody,
}

/// Chat Completions 请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequestBody {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// 消息内容片段（文本或图片）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl BatchRequestLine {
    /// 按顺序取出请求中携带的所有 URL
    pub fn urls(&self) -> Vec<String> {
        self.body
            .messages
            .iter()
            .flat_map(|message| message.content.iter())
            .filter_map(|part| match part {
                ContentPart::ImageUrl { image_url } => Some(image_url.url.clone()),
                ContentPart::Text { .. } => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let line = BatchRequestLine {
            custom_id: "job-0-request-0".to_string(),
            method: "POST".to_string(),
            url: BATCH_ENDPOINT.to_string(),
            body: ChatRequestBody {
                model: "gpt-4.1-mini".to_string(),
                temperature: 0.0,
                max_tokens: 10,
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: vec![
                        ContentPart::Text {
                            text: "describe".to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: "https://a/1.png".to_string(),
                            },
                        },
                    ],
                }],
            },
        };

        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(
            value["body"]["messages"][0]["content"][1],
            json!({"type": "image_url", "image_url": {"url": "https://a/1.png"}})
        );
        assert_eq!(value["body"]["messages"][0]["content"][0]["type"], "text");
        assert_eq!(line.urls(), vec!["https://a/1.png".to_string()]);
    }
}
