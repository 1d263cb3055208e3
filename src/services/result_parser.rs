//! 结果解析 - 业务能力层
//!
//! 输出 JSONL 的一行 → 校验 → 取出模型回复 → 去掉 markdown 代码块 →
//! 按 custom_id 找回原始 URL 组 → 生成 `ResultRecord`。
//! 单行出错只跳过该行。

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ParseError;
use crate::models::result::{BatchOutputLine, ChatCompletionBody, ParsedResponse, ResultRecord};
use crate::services::request_index::RequestIndex;
use crate::utils::logging::truncate_text;

/// 结果排序键：(请求全局顺序, 组内位置)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordKey {
    pub ordinal: usize,
    pub position: usize,
}

/// 单个任务的解析结果
#[derive(Debug, Default)]
pub struct ParsedJob {
    pub records: Vec<(RecordKey, ResultRecord)>,
    pub lines: usize,
    pub skipped: usize,
}

/// 解析整个输出文件
pub fn parse_output(job_index: usize, raw: &str, index: &RequestIndex) -> ParsedJob {
    let mut parsed = ParsedJob::default();

    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        parsed.lines += 1;

        let result = parse_output_line(line_no + 1, line)
            .and_then(|output| enrich_line(job_index, &output, index));

        match result {
            Ok(records) => parsed.records.extend(records),
            Err(e) => {
                warn!("[任务 {}] ⚠️ 跳过第 {} 行: {}", job_index, line_no + 1, e);
                parsed.skipped += 1;
            }
        }
    }

    info!(
        "[任务 {}] ✓ 解析 {} 行，得到 {} 条结果，跳过 {} 行",
        job_index,
        parsed.lines,
        parsed.records.len(),
        parsed.skipped
    );
    parsed
}

/// 反序列化输出文件中的一行
pub fn parse_output_line(line_no: usize, raw: &str) -> Result<BatchOutputLine, ParseError> {
    serde_json::from_str(raw).map_err(|source| ParseError::InvalidLine {
        line: line_no,
        source,
    })
}

/// 取出模型回复文本
pub fn extract_content(line: &BatchOutputLine) -> Result<String, ParseError> {
    let custom_id = &line.custom_id;

    if let Some(error) = &line.error {
        return Err(ParseError::RequestFailed {
            custom_id: custom_id.clone(),
            status_code: None,
            message: format!(
                "{}: {}",
                error.code.as_deref().unwrap_or("unknown"),
                error.message.as_deref().unwrap_or("")
            ),
        });
    }

    let response = line.response.as_ref().ok_or_else(|| ParseError::MissingField {
        custom_id: custom_id.clone(),
        field: "response".to_string(),
    })?;

    if response.status_code != 200 {
        let message = response
            .body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        return Err(ParseError::RequestFailed {
            custom_id: custom_id.clone(),
            status_code: Some(response.status_code),
            message,
        });
    }

    let missing_content = || ParseError::MissingField {
        custom_id: custom_id.clone(),
        field: "choices[0].message.content".to_string(),
    };

    let body: ChatCompletionBody =
        serde_json::from_value(response.body.clone()).map_err(|_| missing_content())?;

    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(missing_content)
}

/// 去掉 ```json ... ``` 代码块包裹
pub fn strip_code_fence(content: &str) -> &str {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// 能解析为 JSON 的保留结构，否则保留原文
pub fn parse_content(content: &str) -> ParsedResponse {
    let stripped = strip_code_fence(content);
    match serde_json::from_str::<Value>(stripped) {
        Ok(Value::String(text)) => ParsedResponse::Raw(text),
        Ok(value) => ParsedResponse::Structured(value),
        Err(e) => {
            debug!("回复不是 JSON ({}): {}", e, truncate_text(stripped, 400));
            ParsedResponse::Raw(stripped.to_string())
        }
    }
}

/// 把一行结果拼回原始 URL
///
/// 回复是 JSON 数组时逐个元素对应组内 URL；其他回复整体附在组内每个 URL 上。
pub fn enrich_line(
    job_index: usize,
    line: &BatchOutputLine,
    index: &RequestIndex,
) -> Result<Vec<(RecordKey, ResultRecord)>, ParseError> {
    let request = index
        .get(&line.custom_id)
        .ok_or_else(|| ParseError::UnknownCustomId {
            custom_id: line.custom_id.clone(),
        })?;

    let content = extract_content(line)?;
    let parsed = parse_content(&content);

    let record = |position: usize, url: &String, parsed_response: ParsedResponse| {
        (
            RecordKey {
                ordinal: request.ordinal,
                position,
            },
            ResultRecord {
                job_index,
                custom_id: line.custom_id.clone(),
                url: url.clone(),
                parsed_response,
            },
        )
    };

    let records = match parsed {
        ParsedResponse::Structured(Value::Array(items)) => {
            if items.len() != request.urls.len() {
                warn!(
                    "[任务 {}] {} 返回 {} 条记录，但请求包含 {} 个 URL",
                    job_index,
                    line.custom_id,
                    items.len(),
                    request.urls.len()
                );
            }
            items
                .into_iter()
                .zip(request.urls.iter())
                .enumerate()
                .map(|(pos, (item, url))| record(pos, url, ParsedResponse::Structured(item)))
                .collect()
        }
        other => request
            .urls
            .iter()
            .enumerate()
            .map(|(pos, url)| record(pos, url, other.clone()))
            .collect(),
    };

    Ok(records)
}
