//! 请求构建 - 业务能力层
//!
//! URL 列表 → 分组（每组最多 B 个）→ 分片（J 个任务尽量均分）→ 请求行。
//! 分组与分片都只依赖输入顺序，同样的输入总是得到同样的 custom_id。

use tracing::warn;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::request::{
    BatchRequestLine, ChatMessage, ChatRequestBody, ContentPart, ImageUrl, BATCH_ENDPOINT,
};

/// 请求体参数
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&Config> for RequestSettings {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// 一个请求对应的 URL 组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestGroup {
    pub custom_id: String,
    pub urls: Vec<String>,
}

/// 一个批处理任务的分片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobShard {
    pub job_index: usize,
    pub groups: Vec<RequestGroup>,
}

impl JobShard {
    pub fn url_count(&self) -> usize {
        self.groups.iter().map(|g| g.urls.len()).sum()
    }
}

/// 单任务模式的 custom_id
pub fn single_custom_id(request_index: usize) -> String {
    format!("request-{}", request_index)
}

/// 多任务模式的 custom_id，带分片前缀保证跨文件唯一
pub fn shard_custom_id(job_index: usize, request_index: usize) -> String {
    format!("job-{}-request-{}", job_index, request_index)
}

/// 单个请求最多携带的图片数
pub const MAX_BATCH_SIZE: usize = 5;

/// 校验批大小，超过上限时降到 `MAX_BATCH_SIZE`
pub fn effective_batch_size(batch_size: usize) -> AppResult<usize> {
    if batch_size == 0 {
        return Err(AppError::invalid_argument("--batch-size", "必须大于等于 1"));
    }
    Ok(batch_size.min(MAX_BATCH_SIZE))
}

/// 按批大小切分 URL，最后一组可能不满
pub fn group_urls(urls: &[String], batch_size: usize) -> AppResult<Vec<Vec<String>>> {
    let effective = effective_batch_size(batch_size)?;
    if effective != batch_size {
        warn!(
            "⚠️ 批大小 {} 超过上限，已调整为 {}",
            batch_size, effective
        );
    }
    Ok(urls.chunks(effective).map(|chunk| chunk.to_vec()).collect())
}

/// 单任务模式：所有分组放进一个文件
pub fn build_single_groups(urls: &[String], batch_size: usize) -> AppResult<Vec<RequestGroup>> {
    Ok(group_urls(urls, batch_size)?
        .into_iter()
        .enumerate()
        .map(|(idx, urls)| RequestGroup {
            custom_id: single_custom_id(idx),
            urls,
        })
        .collect())
}

/// 多任务模式：把分组均分到 `jobs` 个分片
///
/// 前 `G % J` 个分片各多一组；分组数少于任务数时，空分片不会生成。
pub fn build_shards(urls: &[String], batch_size: usize, jobs: usize) -> AppResult<Vec<JobShard>> {
    if jobs == 0 {
        return Err(AppError::invalid_argument("--jobs", "必须大于等于 1"));
    }

    let mut groups = group_urls(urls, batch_size)?.into_iter();
    let base = groups.len() / jobs;
    let extra = groups.len() % jobs;

    let mut shards = Vec::new();
    for job_index in 0..jobs {
        let take = base + usize::from(job_index < extra);
        if take == 0 {
            break;
        }
        let groups: Vec<RequestGroup> = groups
            .by_ref()
            .take(take)
            .enumerate()
            .map(|(idx, urls)| RequestGroup {
                custom_id: shard_custom_id(job_index, idx),
                urls,
            })
            .collect();
        shards.push(JobShard { job_index, groups });
    }

    Ok(shards)
}

/// 把一组 URL 渲染成请求行：提示词文本 + 每个 URL 一个图片片段
pub fn render_request(
    group: &RequestGroup,
    prompt: &str,
    settings: &RequestSettings,
) -> BatchRequestLine {
    let mut content = Vec::with_capacity(group.urls.len() + 1);
    content.push(ContentPart::Text {
        text: prompt.to_string(),
    });
    content.extend(group.urls.iter().map(|url| ContentPart::ImageUrl {
        image_url: ImageUrl { url: url.clone() },
    }));

    BatchRequestLine {
        custom_id: group.custom_id.clone(),
        method: "POST".to_string(),
        url: BATCH_ENDPOINT.to_string(),
        body: ChatRequestBody {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn urls(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("https://example.com/u{}", i)).collect()
    }

    fn settings() -> RequestSettings {
        RequestSettings {
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.0,
            max_tokens: 100,
        }
    }

    #[test]
    fn test_group_counts_for_many_sizes() {
        for n in 0..40 {
            for b in 1..=MAX_BATCH_SIZE {
                let input = urls(n);
                let groups = build_single_groups(&input, b).unwrap();
                assert_eq!(groups.len(), (n + b - 1) / b, "n={} b={}", n, b);
                assert!(groups.iter().all(|g| !g.urls.is_empty() && g.urls.len() <= b));

                let flattened: Vec<String> =
                    groups.iter().flat_map(|g| g.urls.iter().cloned()).collect();
                assert_eq!(flattened, input, "每个 URL 恰好出现一次且保持顺序");
            }
        }
    }

    #[test]
    fn test_shards_are_disjoint_even_and_unique() {
        for n in 0..30 {
            for b in 1..5 {
                for j in 1..7 {
                    let input = urls(n);
                    let shards = build_shards(&input, b, j).unwrap();
                    let group_total: usize = shards.iter().map(|s| s.groups.len()).sum();
                    assert_eq!(group_total, (n + b - 1) / b);
                    assert!(shards.len() <= j);

                    let sizes: Vec<usize> = shards.iter().map(|s| s.groups.len()).collect();
                    if let (Some(max), Some(min)) = (sizes.iter().max(), sizes.iter().min()) {
                        assert!(max - min <= 1, "n={} b={} j={} sizes={:?}", n, b, j, sizes);
                    }

                    let ids: HashSet<&str> = shards
                        .iter()
                        .flat_map(|s| s.groups.iter().map(|g| g.custom_id.as_str()))
                        .collect();
                    assert_eq!(ids.len(), group_total);

                    let flattened: Vec<String> = shards
                        .iter()
                        .flat_map(|s| s.groups.iter().flat_map(|g| g.urls.iter().cloned()))
                        .collect();
                    assert_eq!(flattened, input);
                }
            }
        }
    }

    #[test]
    fn test_ten_urls_two_jobs() {
        let shards = build_shards(&urls(10), 5, 2).unwrap();
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[0].groups[0].custom_id, "job-0-request-0");
        assert_eq!(shards[1].groups[0].custom_id, "job-1-request-0");
        assert_eq!(shards[1].groups[0].urls[0], "https://example.com/u6");
        assert_eq!(shards[1].url_count(), 5);
    }

    #[test]
    fn test_more_jobs_than_groups_skips_empty_shards() {
        let shards = build_shards(&urls(3), 2, 5).unwrap();
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[1].job_index, 1);
    }

    #[test]
    fn test_zero_arguments_rejected() {
        assert!(build_single_groups(&urls(3), 0).unwrap_err().is_config());
        assert!(effective_batch_size(0).unwrap_err().is_config());
        assert!(build_shards(&urls(3), 1, 0).unwrap_err().is_config());
    }

    #[test]
    fn test_render_request() {
        let group = RequestGroup {
            custom_id: "request-0".to_string(),
            urls: urls(2),
        };
        let line = render_request(&group, "extract fields", &settings());
        assert_eq!(line.url, BATCH_ENDPOINT);
        assert_eq!(line.body.model, "gpt-4.1-mini");
        assert_eq!(line.urls(), group.urls);
        assert_eq!(
            line.body.messages[0].content[0],
            ContentPart::Text {
                text: "extract fields".to_string()
            }
        );
    }

    #[test]
    fn test_batch_size_clamped_to_five_images() {
        assert_eq!(effective_batch_size(3).unwrap(), 3);
        assert_eq!(effective_batch_size(8).unwrap(), MAX_BATCH_SIZE);

        let groups = build_single_groups(&urls(12), 8).unwrap();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.urls.len() <= MAX_BATCH_SIZE));
    }
}
