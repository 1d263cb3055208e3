//! 创建阶段 - 编排层
//!
//! URL 列表 + 提示词 → JSONL 输入文件（并发模式下另有清单）

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError};
use crate::models::{load_prompt, load_urls, BatchRequestLine, Manifest, ManifestEntry};
use crate::services::request_builder::{self, RequestGroup, RequestSettings};
use crate::utils::json_file;
use crate::utils::logging::{log_inputs_loaded, log_startup};

/// 并发提交写出的任务ID文件（默认名）
pub const JOB_IDS_FILE: &str = "batch_job_ids.json";

/// 并发模式原始结果文件名前缀
pub const RAW_RESULTS_PREFIX: &str = "batch_results_";

/// 清单文件名
pub fn manifest_file_name(output_prefix: &str) -> String {
    format!("{}_manifest.json", output_prefix)
}

/// 分片输入文件名
pub fn shard_file_name(output_prefix: &str, job_index: usize) -> String {
    format!("{}_{}.jsonl", output_prefix, job_index)
}

/// 创建单个输入文件
///
/// # 参数
/// - `input_file`: URL 列表文件
/// - `output_file`: 输出 JSONL 文件
/// - `batch_size`: 每个请求的 URL 数
/// - `prompt_file`: 提示词文件
///
/// # 返回
/// 返回写入的文件路径
pub async fn create_single(
    config: &Config,
    input_file: &Path,
    output_file: &Path,
    batch_size: usize,
    prompt_file: &Path,
) -> AppResult<PathBuf> {
    log_startup("创建批处理输入文件", &format!("批大小: {}", batch_size));

    let (urls, prompt) = load_inputs(input_file, prompt_file).await?;
    let groups = request_builder::build_single_groups(&urls, batch_size)?;
    log_inputs_loaded(urls.len(), batch_size, 1);

    let lines = render_all(&groups, &prompt, config);
    json_file::write_jsonl(output_file, &lines).await?;

    info!(
        "✅ 已写入 {} 个请求 ({} 个 URL): {}",
        lines.len(),
        urls.len(),
        output_file.display()
    );
    Ok(output_file.to_path_buf())
}

/// 创建多个分片输入文件和清单
///
/// 先删除同一前缀的旧分片和旧清单，避免上次运行的残留文件被误提交。
///
/// # 返回
/// 返回写入的清单
pub async fn create_concurrent(
    config: &Config,
    input_file: &Path,
    batch_size: usize,
    jobs: usize,
    output_prefix: &str,
    prompt_file: &Path,
) -> AppResult<(PathBuf, Manifest)> {
    log_startup(
        "创建并发批处理输入文件",
        &format!("批大小: {} | 任务数: {}", batch_size, jobs),
    );

    let (urls, prompt) = load_inputs(input_file, prompt_file).await?;
    let shards = request_builder::build_shards(&urls, batch_size, jobs)?;
    log_inputs_loaded(urls.len(), batch_size, shards.len());

    let manifest_path = config.batch_path(manifest_file_name(output_prefix));
    remove_stale_artifacts(&manifest_path, output_prefix).await?;

    let mut entries = BTreeMap::new();
    for shard in &shards {
        let input_path = config.batch_path(shard_file_name(output_prefix, shard.job_index));
        let lines = render_all(&shard.groups, &prompt, config);
        json_file::write_jsonl(&input_path, &lines).await?;

        info!(
            "[任务 {}] ✓ {} 个请求, {} 个 URL → {}",
            shard.job_index,
            lines.len(),
            shard.url_count(),
            input_path.display()
        );
        entries.insert(
            shard.job_index,
            ManifestEntry {
                input_file: input_path,
                requests: lines.len(),
                urls: shard.url_count(),
            },
        );
    }

    let manifest = Manifest {
        run_id: Manifest::new_run_id(),
        total_urls: urls.len(),
        batch_size: request_builder::effective_batch_size(batch_size)?,
        jobs: entries,
    };
    manifest.save(&manifest_path).await?;
    info!(
        "✅ 已创建 {} 个任务文件，清单: {}",
        manifest.jobs.len(),
        manifest_path.display()
    );

    Ok((manifest_path, manifest))
}

async fn load_inputs(input_file: &Path, prompt_file: &Path) -> AppResult<(Vec<String>, String)> {
    let urls = load_urls(input_file).await?;
    if urls.is_empty() {
        return Err(ConfigError::MalformedInput {
            path: input_file.display().to_string(),
            reason: "没有可用的 URL".to_string(),
        }
        .into());
    }
    let prompt = load_prompt(prompt_file).await?;
    Ok((urls, prompt))
}

fn render_all(groups: &[RequestGroup], prompt: &str, config: &Config) -> Vec<BatchRequestLine> {
    let settings = RequestSettings::from(config);
    groups
        .iter()
        .map(|group| request_builder::render_request(group, prompt, &settings))
        .collect()
}

/// 删除同一前缀的旧分片、旧清单，以及上一轮留下的任务ID文件和原始结果
async fn remove_stale_artifacts(manifest_path: &Path, output_prefix: &str) -> AppResult<()> {
    let dir = match manifest_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let stem = Path::new(output_prefix)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let shard_prefix = format!("{}_", stem);

    let is_stale = |name: &str| {
        (name.starts_with(&shard_prefix) && name.ends_with(".jsonl"))
            || name.starts_with(RAW_RESULTS_PREFIX)
            || name == JOB_IDS_FILE
    };

    let mut removed = 0;
    if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_stale(&name) {
                let path = entry.path();
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| AppError::file_write_failed(&path, e))?;
                removed += 1;
            }
        }
    }

    if tokio::fs::try_exists(manifest_path).await.unwrap_or(false) {
        tokio::fs::remove_file(manifest_path)
            .await
            .map_err(|e| AppError::file_write_failed(manifest_path, e))?;
        removed += 1;
    }

    if removed > 0 {
        warn!("🧹 已清理 {} 个旧文件 (前缀: {})", removed, output_prefix);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            batch_dir: dir.path().join("batchfiles"),
            ..Config::default()
        }
    }

    async fn write_inputs(dir: &TempDir, count: usize) -> (PathBuf, PathBuf) {
        let urls: Vec<String> = (1..=count).map(|i| format!("https://img/u{}.png", i)).collect();
        let input = dir.path().join("urls.json");
        let prompt = dir.path().join("prompt.txt");
        tokio::fs::write(&input, serde_json::to_string(&urls).unwrap())
            .await
            .unwrap();
        tokio::fs::write(&prompt, "提取证书信息").await.unwrap();
        (input, prompt)
    }

    #[tokio::test]
    async fn test_create_single_writes_one_line_per_group() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (input, prompt) = write_inputs(&dir, 7).await;

        let output = config.batch_path("batch_input.jsonl");
        let path = create_single(&config, &input, &output, 3, &prompt)
            .await
            .unwrap();

        let lines: Vec<BatchRequestLine> = json_file::read_jsonl(&path).await.unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].custom_id, "request-0");
        assert_eq!(lines[2].urls(), vec!["https://img/u7.png".to_string()]);
    }

    #[tokio::test]
    async fn test_create_concurrent_cleans_old_shards() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (input, prompt) = write_inputs(&dir, 10).await;

        let stale = config.batch_path("batch_input_7.jsonl");
        json_file::write_text(&stale, "{}\n").await.unwrap();
        let old_ids = config.batch_path(JOB_IDS_FILE);
        json_file::write_text(&old_ids, "{}\n").await.unwrap();
        let old_raw = config.batch_path("batch_results_0.jsonl");
        json_file::write_text(&old_raw, "{}\n").await.unwrap();
        let unrelated = config.batch_path("notes.txt");
        json_file::write_text(&unrelated, "keep\n").await.unwrap();

        let (manifest_path, manifest) =
            create_concurrent(&config, &input, 5, 2, "batch_input", &prompt)
                .await
                .unwrap();

        assert!(!stale.exists());
        assert!(!old_ids.exists());
        assert!(!old_raw.exists());
        assert!(unrelated.exists());
        assert!(!manifest.run_id.is_empty());
        assert_eq!(manifest.jobs.len(), 2);
        assert_eq!(manifest.total_urls, 10);
        assert_eq!(Manifest::load(&manifest_path).await.unwrap(), manifest);
        assert!(manifest.jobs.values().all(|e| e.requests == 1 && e.urls == 5));
    }

    #[tokio::test]
    async fn test_missing_input_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let err = create_single(
            &config,
            &dir.path().join("missing.json"),
            Path::new("out.jsonl"),
            5,
            &dir.path().join("prompt.txt"),
        )
        .await
        .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_zero_jobs_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (input, prompt) = write_inputs(&dir, 3).await;
        let err = create_concurrent(&config, &input, 5, 0, "batch_input", &prompt)
            .await
            .unwrap_err();
        assert!(err.is_config());
    }
}
