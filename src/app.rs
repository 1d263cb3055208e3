//! 应用入口 - 把命令行子命令分派到各阶段

use std::sync::Arc;

use tracing::{error, info};

use crate::cli::Command;
use crate::clients::{BatchApi, OpenAiBatchClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::orchestrator;

/// 一次运行的结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 至少部分成功
    Done,
    /// 所有任务均失败
    AllFailed(String),
}

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 远程调用阶段使用的客户端；缺少 API 密钥时在任何请求之前失败
    fn api(&self) -> AppResult<Arc<dyn BatchApi>> {
        Ok(Arc::new(OpenAiBatchClient::new(&self.config)?))
    }

    /// 运行一个阶段
    pub async fn run(&self, command: Command) -> AppResult<Outcome> {
        let config = &self.config;
        match command {
            Command::Create {
                input_file,
                output_file,
                batch_size,
                prompt_file,
            } => {
                orchestrator::create_single(
                    config,
                    &input_file,
                    &config.batch_path(output_file),
                    batch_size,
                    &prompt_file,
                )
                .await?;
                Ok(Outcome::Done)
            }
            Command::CreateConcurrent {
                input_file,
                batch_size,
                jobs,
                output_prefix,
                prompt_file,
            } => {
                orchestrator::create_concurrent(
                    config,
                    &input_file,
                    batch_size,
                    jobs,
                    &output_prefix,
                    &prompt_file,
                )
                .await?;
                Ok(Outcome::Done)
            }
            Command::Submit {
                input_file,
                job_id_file,
            } => {
                let api = self.api()?;
                let job_id = orchestrator::submit_single(
                    api,
                    &config.batch_path(input_file),
                    &config.batch_path(job_id_file),
                )
                .await?;
                info!("🆔 任务ID: {}", job_id);
                Ok(Outcome::Done)
            }
            Command::SubmitConcurrent {
                manifest,
                max_workers,
                job_ids_file,
            } => {
                let api = self.api()?;
                let summary = orchestrator::submit_concurrent(
                    api,
                    &config.batch_path(manifest),
                    max_workers,
                    &config.batch_path(job_ids_file),
                )
                .await?;
                if summary.all_failed() {
                    return Ok(Outcome::AllFailed(format!(
                        "{} 个分片全部提交失败",
                        summary.failed
                    )));
                }
                Ok(Outcome::Done)
            }
            Command::Check {
                job_id,
                job_id_file,
                output_file,
                parsed_output_file,
                urls_file,
                batch_size,
                poll,
            } => {
                let api = self.api()?;
                let summary = orchestrator::check_single(
                    api,
                    job_id,
                    &config.batch_path(job_id_file),
                    &config.batch_path(output_file),
                    &config.batch_path(parsed_output_file),
                    &urls_file,
                    batch_size,
                    &poll.settings(false),
                )
                .await?;
                Ok(outcome_of(&summary))
            }
            Command::CheckConcurrent {
                job_ids_file,
                manifest,
                output_file,
                max_workers,
                poll,
                fail_fast,
            } => {
                let api = self.api()?;
                let summary = orchestrator::check_concurrent(
                    config,
                    api,
                    &config.batch_path(job_ids_file),
                    &config.batch_path(manifest),
                    &config.batch_path(output_file),
                    &poll.settings(fail_fast),
                    max_workers,
                )
                .await?;
                Ok(outcome_of(&summary))
            }
            Command::Queue { limit } => {
                let api = self.api()?;
                orchestrator::show_queue(api, limit).await?;
                Ok(Outcome::Done)
            }
        }
    }
}

fn outcome_of(summary: &orchestrator::CheckSummary) -> Outcome {
    if summary.all_failed() {
        for (job_index, message) in &summary.failures {
            error!("[任务 {}] {}", job_index, message);
        }
        Outcome::AllFailed(format!(
            "{} 个任务全部失败",
            summary.failed + summary.submit_failed
        ))
    } else {
        Outcome::Done
    }
}
