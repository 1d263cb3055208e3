//! 命令行参数

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::workflow::{FailurePolicy, PollSettings};

#[derive(Debug, Parser)]
#[command(name = "openai_batch_runner", version, about = "OpenAI Batch API 批处理工具")]
pub struct Cli {
    /// 指定 dotenv 文件（默认读取当前目录的 .env）
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 生成单个批处理输入文件
    Create {
        #[arg(long, default_value = "input/urls.json")]
        input_file: PathBuf,
        #[arg(long, default_value = "batch_input.jsonl")]
        output_file: PathBuf,
        #[arg(long, default_value_t = 5)]
        batch_size: usize,
        #[arg(long, default_value = "prompt.txt")]
        prompt_file: PathBuf,
    },
    /// 生成多个分片输入文件和清单
    CreateConcurrent {
        #[arg(long, default_value = "input/urls.json")]
        input_file: PathBuf,
        #[arg(long, default_value_t = 5)]
        batch_size: usize,
        #[arg(long, default_value_t = 5)]
        jobs: usize,
        #[arg(long, default_value = "batch_input")]
        output_prefix: String,
        #[arg(long, default_value = "prompt.txt")]
        prompt_file: PathBuf,
    },
    /// 提交单个输入文件
    Submit {
        #[arg(long, default_value = "batch_input.jsonl")]
        input_file: PathBuf,
        #[arg(long, default_value = "batch_job_id.txt")]
        job_id_file: PathBuf,
    },
    /// 按清单并发提交
    SubmitConcurrent {
        #[arg(long, default_value = "batch_input_manifest.json")]
        manifest: PathBuf,
        #[arg(long, default_value_t = 5)]
        max_workers: usize,
        #[arg(long, default_value = "batch_job_ids.json")]
        job_ids_file: PathBuf,
    },
    /// 检查单个任务并解析结果
    Check {
        /// 任务ID（优先于 --job-id-file）
        #[arg(long)]
        job_id: Option<String>,
        #[arg(long, default_value = "batch_job_id.txt")]
        job_id_file: PathBuf,
        #[arg(long, default_value = "batch_results.jsonl")]
        output_file: PathBuf,
        #[arg(long, default_value = "batch_results_parsed.json")]
        parsed_output_file: PathBuf,
        #[arg(long, default_value = "input/urls.json")]
        urls_file: PathBuf,
        #[arg(long, default_value_t = 5)]
        batch_size: usize,
        #[command(flatten)]
        poll: PollArgs,
    },
    /// 并发检查所有任务并合并结果
    CheckConcurrent {
        #[arg(long, default_value = "batch_job_ids.json")]
        job_ids_file: PathBuf,
        #[arg(long, default_value = "batch_input_manifest.json")]
        manifest: PathBuf,
        #[arg(long, default_value = "batch_results_concurrent.json")]
        output_file: PathBuf,
        #[arg(long, default_value_t = 5)]
        max_workers: usize,
        #[command(flatten)]
        poll: PollArgs,
        /// 任一任务失败即停止轮询
        #[arg(long)]
        fail_fast: bool,
    },
    /// 查看最近的批处理任务
    Queue {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Debug, Clone, Args)]
pub struct PollArgs {
    /// 轮询间隔（秒）
    #[arg(long, default_value_t = 60)]
    pub poll_interval: u64,
    /// 最长等待时间（秒）
    #[arg(long)]
    pub max_wait_time: Option<u64>,
    /// 只检查一轮
    #[arg(long)]
    pub no_wait: bool,
}

impl PollArgs {
    pub fn settings(&self, fail_fast: bool) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval),
            max_wait: self.max_wait_time.map(Duration::from_secs),
            no_wait: self.no_wait,
            policy: if fail_fast {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::WaitForAll
            },
        }
    }
}

impl Command {
    /// 阶段名称，用于日志文件名
    pub fn stage(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::CreateConcurrent { .. } => "create_concurrent",
            Command::Submit { .. } => "submit",
            Command::SubmitConcurrent { .. } => "submit_concurrent",
            Command::Check { .. } => "check",
            Command::CheckConcurrent { .. } => "check_concurrent",
            Command::Queue { .. } => "queue",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_concurrent_defaults() {
        let cli = Cli::parse_from(["openai_batch_runner", "check-concurrent", "--no-wait"]);
        match cli.command {
            Command::CheckConcurrent {
                job_ids_file,
                max_workers,
                poll,
                fail_fast,
                ..
            } => {
                assert_eq!(job_ids_file, PathBuf::from("batch_job_ids.json"));
                assert_eq!(max_workers, 5);
                let settings = poll.settings(fail_fast);
                assert!(settings.no_wait);
                assert_eq!(settings.interval, Duration::from_secs(60));
                assert_eq!(settings.policy, FailurePolicy::WaitForAll);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_env_file_after_subcommand() {
        let cli = Cli::parse_from([
            "openai_batch_runner",
            "create-concurrent",
            "--jobs",
            "2",
            "--env-file",
            "custom.env",
        ]);
        assert_eq!(cli.env_file, Some(PathBuf::from("custom.env")));
        assert_eq!(cli.command.stage(), "create_concurrent");
    }
}
