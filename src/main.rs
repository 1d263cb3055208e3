use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use openai_batch_runner::cli::Cli;
use openai_batch_runner::{logger, App, Config, Outcome};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::from_env(cli.env_file.as_deref())?;

    // 初始化日志
    let log_file = logger::init(cli.command.stage(), &config)?;
    info!("日志文件: {}", log_file.display());

    match App::new(config).run(cli.command).await? {
        Outcome::Done => Ok(()),
        Outcome::AllFailed(reason) => bail!(reason),
    }
}
