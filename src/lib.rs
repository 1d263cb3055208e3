//! # OpenAI Batch Runner
//!
//! 基于 OpenAI Batch API 的批处理编排工具
//!
//! ## 架构设计
//!
//! 各阶段只通过文件通信（清单、任务ID文件、结果文件），每个阶段是一个独立的子命令。
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - `BatchApi` 能力边界和 reqwest 实现
//!
//! ### ② 业务能力层（Services）
//! - `request_builder` - URL 分组、分片、渲染请求行
//! - `request_index` - custom_id → URL 组
//! - `result_parser` - 解析输出行并拼回 URL
//!
//! ### ③ 流程层（Workflow）
//! - `JobFlow` - 单个任务的提交、查询、取回
//! - `PollTracker` - 纯状态机，决定继续轮询还是停止
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - create / submit / check / queue 各阶段，管理并发和协调文件
//!
//! ## 模块结构

pub mod app;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::{App, Outcome};
pub use clients::{BatchApi, OpenAiBatchClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{BatchSnapshot, JobIds, Manifest, ResultRecord};
pub use orchestrator::{CheckSummary, SubmitSummary};
pub use workflow::{FailurePolicy, PollSettings, PollTracker};
