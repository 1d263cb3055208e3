/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::path::Path;

use tracing::info;

/// 日志文件头
///
/// # 参数
/// - `stage`: 阶段名称
///
/// # 返回
/// 带时间戳的横幅文本
pub fn log_header(stage: &str) -> String {
    format!(
        "{}\n批处理日志 [{}] - {}\n{}\n\n",
        "=".repeat(60),
        stage,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    )
}

/// 记录阶段启动信息
///
/// # 参数
/// - `stage`: 阶段名称
/// - `detail`: 附加说明
pub fn log_startup(stage: &str, detail: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 {} 启动", stage);
    if !detail.is_empty() {
        info!("📊 {}", detail);
    }
    info!("{}", "=".repeat(60));
}

/// 记录输入加载信息
pub fn log_inputs_loaded(urls: usize, batch_size: usize, jobs: usize) {
    info!("✓ 找到 {} 个 URL", urls);
    info!("📋 每个请求 {} 个 URL，分为 {} 个任务", batch_size, jobs);
}

/// 记录轮询开始信息
///
/// # 参数
/// - `round`: 轮次
/// - `pending`: 未完成任务数
/// - `total`: 任务总数
pub fn log_round_start(round: usize, pending: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("🔄 第 {} 轮检查: {}/{} 个任务未完成", round, pending, total);
    info!("{}", "─".repeat(60));
}

/// 最终统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FinalStats {
    pub success: usize,
    pub failed: usize,
    pub pending: usize,
    pub total: usize,
}

/// 打印最终统计信息
///
/// # 参数
/// - `title`: 统计标题
/// - `stats`: 统计数据
/// - `output`: 输出文件路径
pub fn print_final_stats(title: &str, stats: FinalStats, output: Option<&Path>) {
    info!("\n{}", "=".repeat(60));
    info!("📊 {}", title);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.success, stats.total);
    info!("❌ 失败: {}", stats.failed);
    if stats.pending > 0 {
        info!("⏳ 未完成: {}", stats.pending);
    }
    info!("{}", "=".repeat(60));
    if let Some(path) = output {
        info!("\n结果已保存至: {}", path.display());
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("一二三四五", 3), "一二三...");
    }

    #[test]
    fn test_log_header_contains_stage() {
        let header = log_header("check");
        assert!(header.starts_with(&"=".repeat(60)));
        assert!(header.contains("[check]"));
    }
}
