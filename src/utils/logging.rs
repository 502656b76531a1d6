//! 日志工具模块
//!
//! 终端日志走 tracing，另外维护一个纯文本运行日志（开头写时间戳，结束追加统计）。

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// 初始化 tracing，`RUST_LOG` 优先，否则按 verbose 选择 debug / info
///
/// 重复调用时静默忽略
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// 初始化运行日志文件（覆盖旧文件）
pub async fn init_log_file(log_file_path: &str, title: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n{} - {}\n{}\n\n",
        "=".repeat(60),
        title,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    tokio::fs::write(log_file_path, log_header)
        .await
        .map_err(|e| AppError::file_write_failed(log_file_path, e))
}

/// 在运行日志末尾追加统计
pub async fn append_log_summary(log_file_path: &str, lines: &[String]) -> AppResult<()> {
    let mut block = format!("{}\n", "-".repeat(60));
    for line in lines {
        block.push_str(line);
        block.push('\n');
    }
    block.push_str(&format!(
        "完成时间: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(log_file_path))
        .await
        .map_err(|e| AppError::file_write_failed(log_file_path, e))?;
    file.write_all(block.as_bytes())
        .await
        .map_err(|e| AppError::file_write_failed(log_file_path, e))
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 模式: {:?}", config.mode);
    info!("📊 会话数: {}", config.effective_workers());
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
pub fn log_batch_start(what: &str, total: usize, workers: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理 {} 个{}", total, what);
    info!("📋 使用 {} 个会话并行处理", workers);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(success: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 批次完成: 成功 {}/{}", success, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(lines: &[String], log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for line in lines {
        info!("{}", line);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}
