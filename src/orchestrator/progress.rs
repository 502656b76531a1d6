//! 批次进度计数
//!
//! 计数只在互斥锁内修改；进度条只是读取方之一。

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct ProgressState {
    completed: usize,
    failed: usize,
}

/// 单个批次的进度句柄，克隆后共享同一份计数
#[derive(Clone)]
pub struct ProgressCounter {
    total: usize,
    state: Arc<Mutex<ProgressState>>,
    bar: ProgressBar,
}

impl ProgressCounter {
    /// 带终端进度条
    pub fn with_bar(total: usize, unit: &str) -> Self {
        let bar = ProgressBar::new(total as u64);
        let template = format!("{{spinner:.green}} [{{elapsed_precise}}] [{{wide_bar:.cyan/blue}}] {{pos}}/{{len}} {}", unit);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self::from_bar(total, bar)
    }

    /// 不输出任何东西（测试用，或非终端环境）
    pub fn hidden(total: usize) -> Self {
        Self::from_bar(total, ProgressBar::hidden())
    }

    fn from_bar(total: usize, bar: ProgressBar) -> Self {
        Self {
            total,
            state: Arc::new(Mutex::new(ProgressState::default())),
            bar,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// 记录一个完成的任务，返回当前完成数
    pub async fn advance(&self, succeeded: bool, message: &str) -> usize {
        let mut state = self.state.lock().await;
        state.completed += 1;
        if !succeeded {
            state.failed += 1;
        }
        self.bar.inc(1);
        if !message.is_empty() {
            self.bar.println(format!("[{}/{}] {}", state.completed, self.total, message));
        }
        state.completed
    }

    pub async fn completed(&self) -> usize {
        self.state.lock().await.completed
    }

    pub async fn failed(&self) -> usize {
        self.state.lock().await.failed
    }

    pub fn finish(&self, message: &'static str) {
        self.bar.finish_with_message(message);
    }
}
