//! 单个帖子处理器 - 编排层
//!
//! 把 [`DiscoveryFlow`] 包装成批量调度器可以执行的 [`BatchWorker`]。

use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::info;

use crate::error::AppResult;
use crate::infrastructure::PageSession;
use crate::models::{DiscoveryResult, PostReference};
use crate::orchestrator::batch_runner::BatchWorker;
use crate::workflow::{DiscoveryFlow, DiscoverySettings};

/// 帖子发现任务
pub struct DiscoveryWorker<S> {
    flow: DiscoveryFlow,
    _session: PhantomData<fn() -> S>,
}

impl<S> DiscoveryWorker<S> {
    pub fn new(settings: DiscoverySettings) -> Self {
        Self {
            flow: DiscoveryFlow::new(settings),
            _session: PhantomData,
        }
    }
}

#[async_trait]
impl<S: PageSession> BatchWorker for DiscoveryWorker<S> {
    type Session = S;
    type Item = PostReference;
    type Output = DiscoveryResult;

    async fn process(&self, session: &mut S, index: usize, post: &PostReference) -> AppResult<DiscoveryResult> {
        info!("[帖子 {}] 开始处理 ({}): {}", index + 1, session.label(), post);
        let report = self.flow.run(session, post).await;
        info!(
            "[帖子 {}] 结果来源 {:?}，共 {} 张图片",
            index + 1,
            report.source,
            report.images.len()
        );
        Ok(report.images)
    }

    fn describe(&self, post: &PostReference, result: &AppResult<DiscoveryResult>) -> String {
        match result {
            Ok(images) => format!("✓ {} 找到 {} 张图片", post, images.len()),
            Err(e) => format!("❌ {} 处理失败: {}", post, e),
        }
    }
}
