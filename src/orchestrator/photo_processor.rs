//! 单个照片链接处理器 - 编排层

use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::infrastructure::FetchSession;
use crate::models::{DownloadOutcome, ImageReference};
use crate::orchestrator::batch_runner::BatchWorker;
use crate::workflow::process_photo_link;

/// 照片链接下载任务，所有图片写入同一个输出目录
pub struct DownloadWorker<S> {
    destination: PathBuf,
    _session: PhantomData<fn() -> S>,
}

impl<S> DownloadWorker<S> {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            _session: PhantomData,
        }
    }
}

#[async_trait]
impl<S: FetchSession> BatchWorker for DownloadWorker<S> {
    type Session = S;
    type Item = ImageReference;
    type Output = Vec<DownloadOutcome>;

    async fn process(&self, session: &mut S, _index: usize, link: &ImageReference) -> AppResult<Vec<DownloadOutcome>> {
        Ok(process_photo_link(link.as_str(), &self.destination, session).await)
    }

    fn describe(&self, link: &ImageReference, result: &AppResult<Vec<DownloadOutcome>>) -> String {
        match result {
            Ok(outcomes) => {
                let saved = outcomes.iter().filter(|o| o.is_saved()).count();
                format!("✓ {} 下载 {}/{} 张", link, saved, outcomes.len())
            }
            Err(e) => format!("❌ {} 处理失败: {}", link, e),
        }
    }
}
