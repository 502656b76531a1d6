use std::fmt;
use std::path::PathBuf;

use crate::models::ImageReference;

/// 单张图片的下载任务
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub image: ImageReference,
    pub destination: PathBuf,
    /// 在所属页面中的序号（从 1 开始）
    pub index: usize,
    pub total: usize,
    /// 图片所在的照片页链接，用于给没有 fbid 的图片命名
    pub source: Option<String>,
}

impl DownloadTask {
    pub fn new(image: ImageReference, destination: impl Into<PathBuf>, index: usize, total: usize) -> Self {
        Self {
            image,
            destination: destination.into(),
            index,
            total,
            source: None,
        }
    }

    pub fn with_source(mut self, link: impl Into<String>) -> Self {
        self.source = Some(link.into());
        self
    }
}

/// 下载结果：保存成功、因体积过小跳过、或失败，三者互斥
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(PathBuf),
    Skipped { declared_len: u64 },
    Failed(String),
}

impl DownloadOutcome {
    pub fn saved_path(&self) -> Option<&PathBuf> {
        match self {
            DownloadOutcome::Saved(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, DownloadOutcome::Saved(_))
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadOutcome::Saved(path) => write!(f, "已保存: {}", path.display()),
            DownloadOutcome::Skipped { declared_len } => {
                write!(f, "跳过小图片 (大小: {} 字节)", declared_len)
            }
            DownloadOutcome::Failed(reason) => write!(f, "下载失败: {}", reason),
        }
    }
}
