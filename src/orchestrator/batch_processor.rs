//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责两种批次的资源管理和结果汇总。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写运行日志头、打印启动信息
//! 2. **发现批次**：读帖子列表 → 浏览器会话池 → 逐帖发现 → 写 JSON（和文本报告）
//! 3. **下载批次**：读 JSON → 筛出照片集链接 → HTTP 会话池 → 下载到输出目录
//! 4. **全局统计**：汇总结果并追加到运行日志
//!
//! 单个条目的错误在这里被折算成空结果；只有配置 / 输入错误和
//! 一个会话都建不起来时才向上返回错误。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::browser::LaunchOptions;
use crate::config::{Config, RunMode};
use crate::error::AppResult;
use crate::infrastructure::{BrowserSession, BrowserSessionFactory, HttpSession, HttpSessionFactory};
use crate::models::{
    load_discovery_map, load_post_list, save_discovery_map, save_text_report, DiscoveryMap, DiscoveryResult,
    DownloadOutcome, ImageReference, PostReference,
};
use crate::orchestrator::batch_runner::{run_batch, BatchEntry};
use crate::orchestrator::photo_processor::DownloadWorker;
use crate::orchestrator::post_processor::DiscoveryWorker;
use crate::orchestrator::progress::ProgressCounter;
use crate::orchestrator::session_pool::SessionPool;
use crate::utils::logging;
use crate::workflow::{ensure_output_dir, is_photo_link, DiscoverySettings};

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let title = match config.mode {
            RunMode::Discover => "图片发现日志",
            RunMode::Download => "图片下载日志",
        };
        logging::init_log_file(&config.output_log_file, title).await?;
        logging::log_startup(&config);

        Ok(Self { config })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<()> {
        let summary = match self.config.mode {
            RunMode::Discover => self.discover().await?,
            RunMode::Download => self.download().await?,
        };

        logging::print_final_stats(&summary, &self.config.output_log_file);
        logging::append_log_summary(&self.config.output_log_file, &summary).await?;
        Ok(())
    }

    /// 发现批次，返回统计行
    async fn discover(&self) -> AppResult<Vec<String>> {
        info!("\n📁 正在读取帖子列表: {}", self.config.post_list_file);
        let posts = load_post_list(Path::new(&self.config.post_list_file)).await?;
        if posts.is_empty() {
            warn!("⚠️ 没有找到有效的帖子地址，程序结束");
            return Ok(vec!["处理帖子: 0".to_string()]);
        }

        let factory = BrowserSessionFactory::new(
            LaunchOptions {
                headless: self.config.headless,
                chrome_executable: self.config.chrome_executable.clone(),
            },
            self.config.browser_debug_port,
        );
        let credentials = self.config.credentials();
        let mut pool = SessionPool::build(&factory, self.config.worker_count, credentials.as_ref()).await?;

        let total = posts.len();
        logging::log_batch_start("帖子", total, pool.size());

        let started = Instant::now();
        let progress = ProgressCounter::with_bar(total, "帖子");
        let worker = Arc::new(DiscoveryWorker::<BrowserSession>::new(DiscoverySettings::default()));
        let entries = run_batch(&mut pool, posts.clone(), worker, &progress).await;
        progress.finish("发现完成");
        pool.shutdown().await;
        let elapsed = started.elapsed();

        logging::log_batch_complete(entries.iter().filter(|e| e.result.is_ok()).count(), total);

        let map = collect_discovery(&posts, entries);
        let total_images: usize = map.values().map(Vec::len).sum();

        let output = PathBuf::from(&self.config.discovery_output);
        save_discovery_map(&output, &map).await?;
        if self.config.write_text_report {
            save_text_report(&output.with_extension("txt"), &map).await?;
        }

        Ok(vec![
            format!("处理帖子: {}", total),
            format!("找到图片: {}", total_images),
            format!("总耗时: {:.2} 秒", elapsed.as_secs_f64()),
            format!("结果文件: {}", output.display()),
        ])
    }

    /// 下载批次，返回统计行
    async fn download(&self) -> AppResult<Vec<String>> {
        info!("\n📁 正在读取 JSON 文件: {}", self.config.download_input);
        let map = load_discovery_map(Path::new(&self.config.download_input)).await?;
        let links = collect_photo_links(&map);

        let output_dir = ensure_output_dir(Path::new(&self.config.output_dir)).await?;
        info!("📂 输出目录: {}", output_dir.display());

        if links.is_empty() {
            warn!("⚠️ 没有可下载的照片集链接");
            return Ok(vec![
                format!("处理帖子: {}，照片链接: 0", map.len()),
                "❌ 没有下载任何图片".to_string(),
            ]);
        }

        let factory = HttpSessionFactory::new(self.config.request_timeout());
        let credentials = self.config.credentials();
        let mut pool = SessionPool::build(&factory, self.config.worker_count, credentials.as_ref()).await?;

        let total = links.len();
        logging::log_batch_start("照片链接", total, pool.size());

        let progress = ProgressCounter::with_bar(total, "链接");
        let worker = Arc::new(DownloadWorker::<HttpSession>::new(output_dir.clone()));
        let entries = run_batch(&mut pool, links, worker, &progress).await;
        progress.finish("下载完成");
        pool.shutdown().await;

        logging::log_batch_complete(entries.iter().filter(|e| e.result.is_ok()).count(), total);

        let saved = collect_saved_files(entries);
        let mut summary = vec![
            format!("处理帖子: {}，照片链接: {}", map.len(), total),
            format!("成功下载 {} 张图片到 {}", saved.len(), output_dir.display()),
        ];
        if saved.is_empty() {
            summary.push("❌ 没有下载任何图片".to_string());
        } else {
            summary.push("已下载文件:".to_string());
            summary.extend(saved.iter().map(|path| format!("- {}", path.display())));
        }
        Ok(summary)
    }
}

/// 汇总发现结果，处理失败的帖子记为空列表
///
/// 每个输入帖子在结果里都有一项；没有返回结果的帖子（例如通道中途退出）同样记为空列表。
pub fn collect_discovery(
    posts: &[PostReference],
    entries: Vec<BatchEntry<PostReference, DiscoveryResult>>,
) -> DiscoveryMap {
    let mut map = DiscoveryMap::new();
    for entry in entries {
        let images = match entry.result {
            Ok(images) => images,
            Err(e) => {
                warn!("[帖子 {}] ❌ 处理失败，记为空结果: {}", entry.index + 1, e);
                Vec::new()
            }
        };
        if images.is_empty() {
            info!("[帖子 {}] 没有找到图片", entry.index + 1);
        }
        map.insert(entry.item, images);
    }

    for (index, post) in posts.iter().enumerate() {
        if !map.contains_key(post) {
            warn!("[帖子 {}] ⚠️ 没有收到处理结果，记为空结果: {}", index + 1, post);
            map.insert(post.clone(), Vec::new());
        }
    }
    map
}

/// 按帖子顺序筛出需要下载的照片集链接
pub fn collect_photo_links(map: &DiscoveryMap) -> Vec<ImageReference> {
    map.values()
        .flatten()
        .filter(|link| is_photo_link(link.as_str()))
        .cloned()
        .collect()
}

/// 所有保存成功的文件
pub fn collect_saved_files(entries: Vec<BatchEntry<ImageReference, Vec<DownloadOutcome>>>) -> Vec<PathBuf> {
    entries
        .into_iter()
        .filter_map(|entry| match entry.result {
            Ok(outcomes) => Some(outcomes),
            Err(e) => {
                warn!("处理照片链接 {} 出错: {}", entry.item, e);
                None
            }
        })
        .flatten()
        .filter_map(|outcome| outcome.saved_path().cloned())
        .collect()
}
