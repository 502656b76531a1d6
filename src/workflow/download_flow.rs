//! 图片下载流程 - 流程层
//!
//! 核心职责：
//! - `fetch`：下载单张图片（流式写盘，过小的跳过）
//! - `process_photo_link`：打开一个照片页，提取其中的图片并逐张下载

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use futures::StreamExt;
use regex::Regex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, NetworkError};
use crate::infrastructure::{FetchSession, FetchedResponse};
use crate::models::{DownloadOutcome, DownloadTask, ImageReference};
use crate::services::page_extractor::extract_image_urls;

/// 声明长度低于此值的图片视为图标之类，不保存
pub const SIZE_THRESHOLD: u64 = 10_000;

fn fbid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"fbid=(\d+)").expect("静态正则"))
}

/// 生成保存文件名
///
/// 依次取图片地址的 fbid、照片页链接的 fbid，都没有时才用时间戳。
pub fn file_name_for(image: &str, source: Option<&str>, index: usize) -> String {
    let fbid = fbid_pattern()
        .captures(image)
        .or_else(|| source.and_then(|link| fbid_pattern().captures(link)))
        .and_then(|c| c.get(1));
    match fbid {
        Some(fbid) => format!("fb_{}_{}.jpg", fbid.as_str(), index),
        None => format!("facebook_image_{}_{}.jpg", chrono::Utc::now().timestamp(), index),
    }
}

/// 同名文件已存在时最多尝试的编号
const MAX_NAME_ATTEMPTS: usize = 100;

/// `fb_1_2.jpg` → `fb_1_2-3.jpg`
fn numbered(file_name: &str, n: usize) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, n, ext),
        None => format!("{}-{}", file_name, n),
    }
}

/// 新建文件，不覆盖已有文件；重名时依次加 `-2`、`-3` 后缀
async fn create_unique(dir: &Path, file_name: &str) -> AppResult<(PathBuf, fs::File)> {
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let name = if attempt == 1 {
            file_name.to_string()
        } else {
            numbered(file_name, attempt)
        };
        let path = dir.join(&name);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("文件已存在，换个名字: {}", path.display());
            }
            Err(e) => return Err(AppError::file_write_failed(path.display().to_string(), e)),
        }
    }
    Err(AppError::file_write_failed(
        dir.join(file_name).display().to_string(),
        std::io::Error::new(std::io::ErrorKind::AlreadyExists, "同名文件过多"),
    ))
}

/// 只有照片集链接（含 pcb，且不是下载链接）才进入下载流程
pub fn is_photo_link(link: &str) -> bool {
    link.contains("pcb") && !link.contains("download")
}

/// 下载单张图片
///
/// 任何错误都折算成 [`DownloadOutcome::Failed`]，不会向上传播。
pub async fn fetch<S: FetchSession + ?Sized>(task: &DownloadTask, session: &mut S) -> DownloadOutcome {
    let file_name = file_name_for(task.image.as_str(), task.source.as_deref(), task.index);
    info!("下载图片 {}/{}: {}", task.index, task.total, file_name);

    let response = match session.fetch_bytes(task.image.as_str()).await {
        Ok(response) => response,
        Err(e) => {
            warn!("下载图片出错: {}", e);
            return DownloadOutcome::Failed(e.to_string());
        }
    };

    if !response.is_success() {
        let e = AppError::bad_status(task.image.as_str(), response.status);
        warn!("下载图片出错: {}", e);
        return DownloadOutcome::Failed(e.to_string());
    }

    // 没有 Content-Length 按 0 处理
    let declared_len = response.content_length.unwrap_or(0);
    if declared_len < SIZE_THRESHOLD {
        info!("跳过小图片 (大小: {} 字节)", declared_len);
        return DownloadOutcome::Skipped { declared_len };
    }

    let (path, file) = match create_unique(&task.destination, &file_name).await {
        Ok(created) => created,
        Err(e) => {
            warn!("下载图片出错: {}", e);
            return DownloadOutcome::Failed(e.to_string());
        }
    };
    match write_body(&path, file, response).await {
        Ok(written) => {
            info!("✓ 下载成功: {} ({} 字节)", path.display(), written);
            DownloadOutcome::Saved(path)
        }
        Err(e) => {
            if fs::remove_file(&path).await.is_ok() {
                debug!("已删除不完整的文件: {}", path.display());
            }
            warn!("下载图片出错: {}", e);
            DownloadOutcome::Failed(e.to_string())
        }
    }
}

/// 把响应体流式写入文件，返回写入的字节数
async fn write_body(path: &Path, mut file: fs::File, response: FetchedResponse) -> AppResult<u64> {
    let display = path.display().to_string();

    let mut body = response.body;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::file_write_failed(&display, e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| AppError::file_write_failed(&display, e))?;

    Ok(written)
}

/// 打开照片页并提取图片地址
///
/// 被重定向到登录页时返回 [`NetworkError::LoginRedirect`]。
pub async fn collect_page_images<S: FetchSession + ?Sized>(link: &str, session: &mut S) -> AppResult<Vec<String>> {
    info!("获取照片页: {}", link);
    let page = session.fetch_page(link).await?;

    if !(200..300).contains(&page.status) {
        return Err(AppError::bad_status(link, page.status));
    }
    if page.final_url.contains("/login/") {
        return Err(AppError::Network(NetworkError::LoginRedirect { url: page.final_url }));
    }

    let extraction = extract_image_urls(&page.text);
    info!("通过 {:?} 找到 {} 个图片地址", extraction.tier, extraction.urls.len());
    Ok(extraction.urls)
}

/// 处理一个照片链接：提取图片并逐张下载，返回每张图片的结果
pub async fn process_photo_link<S: FetchSession + ?Sized>(
    link: &str,
    destination: &Path,
    session: &mut S,
) -> Vec<DownloadOutcome> {
    if !is_photo_link(link) {
        info!("跳过非照片链接: {}", link);
        return Vec::new();
    }

    let image_urls = match collect_page_images(link, session).await {
        Ok(urls) => urls,
        Err(AppError::Network(NetworkError::LoginRedirect { .. })) => {
            warn!("⚠️ 被重定向到登录页，需要认证");
            return Vec::new();
        }
        Err(e) => {
            warn!("处理链接 {} 出错: {}", link, e);
            return Vec::new();
        }
    };

    let total = image_urls.len();
    let mut outcomes = Vec::with_capacity(total);
    for (j, url) in image_urls.into_iter().enumerate() {
        let task = DownloadTask::new(ImageReference::from(url), destination, j + 1, total).with_source(link);
        outcomes.push(fetch(&task, session).await);
    }
    outcomes
}

/// 确保输出目录存在
pub async fn ensure_output_dir(dir: &Path) -> AppResult<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;
    Ok(dir.to_path_buf())
}
