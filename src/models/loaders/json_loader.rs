use std::fmt::Write as _;
use std::path::Path;

use tokio::fs;

use crate::error::{AppError, AppResult, FileError};
use crate::models::DiscoveryMap;

/// 从 JSON 文件加载 帖子 → 图片地址 映射
pub async fn load_discovery_map(json_path: &Path) -> AppResult<DiscoveryMap> {
    if !json_path.exists() {
        return Err(AppError::File(FileError::NotFound {
            path: json_path.display().to_string(),
        }));
    }

    let content = fs::read_to_string(json_path)
        .await
        .map_err(|e| AppError::file_read_failed(json_path.display().to_string(), e))?;

    serde_json::from_str(&content).map_err(|e| {
        AppError::File(FileError::JsonParseFailed {
            path: json_path.display().to_string(),
            source: Box::new(e),
        })
    })
}

/// 保存为带缩进的 JSON
pub async fn save_discovery_map(json_path: &Path, map: &DiscoveryMap) -> AppResult<()> {
    let content = serde_json::to_string_pretty(map)?;
    fs::write(json_path, content)
        .await
        .map_err(|e| AppError::file_write_failed(json_path.display().to_string(), e))?;

    tracing::info!(
        "已保存 {} 个帖子的 {} 个图片地址到 {}",
        map.len(),
        map.values().map(Vec::len).sum::<usize>(),
        json_path.display()
    );
    Ok(())
}

/// 纯文本格式：每个帖子一段，`# Post: <url>` 开头，每行一个地址，空行分隔
pub fn render_text_report(map: &DiscoveryMap) -> String {
    let mut out = String::new();
    for (post, images) in map {
        let _ = writeln!(out, "# Post: {}", post);
        for image in images {
            let _ = writeln!(out, "{}", image);
        }
        out.push('\n');
    }
    out
}

pub async fn save_text_report(text_path: &Path, map: &DiscoveryMap) -> AppResult<()> {
    fs::write(text_path, render_text_report(map))
        .await
        .map_err(|e| AppError::file_write_failed(text_path.display().to_string(), e))?;
    tracing::info!("已保存文本格式到 {}", text_path.display());
    Ok(())
}
