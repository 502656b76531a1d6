use std::path::Path;

use tokio::fs;

use crate::error::{AppError, AppResult, FileError};
use crate::models::PostReference;

/// 从文本文件加载帖子列表：每行一个 URL，只保留以 `http` 开头的行
pub async fn load_post_list(list_path: &Path) -> AppResult<Vec<PostReference>> {
    if !list_path.exists() {
        return Err(AppError::File(FileError::NotFound {
            path: list_path.display().to_string(),
        }));
    }

    let content = fs::read_to_string(list_path)
        .await
        .map_err(|e| AppError::file_read_failed(list_path.display().to_string(), e))?;

    let posts = parse_post_list(&content);
    tracing::info!("从 {} 加载了 {} 个帖子地址", list_path.display(), posts.len());
    Ok(posts)
}

pub fn parse_post_list(content: &str) -> Vec<PostReference> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.starts_with("http"))
        .map(PostReference::new)
        .collect()
}
