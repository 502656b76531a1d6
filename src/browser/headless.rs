use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult, BrowserError};

/// 启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_executable: Option<String>,
}

/// 启动浏览器并打开空白页
///
/// 每个槽位使用独立的用户数据目录，多个浏览器可以同时运行。
/// 返回浏览器、事件处理任务和页面；事件处理任务需要在会话关闭时终止
pub async fn launch_browser(options: &LaunchOptions, slot: usize) -> AppResult<(Browser, JoinHandle<()>, Page)> {
    info!("🚀 启动浏览器 #{} (headless: {})...", slot, options.headless);

    let profile_dir = std::env::temp_dir().join(format!("post-image-harvester-{}-{}", std::process::id(), slot));
    let mut builder = BrowserConfig::builder().user_data_dir(profile_dir);
    if options.headless {
        builder = builder.new_headless_mode();
    } else {
        builder = builder.with_head();
    }
    if let Some(executable) = &options.chrome_executable {
        builder = builder.chrome_executable(Path::new(executable));
    }

    let config = builder
        .args(vec![
            "--disable-notifications",
            "--disable-infobars",
            "--disable-extensions",
            "--disable-gpu",
            "--disable-dev-shm-usage", // 防止共享内存不足
            "--no-sandbox",
            "--disable-features=TranslateUI",
            "--disable-translate",
            "--dns-prefetch-disable",
        ])
        .build()
        .map_err(|message| {
            error!("配置浏览器失败: {}", message);
            AppError::Browser(BrowserError::ConfigurationFailed { message })
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        AppError::Browser(BrowserError::LaunchFailed {
            source: Box::new(e),
        })
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        AppError::Browser(BrowserError::PageCreationFailed {
            source: Box::new(e),
        })
    })?;

    Ok((browser, handler_task, page))
}
