//! 页面登录流程

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::JsExecutor;

pub const SITE_ROOT: &str = "https://www.facebook.com/";
pub const COOKIE_DOMAIN: &str = ".facebook.com";

const COOKIE_BANNER_TIMEOUT: Duration = Duration::from_secs(5);
const LOGIN_FORM_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 账号密码登录
///
/// 找不到登录表单视为失败；登录后等不到导航栏只记警告，继续往下走
pub async fn login_with_password(executor: &JsExecutor, identity: &str, secret: &str) -> AppResult<()> {
    info!("正在登录...");
    executor.goto(SITE_ROOT).await?;

    dismiss_cookie_banner(executor).await;

    if !wait_for_selector(executor, "#email", LOGIN_FORM_TIMEOUT).await? {
        return Err(AppError::login_failed("找不到登录表单 (#email)"));
    }

    let page = executor.page();
    page.find_element("#email").await?.click().await?.type_str(identity).await?;
    page.find_element("#pass").await?.click().await?.type_str(secret).await?;
    page.find_element("[name=login]").await?.click().await?;

    if wait_for_selector(executor, "div[role='navigation']", LOGIN_FORM_TIMEOUT).await? {
        info!("✓ 登录成功");
    } else {
        warn!("⚠️ 登录可能失败或页面结构已变化，继续处理");
    }
    Ok(())
}

/// 直接写入会话 cookie
pub async fn install_session_cookies(executor: &JsExecutor, c_user: &str, xs: &str) -> AppResult<()> {
    let cookies = [("c_user", c_user), ("xs", xs)]
        .into_iter()
        .map(|(name, value)| {
            CookieParam::builder()
                .name(name)
                .value(value)
                .domain(COOKIE_DOMAIN)
                .path("/")
                .secure(true)
                .build()
                .map_err(|message| AppError::Browser(BrowserError::ConfigurationFailed { message }))
        })
        .collect::<AppResult<Vec<_>>>()?;

    executor.page().set_cookies(cookies).await?;
    debug!("已写入会话 cookie");
    Ok(())
}

/// 点掉 cookie 提示（如果有）
async fn dismiss_cookie_banner(executor: &JsExecutor) {
    let js_code = r#"
        (() => {
            const buttons = Array.from(document.querySelectorAll('button'));
            const target = buttons.find(b => /Allow|Accept/.test(b.textContent || ''));
            if (target) {
                target.click();
                return true;
            }
            return false;
        })()
    "#;

    let deadline = Instant::now() + COOKIE_BANNER_TIMEOUT;
    while Instant::now() < deadline {
        match executor.eval_as::<bool>(js_code).await {
            Ok(true) => {
                debug!("已关闭 cookie 提示");
                return;
            }
            Ok(false) => sleep(POLL_INTERVAL).await,
            Err(e) => {
                debug!("检查 cookie 提示失败: {}", e);
                return;
            }
        }
    }
}

/// 轮询等待元素出现
async fn wait_for_selector(executor: &JsExecutor, selector: &str, timeout: Duration) -> AppResult<bool> {
    let js_code = format!("!!document.querySelector({})", serde_json::to_string(selector)?);
    let deadline = Instant::now() + timeout;
    loop {
        if executor.eval_as::<bool>(js_code.as_str()).await.unwrap_or(false) {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(POLL_INTERVAL).await;
    }
}
