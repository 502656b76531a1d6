//! 基于 chromiumoxide 的浏览会话

use async_trait::async_trait;
use chromiumoxide::Browser;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::browser::{self, login, LaunchOptions};
use crate::error::AppResult;
use crate::infrastructure::session::{CandidateElement, PageSession, Session, SessionFactory};
use crate::infrastructure::JsExecutor;
use crate::models::Credentials;

/// 一个浏览会话 = 一个页面（以及它所属的浏览器进程，如果是自己启动的）
pub struct BrowserSession {
    slot: usize,
    executor: Option<JsExecutor>,
    browser: Browser,
    /// 自己启动的浏览器在关闭时一起退出；连接到的外部浏览器只关页面
    owns_browser: bool,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    fn executor(&self) -> AppResult<&JsExecutor> {
        self.executor.as_ref().ok_or_else(|| {
            crate::error::AppError::Other(format!("会话 #{} 已关闭", self.slot))
        })
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl Session for BrowserSession {
    fn label(&self) -> String {
        format!("浏览器会话 #{}", self.slot)
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> AppResult<()> {
        let executor = self.executor()?;
        match credentials {
            Credentials::Login { identity, secret } => {
                login::login_with_password(executor, identity, secret).await
            }
            Credentials::Cookies { c_user, xs } => {
                login::install_session_cookies(executor, c_user, xs).await
            }
        }
    }

    async fn close(&mut self) -> AppResult<()> {
        let Some(executor) = self.executor.take() else {
            return Ok(());
        };
        debug!("正在关闭{}", self.label());

        let result = if self.owns_browser {
            let closed = self.browser.close().await.map(|_| ());
            // 等待子进程退出，避免残留
            if let Err(e) = self.browser.wait().await {
                debug!("等待浏览器进程退出失败: {}", e);
            }
            closed
        } else {
            executor.into_page().close().await
        };
        self.handler_task.abort();
        result?;
        Ok(())
    }
}

#[async_trait]
impl PageSession for BrowserSession {
    async fn navigate(&mut self, url: &str) -> AppResult<()> {
        self.executor()?.goto(url).await
    }

    async fn current_location(&mut self) -> AppResult<String> {
        self.executor()?.current_url().await
    }

    async fn find_candidates(&mut self, xpath: &str) -> AppResult<Vec<CandidateElement>> {
        let js_code = format!(
            r#"
            (() => {{
                const snapshot = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const hrefs = [];
                for (let i = 0; i < snapshot.snapshotLength; i++) {{
                    const el = snapshot.snapshotItem(i);
                    hrefs.push(el.href ? String(el.href) : (el.getAttribute && el.getAttribute('href')) || null);
                }}
                return hrefs;
            }})()
            "#,
            serde_json::to_string(xpath)?
        );

        let hrefs: Vec<Option<String>> = self.executor()?.eval_as(js_code).await?;
        Ok(hrefs
            .into_iter()
            .enumerate()
            .map(|(position, href)| CandidateElement { position, href })
            .collect())
    }

    async fn click_candidate(&mut self, xpath: &str, position: usize) -> AppResult<bool> {
        let js_code = format!(
            r#"
            (() => {{
                const snapshot = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const el = snapshot.snapshotItem({});
                if (!el) {{
                    return false;
                }}
                el.scrollIntoView(true);
                el.click();
                return true;
            }})()
            "#,
            serde_json::to_string(xpath)?,
            position
        );
        self.executor()?.eval_as(js_code).await
    }

    async fn go_back(&mut self) -> AppResult<()> {
        self.executor()?.eval("history.back(); true").await?;
        Ok(())
    }

    async fn invoke_control(&mut self, selectors: &[&str]) -> AppResult<bool> {
        let js_code = format!(
            r#"
            (() => {{
                const buttons = document.querySelectorAll({});
                if (buttons.length > 0) {{
                    buttons[0].click();
                    return true;
                }}
                return false;
            }})()
            "#,
            serde_json::to_string(&selectors.join(", "))?
        );
        self.executor()?.eval_as(js_code).await
    }
}

/// 浏览会话工厂：每个槽位启动（或连接）一个浏览器页面
pub struct BrowserSessionFactory {
    launch: LaunchOptions,
    debug_port: Option<u16>,
}

impl BrowserSessionFactory {
    pub fn new(launch: LaunchOptions, debug_port: Option<u16>) -> Self {
        Self { launch, debug_port }
    }
}

#[async_trait]
impl SessionFactory for BrowserSessionFactory {
    type Session = BrowserSession;

    async fn create(&self, slot: usize) -> AppResult<BrowserSession> {
        let (browser, handler_task, page, owns_browser) = match self.debug_port {
            Some(port) => {
                let (browser, handler, page) = browser::connect_to_browser_and_page(port).await?;
                (browser, handler, page, false)
            }
            None => {
                let (browser, handler, page) = browser::launch_browser(&self.launch, slot).await?;
                (browser, handler, page, true)
            }
        };
        info!("✓ 浏览器会话 #{} 已就绪", slot);

        Ok(BrowserSession {
            slot,
            executor: Some(JsExecutor::new(page)),
            browser,
            owns_browser,
            handler_task,
        })
    }
}
