//! 基于 reqwest 的抓取会话

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use tracing::{debug, info};

use crate::browser::login::{COOKIE_DOMAIN, SITE_ROOT};
use crate::error::{AppError, AppResult, AuthError, BrowserError, NetworkError};
use crate::infrastructure::session::{FetchSession, FetchedPage, FetchedResponse, Session, SessionFactory};
use crate::models::Credentials;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// 带固定请求头和 cookie 的 HTTP 会话
pub struct HttpSession {
    slot: usize,
    client: Client,
    jar: Arc<Jar>,
}

impl HttpSession {
    pub fn new(slot: usize, timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(header::REFERER, HeaderValue::from_static(SITE_ROOT));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::Browser(BrowserError::ConfigurationFailed {
                    message: format!("创建 HTTP 客户端失败: {}", e),
                })
            })?;

        Ok(Self { slot, client, jar })
    }

    fn install_cookies(&self, c_user: &str, xs: &str) -> AppResult<()> {
        let site = Url::parse(SITE_ROOT).map_err(|e| AppError::Other(e.to_string()))?;
        for (name, value) in [("c_user", c_user), ("xs", xs)] {
            let cookie = format!("{}={}; Domain={}; Path=/", name, value, COOKIE_DOMAIN);
            self.jar.add_cookie_str(&cookie, &site);
        }
        Ok(())
    }
}

#[async_trait]
impl Session for HttpSession {
    fn label(&self) -> String {
        format!("HTTP 会话 #{}", self.slot)
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> AppResult<()> {
        match credentials {
            Credentials::Cookies { c_user, xs } => {
                self.install_cookies(c_user, xs)?;
                info!("{} 使用提供的认证 cookie", self.label());
                Ok(())
            }
            Credentials::Login { .. } => Err(AppError::Auth(AuthError::UnsupportedCredentials {
                kind: credentials.kind().to_string(),
            })),
        }
    }

    async fn close(&mut self) -> AppResult<()> {
        // 连接池随 Client 释放
        debug!("正在关闭{}", self.label());
        Ok(())
    }
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn fetch_bytes(&mut self, url: &str) -> AppResult<FetchedResponse> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::Network(NetworkError::RequestFailed {
                url: url.to_string(),
                source: Box::new(e),
            })
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let body_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                    AppError::Network(NetworkError::BodyReadFailed {
                        url: body_url.clone(),
                        source: Box::new(e),
                    })
                })
            })
            .boxed();

        Ok(FetchedResponse {
            status,
            final_url,
            content_length,
            body,
        })
    }

    async fn fetch_page(&mut self, url: &str) -> AppResult<FetchedPage> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::Network(NetworkError::RequestFailed {
                url: url.to_string(),
                source: Box::new(e),
            })
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let text = response.text().await.map_err(|e| {
            AppError::Network(NetworkError::BodyReadFailed {
                url: url.to_string(),
                source: Box::new(e),
            })
        })?;

        Ok(FetchedPage {
            status,
            final_url,
            text,
        })
    }
}

/// HTTP 会话工厂
pub struct HttpSessionFactory {
    timeout: Duration,
}

impl HttpSessionFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    type Session = HttpSession;

    async fn create(&self, slot: usize) -> AppResult<HttpSession> {
        HttpSession::new(slot, self.timeout)
    }
}
