//! 会话能力定义 - 基础设施层
//!
//! 发现流程和下载流程只依赖这里的 trait，不认识具体的浏览器或 HTTP 客户端。
//! 会话是有状态、不可重入的，同一时刻只能被一个任务以 `&mut` 持有。

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::AppResult;
use crate::models::Credentials;

/// 所有会话的公共部分：一次性认证 + 关闭
#[async_trait]
pub trait Session: Send + 'static {
    /// 会话名称（仅用于日志）
    fn label(&self) -> String;

    /// 在交给任务之前执行一次的认证步骤
    async fn authenticate(&mut self, credentials: &Credentials) -> AppResult<()>;

    /// 释放会话占用的资源，会话池保证每个会话只调用一次
    async fn close(&mut self) -> AppResult<()>;
}

/// 页面上匹配到的候选元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateElement {
    /// 在匹配结果中的位置，用于之后点击
    pub position: usize,
    /// 元素的 href（如果有）
    pub href: Option<String>,
}

/// 可交互的浏览会话
#[async_trait]
pub trait PageSession: Session {
    /// 打开指定地址
    async fn navigate(&mut self, url: &str) -> AppResult<()>;

    /// 当前地址
    async fn current_location(&mut self) -> AppResult<String>;

    /// 按 XPath 查找元素，按文档顺序返回
    async fn find_candidates(&mut self, xpath: &str) -> AppResult<Vec<CandidateElement>>;

    /// 滚动到第 `position` 个匹配元素并用脚本点击，元素不存在时返回 false
    async fn click_candidate(&mut self, xpath: &str, position: usize) -> AppResult<bool>;

    /// 浏览器后退
    async fn go_back(&mut self) -> AppResult<()>;

    /// 按 CSS 选择器依次查找控件，点击第一个命中的，没有命中返回 false
    async fn invoke_control(&mut self, selectors: &[&str]) -> AppResult<bool>;
}

/// 响应体字节流
pub type ByteStream = BoxStream<'static, AppResult<Vec<u8>>>;

/// 流式响应
pub struct FetchedResponse {
    pub status: u16,
    /// 跟随重定向之后的最终地址
    pub final_url: String,
    /// 响应头声明的长度
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl FetchedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 整页文本响应
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub final_url: String,
    pub text: String,
}

/// 抓取会话（共享请求头和 cookie）
#[async_trait]
pub trait FetchSession: Session {
    /// 流式获取资源
    async fn fetch_bytes(&mut self, url: &str) -> AppResult<FetchedResponse>;

    /// 获取整页文本（跟随重定向）
    async fn fetch_page(&mut self, url: &str) -> AppResult<FetchedPage>;
}

/// 会话工厂：会话池在初始化时为每个槽位调用一次
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    async fn create(&self, slot: usize) -> AppResult<Self::Session>;
}
