//! # Post Image Harvester
//!
//! 从社交网站帖子中发现图片地址并批量下载的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器页面、HTTP 客户端），只暴露能力
//! - `PageSession` / `FetchSession` - 流程层只认识这两个 trait
//! - `BrowserSession` - 基于 chromiumoxide，通过 `JsExecutor` 执行脚本
//! - `HttpSession` - 基于 reqwest，带固定请求头和 cookie
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 纯函数，不持有任何资源
//! - `url_normalizer` - 去掉跟踪参数，得到图片的规范地址
//! - `page_extractor` - 从照片页 HTML 中提取图片地址
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个帖子" / "一个照片链接"的完整处理流程
//! - `DiscoveryFlow` - 图片发现状态机（扫描 → 查看器 → 汇总）
//! - `download_flow` - 提取并下载照片页中的图片
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_pool` - 会话池
//! - `orchestrator/batch_runner` - 按会话分通道并行执行
//! - `orchestrator/batch_processor` - 应用入口，管理两种批次
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, RunMode};
pub use error::{AppError, AppResult};
pub use infrastructure::{BrowserSession, FetchSession, HttpSession, JsExecutor, PageSession, Session};
pub use models::{Credentials, DiscoveryMap, DownloadOutcome, DownloadTask, ImageReference, PostReference};
pub use orchestrator::{run_batch, App, ProgressCounter, SessionPool};
pub use workflow::{DiscoveryFlow, DiscoverySettings};
