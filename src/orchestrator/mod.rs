//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和会话调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量处理器
//! - 管理应用生命周期（初始化、运行、汇总）
//! - 按运行模式选择发现批次或下载批次
//! - 写结果文件和运行日志
//!
//! ### `session_pool` - 会话池
//! - 创建并认证固定数量的会话
//! - 轮询分配、移出 / 归还、统一关闭
//!
//! ### `batch_runner` - 批量调度器
//! - 每个会话一个执行通道，通道之间并行
//! - 通过 mpsc 收集结果并推进进度
//!
//! ### `post_processor` / `photo_processor` - 单条目处理器
//! - 把单个帖子 / 照片链接交给对应的流程
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<PostReference> / Vec<ImageReference>)
//!     ↓
//! batch_runner + session_pool (分配会话，并行执行)
//!     ↓
//! post_processor / photo_processor (处理单个条目)
//!     ↓
//! workflow::DiscoveryFlow / download_flow
//!     ↓
//! services (能力层：url_normalizer / page_extractor)
//!     ↓
//! infrastructure (基础设施：BrowserSession / HttpSession)
//! ```

pub mod batch_processor;
pub mod batch_runner;
pub mod photo_processor;
pub mod post_processor;
pub mod progress;
pub mod session_pool;

// 重新导出主要类型
pub use batch_processor::App;
pub use batch_runner::{run_batch, BatchEntry, BatchWorker};
pub use photo_processor::DownloadWorker;
pub use post_processor::DiscoveryWorker;
pub use progress::ProgressCounter;
pub use session_pool::SessionPool;
