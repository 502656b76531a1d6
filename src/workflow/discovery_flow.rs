//! 帖子图片发现流程 - 流程层
//!
//! 核心职责：定义"一个帖子"的图片发现流程
//!
//! ```text
//! Idle → Loading → FastScan ─┬→ Sufficient ──────────────────────────────────────┬→ Reconcile → Done
//!                            └→ ViewerAttempt ─┬→ ViewerOpen → Navigating → ViewerExhausted ┘
//!                                              └→ (打不开查看器) ─────────────────→ Reconcile
//! ```
//!
//! 1. 先扫描页面上的照片链接（快、稳定），足够多就直接返回
//! 2. 否则尝试点开全屏查看器，逐张翻页记录照片地址（慢、容易受页面改版影响）
//! 3. 查看器一无所获时退回扫描结果
//!
//! 所有错误都在流程内部消化，最坏结果是返回空列表。

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::infrastructure::PageSession;
use crate::models::{DiscoveryResult, ImageReference, PostReference};
use crate::services::url_normalizer::{normalize, normalize_all};

/// 链接扫描用的组合 XPath
pub const FAST_SCAN_XPATH: &str = "//a[contains(@href, '/photo/?fbid=')] | //a[contains(@href, '/photo?fbid=')] | //a[contains(@href, 'set=pcb.')] | //div[@role='article']//a[.//img]";

/// 可点击图片的查找策略，按优先级排列
pub const CLICKABLE_STRATEGIES: [&str; 2] = [
    "//a[contains(@href, '/photo')]//img",
    "//div[@role='article']//img[not(contains(@src, 'emoji')) and not(contains(@src, 'icon'))]",
];

/// 查看器中"下一张"控件，第一个命中的生效
pub const NEXT_PHOTO_CONTROLS: [&str; 2] = [
    r#"[aria-label="Next photo"]"#,
    r#"[data-testid="chevron-right-overlay"]"#,
];

/// 流程参数
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// 打开帖子后等待动态内容加载
    pub page_load_wait: Duration,
    /// 点击图片后 / 回到帖子后的等待
    pub short_wait: Duration,
    /// 后退后的等待
    pub back_wait: Duration,
    /// 点击"下一张"后的等待
    pub next_wait: Duration,
    /// 扫描到这么多链接就不再打开查看器
    pub sufficient_links: usize,
    /// 每种策略最多尝试点击的元素数
    pub clicks_per_strategy: usize,
    /// 查看器中最多记录的照片数
    pub max_photos: usize,
    /// 连续失败多少次认为已经翻到头
    pub max_consecutive_failures: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            page_load_wait: Duration::from_secs(3),
            short_wait: Duration::from_secs(2),
            back_wait: Duration::from_secs(1),
            next_wait: Duration::from_secs(1),
            sufficient_links: 5,
            clicks_per_strategy: 3,
            max_photos: 15,
            max_consecutive_failures: 2,
        }
    }
}

impl DiscoverySettings {
    /// 去掉所有等待，其余参数不变
    pub fn without_delays() -> Self {
        Self {
            page_load_wait: Duration::ZERO,
            short_wait: Duration::ZERO,
            back_wait: Duration::ZERO,
            next_wait: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// 状态机的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Loading,
    FastScan,
    Sufficient,
    ViewerAttempt,
    ViewerOpen,
    Navigating,
    ViewerExhausted,
    Reconcile,
    Done,
}

/// 结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    FastScan,
    Viewer,
    Nothing,
}

/// 单个帖子的发现报告
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub images: DiscoveryResult,
    pub source: DiscoverySource,
    /// 依次经过的状态
    pub trace: Vec<DiscoveryState>,
}

impl DiscoveryReport {
    pub fn visited(&self, state: DiscoveryState) -> bool {
        self.trace.contains(&state)
    }
}

/// 单步操作的结果，由状态转移代码消化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    ViewerOpened,
    NotViewer,
    ElementGone,
}

/// 单次运行的中间数据
#[derive(Default)]
struct DiscoveryRun {
    scanned: Vec<String>,
    viewer: Vec<ImageReference>,
    images: DiscoveryResult,
    source: Option<DiscoverySource>,
}

/// 帖子图片发现流程
///
/// - 只处理单个帖子
/// - 不持有会话，由调用方借入
pub struct DiscoveryFlow {
    settings: DiscoverySettings,
}

impl DiscoveryFlow {
    pub fn new(settings: DiscoverySettings) -> Self {
        Self { settings }
    }

    pub async fn run<S: PageSession + ?Sized>(&self, session: &mut S, post: &PostReference) -> DiscoveryReport {
        let mut run = DiscoveryRun::default();
        let mut trace = Vec::new();
        let mut state = DiscoveryState::Idle;

        loop {
            trace.push(state);
            state = match state {
                DiscoveryState::Idle => DiscoveryState::Loading,
                DiscoveryState::Loading => match session.navigate(post.as_str()).await {
                    Ok(()) => {
                        sleep(self.settings.page_load_wait).await;
                        DiscoveryState::FastScan
                    }
                    Err(e) => {
                        warn!("❌ 打开帖子失败 {}: {}", post, e);
                        DiscoveryState::Done
                    }
                },
                DiscoveryState::FastScan => {
                    run.scanned = self.fast_scan(session).await;
                    info!("找到 {} 个可见图片链接", run.scanned.len());
                    if run.scanned.len() >= self.settings.sufficient_links {
                        DiscoveryState::Sufficient
                    } else {
                        DiscoveryState::ViewerAttempt
                    }
                }
                DiscoveryState::Sufficient => {
                    info!("链接已足够，跳过照片查看器");
                    DiscoveryState::Reconcile
                }
                DiscoveryState::ViewerAttempt => {
                    if self.open_viewer(session).await {
                        DiscoveryState::ViewerOpen
                    } else {
                        debug!("未能打开照片查看器");
                        DiscoveryState::Reconcile
                    }
                }
                DiscoveryState::ViewerOpen => {
                    match session.current_location().await {
                        Ok(location) => {
                            record_identity(&mut run.viewer, &location);
                        }
                        Err(e) => warn!("读取当前地址失败: {}", e),
                    }
                    DiscoveryState::Navigating
                }
                DiscoveryState::Navigating => {
                    self.page_through_viewer(session, &mut run.viewer).await;
                    info!("通过照片查看器共找到 {} 张图片", run.viewer.len());
                    DiscoveryState::ViewerExhausted
                }
                DiscoveryState::ViewerExhausted => {
                    // 回到帖子，让后续操作从已知状态开始
                    match session.navigate(post.as_str()).await {
                        Ok(()) => sleep(self.settings.short_wait).await,
                        Err(e) => warn!("返回帖子失败: {}", e),
                    }
                    DiscoveryState::Reconcile
                }
                DiscoveryState::Reconcile => {
                    if !run.viewer.is_empty() {
                        run.images = normalize_all(run.viewer.iter().map(ImageReference::as_str));
                        run.source = Some(DiscoverySource::Viewer);
                    } else if !run.scanned.is_empty() {
                        if trace.contains(&DiscoveryState::ViewerAttempt) {
                            info!("使用可见图片链接作为兜底结果");
                        }
                        run.images = normalize_all(&run.scanned);
                        run.source = Some(DiscoverySource::FastScan);
                    }
                    DiscoveryState::Done
                }
                DiscoveryState::Done => break,
            };
        }

        DiscoveryReport {
            images: run.images,
            source: run.source.unwrap_or(DiscoverySource::Nothing),
            trace,
        }
    }

    /// 扫描页面上的照片链接，按出现顺序去重
    async fn fast_scan<S: PageSession + ?Sized>(&self, session: &mut S) -> Vec<String> {
        let candidates = match session.find_candidates(FAST_SCAN_XPATH).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("扫描可见图片链接失败: {}", e);
                return Vec::new();
            }
        };

        let mut links: Vec<String> = Vec::new();
        for href in candidates.into_iter().filter_map(|c| c.href) {
            if (href.contains("fbid=") || href.contains("photo")) && !links.contains(&href) {
                links.push(href);
            }
        }
        links
    }

    /// 依次尝试各策略的前几个元素，第一次打开查看器即返回
    async fn open_viewer<S: PageSession + ?Sized>(&self, session: &mut S) -> bool {
        for strategy in CLICKABLE_STRATEGIES {
            let candidates = match session.find_candidates(strategy).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("选择器 {} 查找失败: {}", strategy, e);
                    continue;
                }
            };
            if candidates.is_empty() {
                continue;
            }
            debug!("找到 {} 个可能可点击的图片", candidates.len());

            for candidate in candidates.iter().take(self.settings.clicks_per_strategy) {
                debug!("尝试点击第 {} 个图片", candidate.position + 1);
                match self.try_click(session, strategy, candidate.position).await {
                    Ok(StepOutcome::ViewerOpened) => {
                        info!("✓ 已打开照片查看器");
                        return true;
                    }
                    Ok(StepOutcome::NotViewer) | Ok(StepOutcome::ElementGone) => {
                        debug!("点击没有打开照片查看器，后退重试");
                    }
                    Err(e) => warn!("点击第 {} 个图片出错: {}", candidate.position + 1, e),
                }
                if let Err(e) = session.go_back().await {
                    debug!("后退失败: {}", e);
                }
                sleep(self.settings.back_wait).await;
            }
        }
        false
    }

    async fn try_click<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        strategy: &str,
        position: usize,
    ) -> crate::error::AppResult<StepOutcome> {
        if !session.click_candidate(strategy, position).await? {
            return Ok(StepOutcome::ElementGone);
        }
        sleep(self.settings.short_wait).await;

        let location = session.current_location().await?;
        if is_viewer_location(&location) {
            Ok(StepOutcome::ViewerOpened)
        } else {
            Ok(StepOutcome::NotViewer)
        }
    }

    /// 不断点击"下一张"，直到达到上限或连续失败
    async fn page_through_viewer<S: PageSession + ?Sized>(&self, session: &mut S, recorded: &mut Vec<ImageReference>) {
        let mut failures = 0;

        while recorded.len() < self.settings.max_photos && failures < self.settings.max_consecutive_failures {
            match session.invoke_control(&NEXT_PHOTO_CONTROLS).await {
                Ok(true) => {
                    sleep(self.settings.next_wait).await;
                    match session.current_location().await {
                        Ok(location) => {
                            if record_identity(recorded, &location) {
                                failures = 0;
                                debug!("添加第 {} 张图片: {}", recorded.len(), location);
                            } else {
                                failures += 1;
                            }
                        }
                        Err(e) => {
                            failures += 1;
                            debug!("读取当前地址失败: {}", e);
                        }
                    }
                }
                Ok(false) => {
                    failures += 1;
                    debug!("找不到下一张按钮，可能已经到头");
                }
                Err(e) => {
                    failures += 1;
                    warn!("翻到下一张出错: {}", e);
                }
            }
        }

        if failures >= self.settings.max_consecutive_failures {
            debug!("连续 {} 次没有新图片，结束查看器翻页", failures);
        }
    }
}

impl Default for DiscoveryFlow {
    fn default() -> Self {
        Self::new(DiscoverySettings::default())
    }
}

/// 地址中同时含 photo 和 fbid= 视为进入了全屏查看器
pub fn is_viewer_location(location: &str) -> bool {
    location.contains("photo") && location.contains("fbid=")
}

/// 记录一个新的照片身份，已记录过或不带 fbid 时返回 false
fn record_identity(recorded: &mut Vec<ImageReference>, location: &str) -> bool {
    if !location.contains("fbid=") {
        return false;
    }
    let identity = normalize(location);
    if recorded.contains(&identity) {
        return false;
    }
    recorded.push(identity);
    true
}
