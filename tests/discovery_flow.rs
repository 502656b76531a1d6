use async_trait::async_trait;
use pretty_assertions::assert_eq;

use post_image_harvester::error::{AppError, AppResult};
use post_image_harvester::infrastructure::{CandidateElement, PageSession, Session};
use post_image_harvester::models::{Credentials, PostReference};
use post_image_harvester::workflow::discovery_flow::{CLICKABLE_STRATEGIES, FAST_SCAN_XPATH};
use post_image_harvester::workflow::{DiscoveryFlow, DiscoverySettings, DiscoverySource, DiscoveryState};

const POST: &str = "https://www.facebook.com/groups/1/posts/2";

fn photo(fbid: usize) -> String {
    format!("https://www.facebook.com/photo/?fbid={}&set=pcb.77&__tn__=%2CO*F", fbid)
}

fn canonical(fbid: usize) -> String {
    format!("https://www.facebook.com/photo?fbid={}&set=pcb.77", fbid)
}

/// 按脚本回应的假页面
#[derive(Default)]
struct ScriptedPage {
    fail_navigation: bool,
    scan_links: Vec<String>,
    clickable_images: usize,
    /// 点击图片后跳转到的地址，None 表示点击不打开查看器
    viewer_entry: Option<String>,
    /// 每次点"下一张"依次到达的地址，用完后停在原地
    viewer_pages: Vec<String>,

    location: String,
    navigations: usize,
    clicks: usize,
    backs: usize,
    next_calls: usize,
}

#[async_trait]
impl Session for ScriptedPage {
    fn label(&self) -> String {
        "scripted".to_string()
    }

    async fn authenticate(&mut self, _credentials: &Credentials) -> AppResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl PageSession for ScriptedPage {
    async fn navigate(&mut self, url: &str) -> AppResult<()> {
        self.navigations += 1;
        if self.fail_navigation {
            return Err(AppError::navigation_failed(
                url,
                std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"),
            ));
        }
        self.location = url.to_string();
        Ok(())
    }

    async fn current_location(&mut self) -> AppResult<String> {
        Ok(self.location.clone())
    }

    async fn find_candidates(&mut self, xpath: &str) -> AppResult<Vec<CandidateElement>> {
        if xpath == FAST_SCAN_XPATH {
            return Ok(self
                .scan_links
                .iter()
                .enumerate()
                .map(|(position, href)| CandidateElement {
                    position,
                    href: Some(href.clone()),
                })
                .collect());
        }
        if xpath == CLICKABLE_STRATEGIES[0] {
            return Ok((0..self.clickable_images)
                .map(|position| CandidateElement { position, href: None })
                .collect());
        }
        Ok(Vec::new())
    }

    async fn click_candidate(&mut self, _xpath: &str, _position: usize) -> AppResult<bool> {
        self.clicks += 1;
        if let Some(entry) = &self.viewer_entry {
            self.location = entry.clone();
        }
        Ok(true)
    }

    async fn go_back(&mut self) -> AppResult<()> {
        self.backs += 1;
        Ok(())
    }

    async fn invoke_control(&mut self, _selectors: &[&str]) -> AppResult<bool> {
        self.next_calls += 1;
        if let Some(next) = self.viewer_pages.get(self.next_calls - 1) {
            self.location = next.clone();
        }
        Ok(true)
    }
}

fn flow() -> DiscoveryFlow {
    DiscoveryFlow::new(DiscoverySettings::without_delays())
}

fn as_strings(images: &[post_image_harvester::ImageReference]) -> Vec<String> {
    images.iter().map(|i| i.as_str().to_string()).collect()
}

#[tokio::test]
async fn test_enough_scanned_links_skip_the_viewer() {
    let mut page = ScriptedPage {
        scan_links: (1..=6).map(photo).collect(),
        clickable_images: 3,
        viewer_entry: Some(photo(100)),
        ..Default::default()
    };

    let report = flow().run(&mut page, &PostReference::new(POST)).await;

    assert_eq!(as_strings(&report.images), (1..=6).map(canonical).collect::<Vec<_>>());
    assert_eq!(report.source, DiscoverySource::FastScan);
    assert!(report.visited(DiscoveryState::Sufficient));
    assert!(!report.visited(DiscoveryState::ViewerAttempt));
    assert_eq!(page.clicks, 0);
    assert_eq!(page.navigations, 1);
}

#[tokio::test]
async fn test_viewer_stops_after_repeated_identity() {
    let mut page = ScriptedPage {
        scan_links: Vec::new(),
        clickable_images: 3,
        viewer_entry: Some(photo(1)),
        viewer_pages: vec![photo(2), photo(3), photo(4)],
        ..Default::default()
    };

    let report = flow().run(&mut page, &PostReference::new(POST)).await;

    assert_eq!(as_strings(&report.images), (1..=4).map(canonical).collect::<Vec<_>>());
    assert_eq!(report.source, DiscoverySource::Viewer);
    assert_eq!(page.clicks, 1);
    // 3 张新图 + 2 次重复
    assert_eq!(page.next_calls, 5);
    // 打开帖子 + 结束后返回帖子
    assert_eq!(page.navigations, 2);
    assert_eq!(*report.trace.last().unwrap(), DiscoveryState::Done);
}

#[tokio::test]
async fn test_viewer_records_at_most_fifteen_photos() {
    let mut page = ScriptedPage {
        clickable_images: 1,
        viewer_entry: Some(photo(0)),
        viewer_pages: (1..=40).map(photo).collect(),
        ..Default::default()
    };

    let report = flow().run(&mut page, &PostReference::new(POST)).await;

    assert_eq!(report.images.len(), 15);
    assert_eq!(page.next_calls, 14);
    assert_eq!(as_strings(&report.images), (0..15).map(canonical).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_viewer_without_new_photos_gives_up_after_two_attempts() {
    let mut page = ScriptedPage {
        clickable_images: 1,
        viewer_entry: Some(photo(9)),
        ..Default::default()
    };

    let report = flow().run(&mut page, &PostReference::new(POST)).await;

    assert_eq!(page.next_calls, 2);
    assert_eq!(as_strings(&report.images), vec![canonical(9)]);
}

#[tokio::test]
async fn test_falls_back_to_scanned_links_when_viewer_never_opens() {
    let mut page = ScriptedPage {
        scan_links: vec![photo(1), photo(2), photo(1).replace("%2CO*F", "xyz")],
        clickable_images: 5,
        viewer_entry: None,
        ..Default::default()
    };

    let report = flow().run(&mut page, &PostReference::new(POST)).await;

    assert_eq!(as_strings(&report.images), vec![canonical(1), canonical(2)]);
    assert_eq!(report.source, DiscoverySource::FastScan);
    // 第一种策略只试前 3 个，每次都后退
    assert_eq!(page.clicks, 3);
    assert_eq!(page.backs, 3);
    assert!(!report.visited(DiscoveryState::ViewerOpen));
}

#[tokio::test]
async fn test_navigation_failure_yields_empty_result() {
    let mut page = ScriptedPage {
        fail_navigation: true,
        scan_links: (1..=6).map(photo).collect(),
        ..Default::default()
    };

    let report = flow().run(&mut page, &PostReference::new(POST)).await;

    assert!(report.images.is_empty());
    assert_eq!(report.source, DiscoverySource::Nothing);
    assert_eq!(
        report.trace,
        vec![DiscoveryState::Idle, DiscoveryState::Loading, DiscoveryState::Done]
    );
}
