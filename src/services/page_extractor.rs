//! 图片地址提取服务 - 业务能力层
//!
//! 从照片页 HTML 中提取图片地址，三级兜底：
//! 1. 带 `data-visualcompletion="media-vc-image"` 的 `<img>`
//! 2. 在原始文本里用正则匹配 scontent 图床地址
//! 3. 页面上所有 `<img>`
//!
//! 每一级都会排除 src 中含 icon / logo 的图片。

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

/// 使用了哪一级策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    MediaMarker,
    Pattern,
    AllImages,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub tier: ExtractionTier,
    pub urls: Vec<String>,
}

fn media_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| {
        Selector::parse(r#"img[data-visualcompletion="media-vc-image"]"#)
            .expect("静态选择器")
    })
}

fn img_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("img").expect("静态选择器"))
}

fn hosted_media_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"https://scontent[^"']+\.(?:jpg|jpeg|png|gif)"#)
            .expect("静态正则")
    })
}

/// 提取页面中的图片地址
pub fn extract_image_urls(html: &str) -> Extraction {
    let document = Html::parse_document(html);

    // 只要有标记元素就使用第一级，即使它们都没有 src
    let marked_count = document.select(media_selector()).count();
    if marked_count > 0 {
        debug!("找到 {} 个 media-vc-image 图片", marked_count);
        return Extraction {
            tier: ExtractionTier::MediaMarker,
            urls: keep_photos(collect_sources(&document, media_selector())),
        };
    }

    debug!("没有 media-vc-image 图片，尝试正则匹配");
    let mut seen = HashSet::new();
    let matched: Vec<String> = hosted_media_pattern()
        .find_iter(html)
        .map(|m| decode_ampersands(m.as_str()))
        .filter(|url| seen.insert(url.clone()))
        .collect();
    if !matched.is_empty() {
        debug!("正则匹配到 {} 个图片地址", matched.len());
        return Extraction {
            tier: ExtractionTier::Pattern,
            urls: keep_photos(matched),
        };
    }

    let all = collect_sources(&document, img_selector());
    debug!("页面上共有 {} 个其他图片", all.len());
    Extraction {
        tier: ExtractionTier::AllImages,
        urls: keep_photos(all),
    }
}

fn collect_sources(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::to_string)
        .collect()
}

fn keep_photos(urls: Vec<String>) -> Vec<String> {
    urls.into_iter().filter(|url| !is_decoration(url)).collect()
}

/// src 中含 icon / logo（不区分大小写）的视为装饰图
pub fn is_decoration(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    lower.contains("icon") || lower.contains("logo")
}

// 属性值已经由 HTML 解析器反转义，只有正则直接扫原文时才会带着 &amp;
fn decode_ampersands(raw: &str) -> String {
    raw.replace("&amp;", "&")
}
