//! 链接规范化服务 - 业务能力层
//!
//! 把页面上抓到的原始链接压缩成最小的身份形式：只保留 `fbid` 和 `set`
//! 两个参数，去掉所有跟踪参数。

use std::collections::HashSet;

use crate::models::ImageReference;

const CANONICAL_PREFIX: &str = "https://www.facebook.com/photo?";
const IDENTITY_PARAM: &str = "fbid=";
const GROUPING_PARAM: &str = "set=";

/// 规范化单个链接
///
/// 同时包含 `fbid=` 和 `set=` 时重建为
/// `https://www.facebook.com/photo?fbid=..&set=..`，否则原样返回。
/// 纯函数，且幂等。
pub fn normalize(raw: &str) -> ImageReference {
    match (extract_param(raw, IDENTITY_PARAM), extract_param(raw, GROUPING_PARAM)) {
        (Some(fbid), Some(set)) => {
            ImageReference::from_canonical(format!("{}{}&{}", CANONICAL_PREFIX, fbid, set))
        }
        _ => ImageReference::from_canonical(raw.to_string()),
    }
}

/// 批量规范化并去重：保留每个规范值第一次出现的位置，顺序不变
pub fn normalize_all<I, S>(raws: I) -> Vec<ImageReference>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    for raw in raws {
        let reference = normalize(raw.as_ref());
        if seen.insert(reference.clone()) {
            cleaned.push(reference);
        }
    }
    cleaned
}

/// 截取 `name=value`，以 `&` 或字符串结尾终止
fn extract_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let start = url.find(name)?;
    let end = url[start..]
        .find('&')
        .map(|offset| start + offset)
        .unwrap_or(url.len());
    Some(&url[start..end])
}
