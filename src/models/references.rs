use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::services::url_normalizer;

/// 帖子地址，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostReference(String);

impl PostReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 规范化后的图片地址
///
/// 只能通过 [`url_normalizer::normalize`] 得到，反序列化时同样会先规范化，
/// 所以两个值相等当且仅当它们的规范形式相等。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ImageReference(String);

impl ImageReference {
    /// 仅供规范化器使用，调用方需保证 `canonical` 已经是规范形式
    pub(crate) fn from_canonical(canonical: String) -> Self {
        Self(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ImageReference {
    fn from(raw: String) -> Self {
        url_normalizer::normalize(&raw)
    }
}

impl From<ImageReference> for String {
    fn from(reference: ImageReference) -> Self {
        reference.0
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个帖子的发现结果：按发现顺序排列，无重复
pub type DiscoveryResult = Vec<ImageReference>;

/// 帖子 → 图片地址列表，也就是 JSON 输入 / 输出的结构
pub type DiscoveryMap = BTreeMap<PostReference, DiscoveryResult>;
