//! 脊柱模块
//!
//! 提供EPUB包中阅读顺序（脊柱）与翻页方向的结构定义。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 阅读方向，对应 `page-progression-direction` 与CSS `direction`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    #[default]
    Ltr,
    Rtl,
}

impl ReadingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingDirection::Ltr => "ltr",
            ReadingDirection::Rtl => "rtl",
        }
    }

    /// 与阅读方向一致的文本对齐方式
    pub fn text_align(&self) -> &'static str {
        match self {
            ReadingDirection::Ltr => "left",
            ReadingDirection::Rtl => "right",
        }
    }
}

impl fmt::Display for ReadingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ltr" => Ok(ReadingDirection::Ltr),
            "rtl" => Ok(ReadingDirection::Rtl),
            other => Err(format!("未知的阅读方向: {}", other)),
        }
    }
}

/// 脊柱项信息(阅读顺序)
#[derive(Debug, Clone, PartialEq)]
pub struct SpineItem {
    /// 引用的清单项ID
    pub idref: String,
    /// 是否线性阅读
    pub linear: bool,
}

/// `<spine>` 元素
#[derive(Debug, Clone, Default)]
pub struct Spine {
    /// NCX目录的清单项ID
    pub toc: Option<String>,
    /// 原始的 `page-progression-direction` 值
    pub page_progression_direction: Option<String>,
    pub items: Vec<SpineItem>,
}

impl Spine {
    /// 可解析的翻页方向（`default` 或未知值视为未设置）
    pub fn direction(&self) -> Option<ReadingDirection> {
        self.page_progression_direction
            .as_deref()
            .and_then(|d| d.parse().ok())
    }

    /// 线性阅读的脊柱项
    pub fn linear_items(&self) -> impl Iterator<Item = &SpineItem> {
        self.items.iter().filter(|item| item.linear)
    }
}
