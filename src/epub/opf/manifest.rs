//! 清单模块
//!
//! 提供EPUB包中文件清单的结构定义。清单保持OPF中的声明顺序，
//! 同时按ID建立索引。

use std::collections::HashMap;

/// 清单项信息
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    /// 项目ID
    pub id: String,
    /// 文件路径(相对于OPF文件)
    pub href: String,
    /// 媒体类型
    pub media_type: String,
    /// 属性(如nav、cover-image等)
    pub properties: Option<String>,
}

impl ManifestItem {
    /// 创建新的清单项
    pub fn new(id: String, href: String, media_type: String) -> Self {
        Self {
            id,
            href,
            media_type,
            properties: None,
        }
    }

    /// 检查是否包含指定属性
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_whitespace().any(|p| p == property))
    }

    /// 检查是否为EPUB3导航文档
    pub fn is_nav(&self) -> bool {
        self.has_property("nav")
    }

    /// 检查是否为NCX目录
    pub fn is_ncx(&self) -> bool {
        self.media_type == "application/x-dtbncx+xml"
    }

    /// 检查是否为CSS文件
    pub fn is_css(&self) -> bool {
        self.media_type == "text/css"
    }

    /// 检查是否为XHTML内容文档
    pub fn is_xhtml(&self) -> bool {
        matches!(self.media_type.as_str(), "application/xhtml+xml" | "text/html")
    }
}

/// 有序清单
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    items: Vec<ManifestItem>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加清单项，ID重复时保留先出现的项
    pub fn push(&mut self, item: ManifestItem) {
        if self.index.contains_key(&item.id) {
            log::warn!("清单中存在重复的ID {}，已忽略后出现的项", item.id);
            return;
        }
        self.index.insert(item.id.clone(), self.items.len());
        self.items.push(item);
    }

    /// 按ID查找
    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.index.get(id).map(|&idx| &self.items[idx])
    }

    /// 按声明顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 全部样式表
    pub fn stylesheets(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.iter().filter(|item| item.is_css())
    }

    /// 全部XHTML内容文档
    pub fn content_documents(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.iter().filter(|item| item.is_xhtml())
    }

    /// EPUB3导航文档
    pub fn nav(&self) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.is_nav())
    }

    /// 生成一个清单中尚未使用的ID
    pub fn unused_id(&self, base: &str) -> String {
        if !self.index.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|id| !self.index.contains_key(id))
            .unwrap_or_else(|| base.to_string())
    }
}
