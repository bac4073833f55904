//! 大纲树节点

use serde::Serialize;

/// 大纲节点
///
/// 根节点是合成的0级节点，没有标题；其余节点的层级从1开始。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineNode {
    pub level: u32,
    pub title: String,
    /// 按顺序排列的正文块
    pub body: Vec<String>,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    /// 创建合成根节点
    pub fn root() -> Self {
        Self::new(0, String::new())
    }

    pub fn new(level: u32, title: String) -> Self {
        Self {
            level,
            title,
            body: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.level == 0
    }

    /// 子树中（不含自身）的节点数
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// 子树最大深度，单独的根节点为0
    pub fn depth(&self) -> u32 {
        self.children
            .iter()
            .map(|child| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }

    /// 先序遍历的 (层级, 标题)，不含根节点
    pub fn headings(&self) -> Vec<(u32, &str)> {
        let mut out = Vec::new();
        self.collect_headings(&mut out);
        out
    }

    fn collect_headings<'a>(&'a self, out: &mut Vec<(u32, &'a str)>) {
        for child in &self.children {
            out.push((child.level, child.title.as_str()));
            child.collect_headings(out);
        }
    }

    /// 子树中所有正文块，先序
    pub fn all_body(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.body.iter().map(String::as_str).collect();
        for child in &self.children {
            out.extend(child.all_body());
        }
        out
    }
}
