//! 基于栈的大纲构建

use crate::outline::OutlineNode;

/// 输入块
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// 标题信号，层级从1开始
    Heading { level: u32, title: String },
    /// 正文
    Body(String),
}

impl Block {
    pub fn heading<S: Into<String>>(level: u32, title: S) -> Self {
        Block::Heading {
            level,
            title: title.into(),
        }
    }

    pub fn body<S: Into<String>>(text: S) -> Self {
        Block::Body(text.into())
    }
}

/// 能提供有序块序列的来源
pub trait OutlineSource {
    fn blocks(&self) -> Vec<Block>;
}

impl OutlineSource for [Block] {
    fn blocks(&self) -> Vec<Block> {
        self.to_vec()
    }
}

impl OutlineSource for Vec<Block> {
    fn blocks(&self) -> Vec<Block> {
        self.clone()
    }
}

/// 大纲构建器
///
/// 栈中是当前打开的节点，栈底是合成根节点。遇到L级标题时弹出所有层级不小于L的节点，
/// 新节点成为新栈顶的子节点。跳级的标题直接挂在最近的更高层节点下，不补中间层。
#[derive(Debug)]
pub struct OutlineBuilder {
    stack: Vec<OutlineNode>,
}

impl Default for OutlineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineBuilder {
    pub fn new() -> Self {
        Self {
            stack: vec![OutlineNode::root()],
        }
    }

    /// 从来源构建完整的大纲树
    pub fn build(source: &(impl OutlineSource + ?Sized)) -> OutlineNode {
        let mut builder = Self::new();
        for block in source.blocks() {
            builder.push(block);
        }
        builder.finish()
    }

    /// 追加一个块
    pub fn push(&mut self, block: Block) {
        match block {
            Block::Heading { level, title } => {
                let level = level.max(1);
                while self.stack.len() > 1 && self.top_level() >= level {
                    self.close_top();
                }
                self.stack.push(OutlineNode::new(level, title));
            }
            Block::Body(text) => {
                if let Some(top) = self.stack.last_mut() {
                    top.body.push(text);
                }
            }
        }
    }

    /// 关闭所有打开的节点，返回根节点
    pub fn finish(mut self) -> OutlineNode {
        while self.stack.len() > 1 {
            self.close_top();
        }
        self.stack.pop().unwrap_or_else(OutlineNode::root)
    }

    fn top_level(&self) -> u32 {
        self.stack.last().map(|node| node.level).unwrap_or(0)
    }

    fn close_top(&mut self) {
        if let Some(node) = self.stack.pop() {
            match self.stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => self.stack.push(node),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_skipped_level_is_not_synthesized() {
        let root = OutlineBuilder::build(&vec![
            Block::heading(1, "A"),
            Block::heading(3, "B"),
            Block::heading(1, "C"),
        ]);

        assert!(root.is_root());
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].title, "A");
        assert_eq!(root.children[0].children.len(), 1);
        assert_eq!(root.children[0].children[0].title, "B");
        assert_eq!(root.children[0].children[0].level, 3);
        assert!(root.children[0].children[0].children.is_empty());
        assert_eq!(root.children[1].title, "C");
        assert!(root.children[1].children.is_empty());
    }

    #[test]
    fn test_body_before_first_heading_goes_to_root() {
        let root = OutlineBuilder::build(&vec![
            Block::body("前言"),
            Block::heading(1, "第一章"),
            Block::body("正文一"),
            Block::heading(2, "第一节"),
            Block::body("正文二"),
            Block::heading(1, "第二章"),
        ]);

        assert_eq!(root.body, vec!["前言"]);
        assert_eq!(root.children[0].body, vec!["正文一"]);
        assert_eq!(root.children[0].children[0].body, vec!["正文二"]);
        assert!(root.children[1].body.is_empty());
    }

    #[test]
    fn test_no_headings_gives_degenerate_tree() {
        let root = OutlineBuilder::build(&vec![Block::body("一"), Block::body("二")]);
        assert!(root.children.is_empty());
        assert_eq!(root.body, vec!["一", "二"]);
    }

    #[test]
    fn test_empty_source() {
        let root = OutlineBuilder::build(&Vec::<Block>::new());
        assert_eq!(root, OutlineNode::root());
    }

    #[test]
    fn test_same_level_headings_are_siblings() {
        let root = OutlineBuilder::build(&vec![
            Block::heading(2, "甲"),
            Block::heading(2, "乙"),
            Block::heading(1, "丙"),
        ]);
        let headings = root.headings();
        assert_eq!(headings, vec![(2, "甲"), (2, "乙"), (1, "丙")]);
        assert_eq!(root.children.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_increasing_levels_form_a_chain(n in 1u32..12) {
            let blocks: Vec<Block> = (1..=n).map(|level| Block::heading(level, format!("H{}", level))).collect();
            let root = OutlineBuilder::build(&blocks);

            let mut node = &root;
            for level in 1..=n {
                prop_assert_eq!(node.children.len(), 1);
                node = &node.children[0];
                prop_assert_eq!(node.level, level);
            }
            prop_assert!(node.children.is_empty());
            prop_assert_eq!(root.depth(), n);
        }

        #[test]
        fn prop_build_is_deterministic_and_keeps_every_block(
            levels in proptest::collection::vec((0u32..5, "[a-z]{1,6}"), 0..30)
        ) {
            let blocks: Vec<Block> = levels
                .iter()
                .map(|(level, text)| if *level == 0 { Block::body(text.clone()) } else { Block::heading(*level, text.clone()) })
                .collect();
            let first = OutlineBuilder::build(&blocks);
            let second = OutlineBuilder::build(&blocks);
            prop_assert_eq!(&first, &second);

            let headings = blocks.iter().filter(|b| matches!(b, Block::Heading { .. })).count();
            let bodies = blocks.len() - headings;
            prop_assert_eq!(first.descendant_count(), headings);
            prop_assert_eq!(first.all_body().len(), bodies);
        }
    }
}
