//! Markdown输出与解析
//!
//! 输出：先序遍历大纲树，每个节点写一行标题，随后是正文块，再递归写子节点。
//! 正文中以 `#` 开头的行写成 `\#`，保证重新解析时层级结构不变。

use crate::error::{ReflowError, Result};
use crate::outline::{Block, OutlineNode};
use crate::script::ConversionReport;
use serde::Serialize;

/// Markdown标题的最大层级
const MAX_MARKDOWN_LEVEL: u32 = 6;

const FRONT_MATTER_FENCE: &str = "---";

/// YAML前置元数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontMatter {
    pub title: String,
    pub author: String,
    pub language: String,
    /// 来源格式（epub或pdf）
    pub source: String,
    pub line_height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<ConversionReport>,
}

/// 把大纲树写成Markdown
///
/// 根节点的标题不输出，只输出它的正文和子节点。
pub fn emit_markdown(root: &OutlineNode, front_matter: Option<&FrontMatter>) -> Result<String> {
    let mut out = String::new();
    if let Some(front_matter) = front_matter {
        let yaml = serde_yml::to_string(front_matter)
            .map_err(|e| ReflowError::Serialization(format!("前置元数据序列化失败: {}", e)))?;
        out.push_str(FRONT_MATTER_FENCE);
        out.push('\n');
        out.push_str(&yaml);
        if !yaml.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(FRONT_MATTER_FENCE);
        out.push_str("\n\n");
    }

    write_body(&mut out, &root.body);
    for child in &root.children {
        write_node(&mut out, child);
    }

    let trimmed = out.trim_end_matches('\n').len();
    out.truncate(trimmed);
    out.push('\n');
    Ok(out)
}

fn write_node(out: &mut String, node: &OutlineNode) {
    let level = node.level.clamp(1, MAX_MARKDOWN_LEVEL) as usize;
    let title = node.title.split_whitespace().collect::<Vec<_>>().join(" ");
    out.push_str(&"#".repeat(level));
    if !title.is_empty() {
        out.push(' ');
        out.push_str(&title);
    }
    out.push_str("\n\n");

    write_body(out, &node.body);
    for child in &node.children {
        write_node(out, child);
    }
}

fn write_body(out: &mut String, body: &[String]) {
    for block in body {
        let mut wrote = false;
        for line in block.lines() {
            // 正文块内部的空行会被解析为段落分隔，这里直接去掉
            if line.trim().is_empty() {
                continue;
            }
            let at_document_start = out.is_empty() && !wrote;
            out.push_str(&escape_line(line, at_document_start));
            out.push('\n');
            wrote = true;
        }
        if wrote {
            out.push('\n');
        }
    }
}

fn escape_line(line: &str, at_document_start: bool) -> String {
    let indent = line.len() - line.trim_start().len();
    let (lead, rest) = line.split_at(indent);
    if rest.starts_with('#') || rest.starts_with('\\') {
        format!("{}\\{}", lead, rest)
    } else if at_document_start && rest.starts_with(FRONT_MATTER_FENCE) {
        format!("{}\\{}", lead, rest)
    } else {
        line.to_string()
    }
}

fn unescape_line(line: &str) -> String {
    let indent = line.len() - line.trim_start().len();
    let (lead, rest) = line.split_at(indent);
    match rest.strip_prefix('\\') {
        Some(unescaped) => format!("{}{}", lead, unescaped),
        None => line.to_string(),
    }
}

/// 解析Markdown为块序列
///
/// 跳过开头的YAML前置元数据；以 `#` 开头的行是标题，其余连续的非空行组成一个正文块。
pub fn parse_markdown(text: &str) -> Vec<Block> {
    let mut lines = text.lines().peekable();

    if lines.peek().map(|l| l.trim_end()) == Some(FRONT_MATTER_FENCE) {
        lines.next();
        for line in lines.by_ref() {
            if line.trim_end() == FRONT_MATTER_FENCE {
                break;
            }
        }
    }

    let mut blocks = Vec::new();
    let mut paragraph: Vec<String> = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            flush_paragraph(&mut blocks, &mut paragraph);
        } else if let Some((level, title)) = heading(line) {
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(Block::heading(level, title));
        } else {
            paragraph.push(unescape_line(line));
        }
    }
    flush_paragraph(&mut blocks, &mut paragraph);
    blocks
}

fn heading(line: &str) -> Option<(u32, String)> {
    let hashes = line.len() - line.trim_start_matches('#').len();
    if hashes == 0 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((hashes as u32, rest.trim().to_string()))
}

fn flush_paragraph(blocks: &mut Vec<Block>, paragraph: &mut Vec<String>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Body(paragraph.join("\n")));
        paragraph.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::OutlineBuilder;
    use proptest::prelude::*;

    fn sample_tree() -> OutlineNode {
        OutlineBuilder::build(&vec![
            Block::body("前言"),
            Block::heading(1, "第一章"),
            Block::body("# 不是标题\n第二行"),
            Block::heading(3, "小节"),
            Block::body("正文"),
        ])
    }

    #[test]
    fn test_emit_markdown() {
        let markdown = emit_markdown(&sample_tree(), None).unwrap();
        assert_eq!(
            markdown,
            "前言\n\n# 第一章\n\n\\# 不是标题\n第二行\n\n### 小节\n\n正文\n"
        );
    }

    #[test]
    fn test_no_headings_emits_plain_text() {
        let root = OutlineBuilder::build(&vec![Block::body("一段"), Block::body("两段")]);
        let markdown = emit_markdown(&root, None).unwrap();
        assert_eq!(markdown, "一段\n\n两段\n");
        assert!(!markdown.lines().any(|line| line.starts_with('#')));
    }

    #[test]
    fn test_front_matter_is_skipped_when_parsing() {
        let front_matter = FrontMatter {
            title: "测试书籍".to_string(),
            author: "作者甲".to_string(),
            language: "zh-CN".to_string(),
            source: "epub".to_string(),
            line_height: 1.8,
            page_count: None,
            conversion: Some(ConversionReport::new(2, 2, true, true)),
        };
        let markdown = emit_markdown(&sample_tree(), Some(&front_matter)).unwrap();

        assert!(markdown.starts_with("---\n"));
        assert!(markdown.contains("title: 测试书籍"));
        assert!(markdown.contains("line_height: 1.8"));
        assert!(!markdown.contains("page_count"));

        let blocks = parse_markdown(&markdown);
        assert_eq!(blocks[0], Block::body("前言"));
        assert_eq!(blocks[2], Block::body("# 不是标题\n第二行"));
    }

    #[test]
    fn test_leading_fence_in_body_is_escaped() {
        let root = OutlineBuilder::build(&vec![Block::body("---"), Block::body("正文")]);
        let markdown = emit_markdown(&root, None).unwrap();
        assert!(markdown.starts_with("\\---"));
        assert_eq!(parse_markdown(&markdown), vec![Block::body("---"), Block::body("正文")]);
    }

    fn block_strategy() -> impl Strategy<Value = Block> {
        prop_oneof![
            (1u32..=6, "[a-z]{1,8}").prop_map(|(level, title)| Block::heading(level, title)),
            "[#a-z\\\\]{1,10}".prop_map(Block::body),
        ]
    }

    proptest! {
        #[test]
        fn prop_markdown_round_trip_keeps_shape(blocks in proptest::collection::vec(block_strategy(), 0..25)) {
            let tree = OutlineBuilder::build(&blocks);
            let markdown = emit_markdown(&tree, None).unwrap();
            let reparsed = OutlineBuilder::build(&parse_markdown(&markdown));

            prop_assert_eq!(tree.headings(), reparsed.headings());
            prop_assert_eq!(tree.all_body(), reparsed.all_body());
        }
    }
}
