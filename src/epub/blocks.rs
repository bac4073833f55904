//! 内容文档的块级文本提取
//!
//! 按文档顺序输出标题和段落，同时记录每个块之前出现的元素id，
//! 以便目录中的片段标识定位到具体位置。
//! 段落中的粗体和斜体保留为Markdown强调标记。

use crate::epub::toc::collapse_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body selector"));

/// 块的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// 标题，值为1到6
    Heading(u8),
    Paragraph,
}

/// 一个文本块
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub kind: BlockKind,
    pub text: String,
    /// 块内及块之前（上一块之后）出现的元素id
    pub anchors: Vec<String>,
}

impl ContentBlock {
    pub fn is_heading(&self) -> bool {
        matches!(self.kind, BlockKind::Heading(_))
    }

    pub fn has_anchor(&self, id: &str) -> bool {
        self.anchors.iter().any(|anchor| anchor == id)
    }
}

/// 提取文档中的文本块
pub fn extract_blocks(html: &str) -> Vec<ContentBlock> {
    let document = Html::parse_document(html);
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut collector = Collector::default();
    collector.walk(root, false);
    collector.flush();
    collector.blocks
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "aside"
            | "header"
            | "footer"
            | "blockquote"
            | "pre"
            | "li"
            | "ul"
            | "ol"
            | "dl"
            | "dt"
            | "dd"
            | "table"
            | "tr"
            | "td"
            | "th"
            | "figure"
            | "figcaption"
            | "caption"
            | "hr"
    )
}

/// 行内强调元素对应的Markdown标记
fn emphasis_marker(name: &str) -> Option<&'static str> {
    match name {
        "strong" | "b" => Some("**"),
        "em" | "i" => Some("*"),
        _ => None,
    }
}

fn is_skipped(name: &str) -> bool {
    matches!(
        name,
        "script" | "style" | "head" | "img" | "svg" | "math" | "audio" | "video" | "object"
    )
}

#[derive(Default)]
struct Collector {
    blocks: Vec<ContentBlock>,
    buffer: String,
    anchors: Vec<String>,
    prefix: Option<&'static str>,
    preformatted: bool,
    /// flush次数，用于判断强调元素内部是否出现了块边界
    flushes: usize,
}

impl Collector {
    fn walk(&mut self, element: ElementRef<'_>, in_pre: bool) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    if in_pre {
                        self.preformatted = true;
                        self.buffer.push_str(text);
                    } else {
                        self.buffer.push_str(&text.replace(['\n', '\r', '\t'], " "));
                    }
                }
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.visit(child, in_pre);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit(&mut self, element: ElementRef<'_>, in_pre: bool) {
        let name = element.value().name();
        if is_skipped(name) {
            return;
        }
        if name == "br" {
            self.buffer.push('\n');
            return;
        }
        let id = element.value().attr("id");

        if let Some(level) = heading_level(name) {
            self.flush();
            self.anchors.extend(id.map(str::to_string));
            collect_ids(element, &mut self.anchors);
            let text = collapse_whitespace(&element.text().collect::<String>());
            if text.is_empty() {
                return;
            }
            self.blocks.push(ContentBlock {
                kind: BlockKind::Heading(level),
                text,
                anchors: std::mem::take(&mut self.anchors),
            });
        } else if is_block(name) {
            self.flush();
            self.anchors.extend(id.map(str::to_string));
            if name == "li" {
                self.prefix = Some("- ");
            }
            self.walk(element, in_pre || name == "pre");
            self.flush();
        } else {
            self.anchors.extend(id.map(str::to_string));
            match emphasis_marker(name) {
                Some(marker) if !in_pre => {
                    let start = self.buffer.len();
                    let flushes = self.flushes;
                    self.walk(element, in_pre);
                    if self.flushes == flushes {
                        self.emphasize(start, marker);
                    }
                }
                _ => self.walk(element, in_pre),
            }
        }
    }

    /// 用标记包住缓冲区中 `start` 之后的文本，首尾空白留在标记之外
    fn emphasize(&mut self, start: usize, marker: &str) {
        let inner = self.buffer.split_off(start);
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            self.buffer.push_str(&inner);
            return;
        }
        let leading = &inner[..inner.len() - inner.trim_start().len()];
        let trailing = &inner[inner.trim_end().len()..];
        self.buffer.push_str(leading);
        self.buffer.push_str(marker);
        self.buffer.push_str(trimmed);
        self.buffer.push_str(marker);
        self.buffer.push_str(trailing);
    }

    /// 把缓冲区中的行内文本收为一个段落
    fn flush(&mut self) {
        self.flushes += 1;
        let raw = std::mem::take(&mut self.buffer);
        let text = if self.preformatted {
            raw.trim_matches(['\n', '\r']).trim_end().to_string()
        } else {
            raw.split('\n')
                .map(collapse_whitespace)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.preformatted = false;

        if text.trim().is_empty() {
            return;
        }
        let text = match self.prefix.take() {
            Some(prefix) => format!("{}{}", prefix, text),
            None => text,
        };
        self.blocks.push(ContentBlock {
            kind: BlockKind::Paragraph,
            text,
            anchors: std::mem::take(&mut self.anchors),
        });
    }
}

fn collect_ids(element: ElementRef<'_>, out: &mut Vec<String>) {
    for descendant in element.descendants().skip(1).filter_map(ElementRef::wrap) {
        if let Some(id) = descendant.value().attr("id") {
            out.push(id.to_string());
        }
    }
}
