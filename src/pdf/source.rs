//! PDF作为大纲来源

use crate::outline::{Block, OutlineSource};
use crate::pdf::{HeadingClassifier, PdfDocument, PdfPage};

/// 带页码和标题信号的文本块
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub page: u32,
    pub text: String,
    /// 标题层级，正文为 `None`
    pub heading: Option<u32>,
}

/// PDF大纲来源
#[derive(Debug, Clone, Default)]
pub struct PdfSource {
    pub blocks: Vec<TextBlock>,
}

impl PdfSource {
    pub fn from_document(document: &PdfDocument) -> Self {
        let classifier = HeadingClassifier::new(&document.bookmarks);
        Self::from_pages(&document.pages, &classifier)
    }

    /// 按空行切分段落；段落中被判定为标题的行单独成块
    pub fn from_pages(pages: &[PdfPage], classifier: &HeadingClassifier) -> Self {
        let mut blocks = Vec::new();
        for page in pages {
            let text = page.text.replace("\r\n", "\n");
            for paragraph in text.split("\n\n") {
                let mut body: Vec<&str> = Vec::new();
                for line in paragraph.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    match classifier.classify(line) {
                        Some(level) => {
                            push_body(&mut blocks, page.number, &mut body);
                            blocks.push(TextBlock {
                                page: page.number,
                                text: line.to_string(),
                                heading: Some(level),
                            });
                        }
                        None => body.push(line),
                    }
                }
                push_body(&mut blocks, page.number, &mut body);
            }
        }
        Self { blocks }
    }

    pub fn heading_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.heading.is_some()).count()
    }
}

fn push_body(blocks: &mut Vec<TextBlock>, page: u32, lines: &mut Vec<&str>) {
    if lines.is_empty() {
        return;
    }
    blocks.push(TextBlock {
        page,
        text: lines.join("\n"),
        heading: None,
    });
    lines.clear();
}

impl OutlineSource for PdfSource {
    fn blocks(&self) -> Vec<Block> {
        self.blocks
            .iter()
            .map(|block| match block.heading {
                Some(level) => Block::heading(level, block.text.clone()),
                None => Block::body(block.text.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::OutlineBuilder;

    fn page(number: u32, text: &str) -> PdfPage {
        PdfPage {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_no_heading_signals_gives_root_only() {
        let pages = vec![
            page(1, "这是第一段。\n继续第一段。\n\n这是第二段。"),
            page(2, "最后一段。"),
        ];
        let source = PdfSource::from_pages(&pages, &HeadingClassifier::default());
        assert_eq!(source.heading_count(), 0);

        let root = OutlineBuilder::build(&source);
        assert!(root.children.is_empty());
        assert_eq!(root.body, vec!["这是第一段。\n继续第一段。", "这是第二段。", "最后一段。"]);
    }

    #[test]
    fn test_heading_lines_split_out_of_paragraphs() {
        let pages = vec![page(1, "前言内容\n第一章 开始\n正文一\n\n第一节 细节\n正文二")];
        let source = PdfSource::from_pages(&pages, &HeadingClassifier::default());

        let root = OutlineBuilder::build(&source);
        assert_eq!(root.body, vec!["前言内容"]);
        assert_eq!(root.headings(), vec![(1, "第一章 开始"), (2, "第一节 细节")]);
        assert_eq!(root.children[0].body, vec!["正文一"]);
        assert_eq!(root.children[0].children[0].body, vec!["正文二"]);
    }
}
