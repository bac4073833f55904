//! EPUB作为大纲来源
//!
//! 有目录时以目录项作为标题信号，没有目录时使用文档中的 `h1`–`h6`。

use crate::epub::blocks::{BlockKind, ContentBlock, extract_blocks};
use crate::epub::reader::Epub;
use crate::epub::toc::{TocEntry, TocTree};
use crate::error::Result;
use crate::guard::RequestGuard;
use crate::outline::{Block, OutlineSource};
use std::collections::HashSet;

/// 一个按阅读顺序排列的内容文档及其文本块
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: String,
    pub blocks: Vec<ContentBlock>,
}

impl SourceDocument {
    pub fn parse(path: String, html: &str) -> Self {
        Self {
            path,
            blocks: extract_blocks(html),
        }
    }
}

/// EPUB大纲来源
#[derive(Debug, Clone)]
pub struct EpubSource {
    blocks: Vec<Block>,
}

impl EpubSource {
    /// 读取EPUB的章节和目录
    pub fn from_epub(epub: &Epub, guard: &RequestGuard) -> Result<Self> {
        let mut documents = Vec::new();
        for chapter in epub.chapters()? {
            guard.check()?;
            documents.push(SourceDocument::parse(chapter.path, &chapter.content));
        }

        let toc = epub.toc()?;
        if toc.is_empty() {
            log::info!("没有目录，使用文档中的标题标记");
            Ok(Self::from_markup(&documents))
        } else {
            log::info!("使用目录构建大纲: {} 项", toc.entries().len());
            Ok(Self::from_toc(&toc, &documents))
        }
    }

    /// 以文档中的标题标记作为层级
    pub fn from_markup(documents: &[SourceDocument]) -> Self {
        let blocks = documents
            .iter()
            .flat_map(|doc| doc.blocks.iter())
            .map(|block| match block.kind {
                BlockKind::Heading(level) => Block::heading(u32::from(level), block.text.clone()),
                BlockKind::Paragraph => Block::body(block.text.clone()),
            })
            .collect();
        Self { blocks }
    }

    /// 以目录项作为标题
    ///
    /// 目录项放在所指文档的开头，带片段标识时放在对应元素处。
    /// 文档中与目录项标题相同的标题被去掉，其余标题作为正文。
    pub fn from_toc(toc: &TocTree, documents: &[SourceDocument]) -> Self {
        let entries = toc.entries();
        let placements = place_entries(&entries, documents);

        let mut blocks = Vec::new();
        let mut next = 0;
        for (doc_idx, doc) in documents.iter().enumerate() {
            let titles: HashSet<&str> = entries
                .iter()
                .zip(&placements)
                .filter(|(_, place)| place.0 == doc_idx)
                .map(|(entry, _)| entry.title.as_str())
                .collect();

            for (block_idx, block) in doc.blocks.iter().enumerate() {
                while next < entries.len() && placements[next] <= (doc_idx, block_idx) {
                    blocks.push(Block::heading(entries[next].level, entries[next].title.clone()));
                    next += 1;
                }
                if block.is_heading() && titles.contains(block.text.as_str()) {
                    continue;
                }
                blocks.push(Block::body(block.text.clone()));
            }
        }
        for entry in &entries[next..] {
            blocks.push(Block::heading(entry.level, entry.title.clone()));
        }

        Self { blocks }
    }
}

impl OutlineSource for EpubSource {
    fn blocks(&self) -> Vec<Block> {
        self.blocks.clone()
    }
}

/// 确定每个目录项的位置 (文档序号, 块序号)
///
/// 找不到位置的目录项跟随下一个能定位的目录项；位置不会早于前一个目录项，
/// 保证目录顺序不被打乱。
fn place_entries(entries: &[TocEntry], documents: &[SourceDocument]) -> Vec<(usize, usize)> {
    let end = (documents.len(), 0);
    let located: Vec<Option<(usize, usize)>> = entries
        .iter()
        .map(|entry| {
            let doc_idx = documents.iter().position(|doc| doc.path == entry.path)?;
            let block_idx = entry
                .fragment
                .as_deref()
                .and_then(|id| documents[doc_idx].blocks.iter().position(|b| b.has_anchor(id)))
                .unwrap_or(0);
            Some((doc_idx, block_idx))
        })
        .collect();

    let mut placements = vec![end; entries.len()];
    let mut following = end;
    for idx in (0..entries.len()).rev() {
        if let Some(place) = located[idx] {
            following = place;
        }
        placements[idx] = following;
    }

    let mut floor = (0, 0);
    for place in &mut placements {
        if *place < floor {
            *place = floor;
        }
        floor = *place;
    }
    placements
}
