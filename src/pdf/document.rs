//! 基于 `lopdf` 的PDF读取

use crate::error::{ReflowError, Result};
use crate::guard::RequestGuard;
use encoding_rs::UTF_16BE;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use std::collections::HashSet;

/// PDF文件头
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// 书签层级上限，防止损坏的大纲引起过深的递归
const MAX_BOOKMARK_DEPTH: u32 = 16;

/// 判断字节是否为PDF
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// 文档信息字典
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

/// 书签（PDF大纲项）
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    /// 层级，顶层为1
    pub level: u32,
    pub title: String,
}

/// 一页的文本
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    /// 页码，从1开始
    pub number: u32,
    pub text: String,
}

/// 已提取文本的PDF文档
#[derive(Debug, Clone)]
pub struct PdfDocument {
    pub page_count: usize,
    pub pages: Vec<PdfPage>,
    pub info: PdfInfo,
    pub bookmarks: Vec<Bookmark>,
}

impl PdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_guard(bytes, &RequestGuard::unbounded())
    }

    /// 解析PDF并提取每页文本，页与页之间检查超时与取消
    ///
    /// 单页提取失败时记录警告并跳过该页。
    pub fn from_bytes_with_guard(bytes: &[u8], guard: &RequestGuard) -> Result<Self> {
        if !is_pdf(bytes) {
            return Err(ReflowError::UnsupportedContainer(
                "缺少PDF文件头 %PDF-".to_string(),
            ));
        }
        let document = Document::load_mem(bytes)?;
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        log::info!("PDF共 {} 页", page_numbers.len());

        let mut pages = Vec::with_capacity(page_numbers.len());
        for number in &page_numbers {
            guard.check()?;
            match document.extract_text(&[*number]) {
                Ok(text) => pages.push(PdfPage {
                    number: *number,
                    text,
                }),
                Err(e) => log::warn!("提取第{}页失败: {}", number, e),
            }
        }

        Ok(Self {
            page_count: page_numbers.len(),
            pages,
            info: read_info(&document),
            bookmarks: read_bookmarks(&document),
        })
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn dictionary_entry<'a>(document: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let object = resolve(document, dict.get(key).ok()?);
    object.as_dict().ok()
}

fn string_entry(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match resolve(document, dict.get(key).ok()?) {
        Object::String(bytes, _) => {
            let text = decode_pdf_string(bytes);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

/// 解码PDF文本字符串：带BOM的按UTF-16BE，否则先试UTF-8再按Latin-1
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        let (text, _) = UTF_16BE.decode_without_bom_handling(rest);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn read_info(document: &Document) -> PdfInfo {
    let Some(info) = dictionary_entry(document, &document.trailer, b"Info") else {
        log::debug!("PDF没有Info字典");
        return PdfInfo::default();
    };
    PdfInfo {
        title: string_entry(document, info, b"Title"),
        author: string_entry(document, info, b"Author"),
        subject: string_entry(document, info, b"Subject"),
    }
}

fn read_bookmarks(document: &Document) -> Vec<Bookmark> {
    let mut bookmarks = Vec::new();
    let outlines = dictionary_entry(document, &document.trailer, b"Root")
        .and_then(|catalog| dictionary_entry(document, catalog, b"Outlines"));
    if let Some(outlines) = outlines {
        let mut visited = HashSet::new();
        walk_outline(document, outlines, 1, &mut visited, &mut bookmarks);
    }
    bookmarks
}

/// 遍历 `First`/`Next` 链表，`visited` 防止循环引用
fn walk_outline(
    document: &Document,
    parent: &Dictionary,
    level: u32,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<Bookmark>,
) {
    if level > MAX_BOOKMARK_DEPTH {
        return;
    }
    let mut next = parent.get(b"First").ok().and_then(|o| o.as_reference().ok());
    while let Some(id) = next {
        if !visited.insert(id) {
            log::warn!("PDF书签存在循环引用，已停止遍历");
            return;
        }
        let Ok(item) = document.get_dictionary(id) else {
            return;
        };
        if let Some(title) = string_entry(document, item, b"Title") {
            out.push(Bookmark { level, title });
        }
        walk_outline(document, item, level + 1, visited, out);
        next = item.get(b"Next").ok().and_then(|o| o.as_reference().ok());
    }
}
