//! 把大纲树写成新的EPUB容器
//!
//! 每个顶层节点一个XHTML文档；根节点的正文单独成为前言文档。
//! 没有任何标题时，整本书只有一个文档。

use crate::epub::archive::{CONTAINER_PATH, EPUB_MIMETYPE, MIMETYPE_PATH};
use crate::epub::container::ContainerDocument;
use crate::epub::reader::BookInfo;
use crate::epub::rewriter::INJECTED_STYLESHEET;
use crate::epub::style::{StyleOptions, apply_reflow_rules};
use crate::epub::Container;
use crate::error::Result;
use crate::outline::OutlineNode;
use quick_xml::escape::escape;
use sha2::{Digest, Sha256};

const PACKAGE_DIR: &str = "OEBPS";
const NCX_HREF: &str = "toc.ncx";
const NAV_HREF: &str = "nav.xhtml";

const PREFACE_TITLE: &str = "前言";
const NAV_TITLE: &str = "目录";
const UNTITLED: &str = "未命名章节";

/// 新EPUB的书目信息
#[derive(Debug, Clone, PartialEq)]
pub struct EpubMetadata {
    pub title: String,
    pub author: String,
    pub language: String,
}

impl From<&BookInfo> for EpubMetadata {
    fn from(info: &BookInfo) -> Self {
        Self {
            title: info.title.clone(),
            author: info.author.clone(),
            language: info.language.clone(),
        }
    }
}

/// 一个输出的XHTML文档
struct ChapterDocument {
    id: String,
    href: String,
    title: String,
    body: String,
}

/// 导航项，同时用于NCX和导航文档
struct NavItem {
    title: String,
    href: String,
    children: Vec<NavItem>,
}

/// 从大纲树构建EPUB容器
///
/// 返回的容器尚未序列化，调用 [`Container::to_bytes`] 得到EPUB字节。
pub fn emit_epub(root: &OutlineNode, metadata: &EpubMetadata, style: &StyleOptions) -> Result<Container> {
    let identifier = book_identifier(root, metadata);
    let stylesheet_href = format!("../{}", INJECTED_STYLESHEET);

    let mut documents: Vec<ChapterDocument> = Vec::new();
    let mut nav: Vec<NavItem> = Vec::new();

    if root.children.is_empty() {
        let href = chapter_href(1);
        let mut body = String::new();
        push_paragraphs(&mut body, &root.body);
        nav.push(NavItem {
            title: display_title(&metadata.title),
            href: href.clone(),
            children: Vec::new(),
        });
        documents.push(ChapterDocument {
            id: chapter_id(1),
            href,
            title: display_title(&metadata.title),
            body,
        });
    } else {
        if !root.body.is_empty() {
            let number = documents.len() + 1;
            let href = chapter_href(number);
            let mut body = format!("<h1>{}</h1>\n", PREFACE_TITLE);
            push_paragraphs(&mut body, &root.body);
            nav.push(NavItem {
                title: PREFACE_TITLE.to_string(),
                href: href.clone(),
                children: Vec::new(),
            });
            documents.push(ChapterDocument {
                id: chapter_id(number),
                href,
                title: PREFACE_TITLE.to_string(),
                body,
            });
        }
        for node in &root.children {
            let number = documents.len() + 1;
            let href = chapter_href(number);
            let mut body = String::new();
            let mut anchor = 0;
            let mut item = render_node(&mut body, node, &href, &mut anchor);
            item.href = href.clone();
            documents.push(ChapterDocument {
                id: chapter_id(number),
                href,
                title: item.title.clone(),
                body,
            });
            nav.push(item);
        }
    }
    log::info!("生成EPUB: {} 个内容文档", documents.len());

    let mut container = Container::new();
    container.put(MIMETYPE_PATH, EPUB_MIMETYPE.as_bytes().to_vec());
    let package_path = format!("{}/content.opf", PACKAGE_DIR);
    container.put(CONTAINER_PATH, ContainerDocument::render(&package_path).into_bytes());
    container.put(
        package_path,
        render_package(metadata, style, &identifier, &documents).into_bytes(),
    );
    container.put(
        format!("{}/{}", PACKAGE_DIR, NCX_HREF),
        render_ncx(metadata, &identifier, &nav).into_bytes(),
    );
    container.put(
        format!("{}/{}", PACKAGE_DIR, NAV_HREF),
        render_nav(metadata, &nav).into_bytes(),
    );
    for document in &documents {
        container.put(
            format!("{}/{}", PACKAGE_DIR, document.href),
            render_xhtml(metadata, style, &document.title, &stylesheet_href, &document.body).into_bytes(),
        );
    }
    container.put(
        format!("{}/{}", PACKAGE_DIR, INJECTED_STYLESHEET),
        apply_reflow_rules("", style).into_bytes(),
    );
    Ok(container)
}

/// 由书目信息和大纲内容得到的稳定标识，取SHA-256摘要的前8字节
fn book_identifier(root: &OutlineNode, metadata: &EpubMetadata) -> String {
    let mut hasher = Sha256::new();
    hash_field(&mut hasher, &metadata.title);
    hash_field(&mut hasher, &metadata.author);
    for (level, title) in root.headings() {
        hasher.update(level.to_le_bytes());
        hash_field(&mut hasher, title);
    }
    for body in root.all_body() {
        hash_field(&mut hasher, body);
    }
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    format!("urn:bookreflow:{}", hex)
}

/// 带长度前缀写入，相邻字段不会混淆
fn hash_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn chapter_id(number: usize) -> String {
    format!("chapter_{:03}", number)
}

fn chapter_href(number: usize) -> String {
    format!("text/{}.xhtml", chapter_id(number))
}

fn display_title(title: &str) -> String {
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

/// 写出节点及其子节点，返回对应的导航项
fn render_node(out: &mut String, node: &OutlineNode, href: &str, anchor: &mut usize) -> NavItem {
    *anchor += 1;
    let id = format!("s{}", anchor);
    let title = display_title(&node.title);
    let level = node.level.clamp(1, 6);
    out.push_str(&format!(
        "<h{level} id=\"{}\">{}</h{level}>\n",
        id,
        escape(title.as_str())
    ));
    push_paragraphs(out, &node.body);

    let children = node
        .children
        .iter()
        .map(|child| render_node(out, child, href, anchor))
        .collect();
    NavItem {
        title,
        href: format!("{}#{}", href, id),
        children,
    }
}

fn push_paragraphs(out: &mut String, body: &[String]) {
    for block in body {
        let lines: Vec<String> = block
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(|line| escape(line).into_owned())
            .collect();
        if lines.is_empty() {
            continue;
        }
        out.push_str("<p>");
        out.push_str(&lines.join("<br/>"));
        out.push_str("</p>\n");
    }
}

fn render_xhtml(
    metadata: &EpubMetadata,
    style: &StyleOptions,
    title: &str,
    stylesheet_href: &str,
    body: &str,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}" dir="{dir}">
<head>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="{css}"/>
</head>
<body>
{body}</body>
</html>
"#,
        lang = escape(metadata.language.as_str()),
        dir = style.direction.as_str(),
        title = escape(title),
        css = stylesheet_href,
        body = body
    )
}

fn render_package(
    metadata: &EpubMetadata,
    style: &StyleOptions,
    identifier: &str,
    documents: &[ChapterDocument],
) -> String {
    let mut manifest = String::new();
    manifest.push_str(&format!(
        "    <item id=\"ncx\" href=\"{}\" media-type=\"application/x-dtbncx+xml\"/>\n",
        NCX_HREF
    ));
    manifest.push_str(&format!(
        "    <item id=\"nav\" href=\"{}\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
        NAV_HREF
    ));
    manifest.push_str(&format!(
        "    <item id=\"reflow-style\" href=\"{}\" media-type=\"text/css\"/>\n",
        INJECTED_STYLESHEET
    ));
    let mut spine = String::new();
    for document in documents {
        manifest.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            document.id, document.href
        ));
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", document.id));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="bookid">{identifier}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{author}</dc:creator>
    <dc:language>{language}</dc:language>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx" page-progression-direction="{direction}">
{spine}  </spine>
</package>
"#,
        identifier = escape(identifier),
        title = escape(metadata.title.as_str()),
        author = escape(metadata.author.as_str()),
        language = escape(metadata.language.as_str()),
        manifest = manifest,
        direction = style.direction.as_str(),
        spine = spine
    )
}

fn nav_depth(items: &[NavItem]) -> usize {
    items
        .iter()
        .map(|item| 1 + nav_depth(&item.children))
        .max()
        .unwrap_or(0)
}

fn render_ncx(metadata: &EpubMetadata, identifier: &str, nav: &[NavItem]) -> String {
    let mut points = String::new();
    let mut play_order = 0;
    for item in nav {
        push_nav_point(&mut points, item, 2, &mut play_order);
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{identifier}"/>
    <meta name="dtb:depth" content="{depth}"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>{title}</text>
  </docTitle>
  <navMap>
{points}  </navMap>
</ncx>
"#,
        identifier = escape(identifier),
        depth = nav_depth(nav).max(1),
        title = escape(metadata.title.as_str()),
        points = points
    )
}

fn push_nav_point(out: &mut String, item: &NavItem, indent: usize, play_order: &mut usize) {
    *play_order += 1;
    let pad = "  ".repeat(indent);
    out.push_str(&format!(
        "{pad}<navPoint id=\"navpoint-{order}\" playOrder=\"{order}\">\n\
         {pad}  <navLabel><text>{title}</text></navLabel>\n\
         {pad}  <content src=\"{src}\"/>\n",
        pad = pad,
        order = play_order,
        title = escape(item.title.as_str()),
        src = escape(item.href.as_str())
    ));
    for child in &item.children {
        push_nav_point(out, child, indent + 1, play_order);
    }
    out.push_str(&format!("{}</navPoint>\n", pad));
}

fn render_nav(metadata: &EpubMetadata, nav: &[NavItem]) -> String {
    let mut list = String::new();
    push_nav_list(&mut list, nav, 2);
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <title>{title}</title>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
{list}  </nav>
</body>
</html>
"#,
        lang = escape(metadata.language.as_str()),
        title = NAV_TITLE,
        list = list
    )
}

fn push_nav_list(out: &mut String, items: &[NavItem], indent: usize) {
    if items.is_empty() {
        return;
    }
    let pad = "  ".repeat(indent);
    out.push_str(&format!("{}<ol>\n", pad));
    for item in items {
        out.push_str(&format!(
            "{}  <li><a href=\"{}\">{}</a>",
            pad,
            escape(item.href.as_str()),
            escape(item.title.as_str())
        ));
        if item.children.is_empty() {
            out.push_str("</li>\n");
        } else {
            out.push('\n');
            push_nav_list(out, &item.children, indent + 2);
            out.push_str(&format!("{}  </li>\n", pad));
        }
    }
    out.push_str(&format!("{}</ol>\n", pad));
}
