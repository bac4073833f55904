//! 目录模块
//!
//! 把NCX和EPUB3导航文档统一为一棵目录树，href在这里统一解析为容器内路径。

use crate::epub::ncx::{NavPoint, Ncx};
use crate::epub::path;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static NAV_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("nav").expect("nav selector"));

/// 目录树节点
#[derive(Debug, Clone, PartialEq)]
pub struct TocNode {
    pub title: String,
    /// 容器内路径
    pub path: String,
    /// 片段标识（`#` 之后的部分）
    pub fragment: Option<String>,
    pub children: Vec<TocNode>,
}

/// 平铺后的目录项
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    /// 层级，顶层为1
    pub level: u32,
    pub title: String,
    pub path: String,
    pub fragment: Option<String>,
}

/// 目录树
#[derive(Debug, Clone, Default)]
pub struct TocTree {
    pub title: Option<String>,
    pub roots: Vec<TocNode>,
}

impl TocTree {
    /// 从NCX构建，`ncx_path` 是NCX在容器内的路径
    pub fn from_ncx(ncx: &Ncx, ncx_path: &str) -> TocTree {
        let base = path::parent_dir(ncx_path);
        TocTree {
            title: ncx.doc_title.clone(),
            roots: ncx
                .nav_map
                .nav_points
                .iter()
                .map(|point| node_from_nav_point(point, base))
                .collect(),
        }
    }

    /// 从EPUB3导航文档构建
    ///
    /// 取 `epub:type` 含 `toc` 的 `<nav>`，没有时退回第一个 `<nav>`。
    pub fn from_nav_document(html: &str, nav_path: &str) -> TocTree {
        let document = Html::parse_document(html);
        let base = path::parent_dir(nav_path);

        let navs: Vec<ElementRef> = document.select(&NAV_SELECTOR).collect();
        let nav = navs
            .iter()
            .find(|nav| {
                nav.value()
                    .attr("epub:type")
                    .is_some_and(|t| t.split_whitespace().any(|t| t == "toc"))
            })
            .or_else(|| navs.first());

        let Some(nav) = nav else {
            return TocTree::default();
        };

        let title = child_elements(*nav)
            .find(|el| matches!(el.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6"))
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty());
        let roots = child_elements(*nav)
            .find(|el| el.value().name() == "ol")
            .map(|ol| nodes_from_list(ol, base))
            .unwrap_or_default();

        TocTree { title, roots }
    }

    /// 先序平铺
    pub fn entries(&self) -> Vec<TocEntry> {
        let mut entries = Vec::new();
        for node in &self.roots {
            flatten(node, 1, &mut entries);
        }
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn node_from_nav_point(point: &NavPoint, base: &str) -> TocNode {
    let (_, fragment) = path::split_fragment(&point.src);
    TocNode {
        title: collapse_whitespace(&point.label),
        path: path::resolve(base, &point.src),
        fragment: fragment.map(str::to_string),
        children: point
            .children
            .iter()
            .map(|child| node_from_nav_point(child, base))
            .collect(),
    }
}

fn child_elements(element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    element.children().filter_map(ElementRef::wrap)
}

fn nodes_from_list(ol: ElementRef<'_>, base: &str) -> Vec<TocNode> {
    let mut nodes = Vec::new();
    for li in child_elements(ol).filter(|el| el.value().name() == "li") {
        let label = child_elements(li).find(|el| matches!(el.value().name(), "a" | "span"));
        let Some(label) = label else {
            continue;
        };
        let href = label.value().attr("href").unwrap_or_default();
        let (_, fragment) = path::split_fragment(href);
        let children = child_elements(li)
            .find(|el| el.value().name() == "ol")
            .map(|nested| nodes_from_list(nested, base))
            .unwrap_or_default();

        nodes.push(TocNode {
            title: collapse_whitespace(&label.text().collect::<String>()),
            path: if href.is_empty() {
                String::new()
            } else {
                path::resolve(base, href)
            },
            fragment: fragment.map(str::to_string),
            children,
        });
    }
    nodes
}

fn flatten(node: &TocNode, level: u32, out: &mut Vec<TocEntry>) {
    out.push(TocEntry {
        level,
        title: node.title.clone(),
        path: node.path.clone(),
        fragment: node.fragment.clone(),
    });
    for child in &node.children {
        flatten(child, level + 1, out);
    }
}

/// 合并连续空白为单个空格
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAV_DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>目录</title></head>
<body>
  <nav epub:type="landmarks"><ol><li><a href="Text/cover.xhtml">封面</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <h1>目录</h1>
    <ol>
      <li><a href="Text/ch1.xhtml">第一章</a>
        <ol>
          <li><a href="Text/ch1.xhtml#s1">第一节
            开端</a></li>
        </ol>
      </li>
      <li><span>附录</span>
        <ol><li><a href="../appendix.xhtml">附录甲</a></li></ol>
      </li>
    </ol>
  </nav>
</body>
</html>"#;

    #[test]
    fn test_nav_document_tree() {
        let tree = TocTree::from_nav_document(NAV_DOC, "OEBPS/nav.xhtml");
        assert_eq!(tree.title.as_deref(), Some("目录"));
        assert_eq!(tree.roots.len(), 2);
        assert_eq!(tree.roots[0].path, "OEBPS/Text/ch1.xhtml");
        assert_eq!(tree.roots[0].children[0].title, "第一节 开端");
        assert_eq!(tree.roots[0].children[0].fragment.as_deref(), Some("s1"));
        assert_eq!(tree.roots[1].path, "");
        assert_eq!(tree.roots[1].children[0].path, "appendix.xhtml");
    }

    #[test]
    fn test_entries_are_preorder_with_levels() {
        let tree = TocTree::from_nav_document(NAV_DOC, "OEBPS/nav.xhtml");
        let titles: Vec<(u32, String)> = tree.entries().into_iter().map(|e| (e.level, e.title)).collect();
        assert_eq!(
            titles,
            vec![
                (1, "第一章".to_string()),
                (2, "第一节 开端".to_string()),
                (1, "附录".to_string()),
                (2, "附录甲".to_string()),
            ]
        );
    }

    #[test]
    fn test_from_ncx_resolves_relative_to_ncx() {
        let ncx = Ncx::parse_xml(&crate::epub::fixtures::ncx(&[("第一章", "Text/ch1.xhtml#top")])).unwrap();
        let tree = TocTree::from_ncx(&ncx, "OEBPS/toc.ncx");
        assert_eq!(tree.title.as_deref(), Some("测试书籍"));
        let entries = tree.entries();
        assert_eq!(entries[0].path, "OEBPS/Text/ch1.xhtml");
        assert_eq!(entries[0].fragment.as_deref(), Some("top"));
        assert_eq!(entries[0].level, 1);
    }

    #[test]
    fn test_document_without_nav() {
        let tree = TocTree::from_nav_document("<html><body><p>x</p></body></html>", "nav.xhtml");
        assert!(tree.is_empty());
    }
}
