use std::path::Path;

use serde::Serialize;

use crate::epub::archive::{CONTAINER_PATH, Container};
use crate::epub::container::ContainerDocument;
use crate::epub::ncx::Ncx;
use crate::epub::opf::{Metadata, PackageDocument};
use crate::epub::toc::TocTree;
use crate::error::{ReflowError, Result};

/// 书籍基本信息，缺失的字段填 `Unknown`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
    pub language: String,
}

impl BookInfo {
    pub const UNKNOWN: &'static str = "Unknown";

    /// 从OPF元数据中提取
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let or_unknown = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| Self::UNKNOWN.to_string())
        };
        Self {
            title: or_unknown(metadata.title().map(str::to_string)),
            author: or_unknown(metadata.author()),
            language: or_unknown(metadata.language().map(str::to_string)),
        }
    }

    pub fn unknown() -> Self {
        Self {
            title: Self::UNKNOWN.to_string(),
            author: Self::UNKNOWN.to_string(),
            language: Self::UNKNOWN.to_string(),
        }
    }
}

/// 按阅读顺序排列的一个章节
#[derive(Debug, Clone)]
pub struct Chapter {
    /// 容器内路径
    pub path: String,
    pub content: String,
}

/// 通过container.xml找到OPF在容器内的路径
pub(crate) fn locate_package(container: &Container) -> Result<String> {
    let container_xml = container.read_str(CONTAINER_PATH)?;
    let document = ContainerDocument::parse_xml(&container_xml)?;
    document
        .package_path()
        .map(str::to_string)
        .ok_or_else(|| ReflowError::ContainerParse("未找到OPF文件路径".to_string()))
}

/// 表示一个已解析的EPUB
pub struct Epub {
    container: Container,
    package_path: String,
    package: PackageDocument,
}

impl Epub {
    /// 从内存中的容器创建Epub实例
    ///
    /// # 参数
    /// * `container` - 已通过mimetype校验的容器
    ///
    /// # 返回值
    /// * `Result<Epub>` - container.xml或OPF无法解析时返回错误
    pub fn new(container: Container) -> Result<Epub> {
        let package_path = locate_package(&container)?;
        let opf = container.read_str(&package_path)?;
        let package = PackageDocument::parse_xml(&opf)?;
        log::debug!("OPF位于 {}，共 {} 个清单项", package_path, package.manifest.len());

        Ok(Epub {
            container,
            package_path,
            package,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Epub> {
        Self::new(Container::from_bytes(bytes)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Epub> {
        Self::new(Container::from_path(path)?)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    pub fn package(&self) -> &PackageDocument {
        &self.package
    }

    /// 获取书籍的基本信息
    pub fn book_info(&self) -> BookInfo {
        BookInfo::from_metadata(&self.package.metadata)
    }

    /// 获取所有章节内容（脊柱顺序）
    ///
    /// 脊柱项指向的文件不在容器中时返回 [`ReflowError::MissingMember`]。
    pub fn chapters(&self) -> Result<Vec<Chapter>> {
        let mut chapters = Vec::new();
        for item in self.package.spine_items()? {
            let path = PackageDocument::resolve_href(&self.package_path, &item.href);
            let content = self.container.read_str(&path)?;
            chapters.push(Chapter { path, content });
        }
        Ok(chapters)
    }

    /// 获取目录
    ///
    /// 优先使用NCX，NCX不存在或为空时使用EPUB3导航文档，都没有时返回空目录。
    pub fn toc(&self) -> Result<TocTree> {
        if let Some(item) = self.package.ncx_item() {
            let ncx_path = PackageDocument::resolve_href(&self.package_path, &item.href);
            if self.container.contains(&ncx_path) {
                let ncx = Ncx::parse_xml(&self.container.read_str(&ncx_path)?)?;
                let tree = TocTree::from_ncx(&ncx, &ncx_path);
                if !tree.is_empty() {
                    return Ok(tree);
                }
            } else {
                log::warn!("NCX文件 {} 不存在", ncx_path);
            }
        }

        if let Some(item) = self.package.manifest.nav() {
            let nav_path = PackageDocument::resolve_href(&self.package_path, &item.href);
            if self.container.contains(&nav_path) {
                let html = self.container.read_str(&nav_path)?;
                return Ok(TocTree::from_nav_document(&html, &nav_path));
            }
            log::warn!("导航文档 {} 不存在", nav_path);
        }

        Ok(TocTree::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::fixtures::{EpubFixture, xhtml};

    #[test]
    fn test_open_and_book_info() {
        let epub = Epub::from_bytes(&EpubFixture::default().to_bytes()).unwrap();

        assert_eq!(epub.package_path(), "OEBPS/content.opf");
        assert_eq!(
            epub.book_info(),
            BookInfo {
                title: "测试书籍".to_string(),
                author: "作者甲".to_string(),
                language: "zh-CN".to_string(),
            }
        );
    }

    #[test]
    fn test_chapters_in_spine_order() {
        let fixture = EpubFixture::default().with_chapter(
            "ch2",
            "Text/ch2.xhtml",
            &xhtml("Chapter 2", "<p>第二章</p>"),
        );
        let epub = Epub::from_bytes(&fixture.to_bytes()).unwrap();
        let chapters = epub.chapters().unwrap();

        let paths: Vec<&str> = chapters.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["OEBPS/Text/ch1.xhtml", "OEBPS/Text/ch2.xhtml"]);
        assert!(chapters[1].content.contains("第二章"));
    }

    #[test]
    fn test_toc_prefers_ncx() {
        let epub = Epub::from_bytes(&EpubFixture::default().to_bytes()).unwrap();
        let entries = epub.toc().unwrap().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Chapter 1");
        assert_eq!(entries[0].path, "OEBPS/Text/ch1.xhtml");
    }

    #[test]
    fn test_toc_falls_back_to_nav_document() {
        let nav = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>nav</title></head>
<body><nav epub:type="toc"><ol><li><a href="Text/ch1.xhtml">第一章</a></li></ol></nav></body>
</html>"#;
        let fixture = EpubFixture::default().without_toc().with_nav(nav);
        let epub = Epub::from_bytes(&fixture.to_bytes()).unwrap();

        let entries = epub.toc().unwrap().entries();
        assert_eq!(entries[0].title, "第一章");
        assert_eq!(entries[0].path, "OEBPS/Text/ch1.xhtml");
    }

    #[test]
    fn test_missing_spine_member() {
        let fixture = EpubFixture::default().with_raw_opf(
            r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata/>
  <manifest><item id="gone" href="Text/gone.xhtml" media-type="application/xhtml+xml"/></manifest>
  <spine><itemref idref="gone"/></spine>
</package>"#,
        );
        let epub = Epub::from_bytes(&fixture.to_bytes()).unwrap();

        assert_eq!(epub.book_info(), BookInfo::unknown());
        assert!(matches!(epub.chapters(), Err(ReflowError::MissingMember(_))));
    }
}
