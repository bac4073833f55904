//! 测试用的内存EPUB构造器

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const OPF_PATH: &str = "OEBPS/content.opf";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// 生成一个最简单的XHTML内容文档
pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>{}</title>
</head>
<body>
{}
</body>
</html>"#,
        title, body
    )
}

struct Chapter {
    id: String,
    href: String,
    /// 容器中的成员路径（相对于OEBPS），通常与href相同
    path: String,
    content: String,
}

/// 可定制的EPUB构造器
pub struct EpubFixture {
    mimetype: Option<String>,
    spine_attrs: String,
    chapters: Vec<Chapter>,
    css: Option<String>,
    css_href: String,
    css_path: String,
    ncx: Option<String>,
    nav: Option<String>,
    raw_opf: Option<String>,
}

impl Default for EpubFixture {
    fn default() -> Self {
        Self {
            mimetype: Some("application/epub+zip".to_string()),
            spine_attrs: r#" toc="ncx""#.to_string(),
            chapters: vec![Chapter {
                id: "ch1".to_string(),
                href: "Text/ch1.xhtml".to_string(),
                path: "Text/ch1.xhtml".to_string(),
                content: xhtml("Chapter 1", "<h1>Chapter 1</h1>\n<p>简体</p>"),
            }],
            css: Some("body { margin: 0; }\np { text-indent: 2em; }\n".to_string()),
            css_href: "Styles/style.css".to_string(),
            css_path: "Styles/style.css".to_string(),
            ncx: Some(ncx(&[("Chapter 1", "Text/ch1.xhtml")])),
            nav: None,
            raw_opf: None,
        }
    }
}

impl EpubFixture {
    /// 不带任何章节的空书
    pub fn empty() -> Self {
        Self {
            chapters: Vec::new(),
            ncx: Some(ncx(&[])),
            ..Self::default()
        }
    }

    pub fn without_mimetype(mut self) -> Self {
        self.mimetype = None;
        self
    }

    pub fn with_mimetype(mut self, mimetype: &str) -> Self {
        self.mimetype = Some(mimetype.to_string());
        self
    }

    pub fn with_spine_attrs(mut self, attrs: &str) -> Self {
        self.spine_attrs = attrs.to_string();
        self
    }

    pub fn with_chapter(self, id: &str, href: &str, content: &str) -> Self {
        self.with_chapter_at(id, href, href, content)
    }

    /// 清单href与成员路径不同的章节，如百分号编码的href
    pub fn with_chapter_at(mut self, id: &str, href: &str, path: &str, content: &str) -> Self {
        self.chapters.push(Chapter {
            id: id.to_string(),
            href: href.to_string(),
            path: path.to_string(),
            content: content.to_string(),
        });
        self
    }

    pub fn with_css(mut self, css: &str) -> Self {
        self.css = Some(css.to_string());
        self
    }

    /// 样式表的清单href与成员路径
    pub fn with_css_at(mut self, href: &str, path: &str) -> Self {
        self.css_href = href.to_string();
        self.css_path = path.to_string();
        self
    }

    pub fn without_css(mut self) -> Self {
        self.css = None;
        self
    }

    pub fn with_ncx(mut self, entries: &[(&str, &str)]) -> Self {
        self.ncx = Some(ncx(entries));
        self
    }

    pub fn with_raw_ncx(mut self, content: &str) -> Self {
        self.ncx = Some(content.to_string());
        self
    }

    pub fn without_toc(mut self) -> Self {
        self.ncx = None;
        self.nav = None;
        self
    }

    pub fn with_nav(mut self, nav: &str) -> Self {
        self.nav = Some(nav.to_string());
        self
    }

    pub fn with_raw_opf(mut self, opf: &str) -> Self {
        self.raw_opf = Some(opf.to_string());
        self
    }

    pub fn opf(&self) -> String {
        if let Some(raw) = &self.raw_opf {
            return raw.clone();
        }

        let mut manifest = String::new();
        let mut spine = String::new();
        if self.ncx.is_some() {
            manifest.push_str(
                "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
            );
        }
        if self.nav.is_some() {
            manifest.push_str(
                "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
            );
        }
        for chapter in &self.chapters {
            manifest.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                chapter.id, chapter.href
            ));
            spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", chapter.id));
        }
        if self.css.is_some() {
            manifest.push_str(&format!(
                "    <item id=\"css\" href=\"{}\" media-type=\"text/css\"/>\n",
                self.css_href
            ));
        }
        let spine_attrs = if self.ncx.is_some() {
            self.spine_attrs.clone()
        } else {
            self.spine_attrs.replace(r#" toc="ncx""#, "")
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:12345678-1234-1234-1234-123456789abc</dc:identifier>
    <dc:title>测试书籍</dc:title>
    <dc:creator id="creator">作者甲</dc:creator>
    <dc:language>zh-CN</dc:language>
  </metadata>
  <manifest>
{}  </manifest>
  <spine{}>
{}  </spine>
</package>"#,
            manifest, spine_attrs, spine
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        if let Some(mimetype) = &self.mimetype {
            zip.start_file("mimetype", stored).unwrap();
            zip.write_all(mimetype.as_bytes()).unwrap();
        }

        let mut files = vec![
            ("META-INF/container.xml".to_string(), CONTAINER_XML.to_string()),
            (OPF_PATH.to_string(), self.opf()),
        ];
        if let Some(ncx) = &self.ncx {
            files.push(("OEBPS/toc.ncx".to_string(), ncx.clone()));
        }
        if let Some(nav) = &self.nav {
            files.push(("OEBPS/nav.xhtml".to_string(), nav.clone()));
        }
        for chapter in &self.chapters {
            files.push((format!("OEBPS/{}", chapter.path), chapter.content.clone()));
        }
        if let Some(css) = &self.css {
            files.push((format!("OEBPS/{}", self.css_path), css.clone()));
        }

        for (path, content) in files {
            zip.start_file(path, deflated).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }
}

/// 生成单层NCX
pub fn ncx(entries: &[(&str, &str)]) -> String {
    let mut points = String::new();
    for (i, (title, src)) in entries.iter().enumerate() {
        points.push_str(&format!(
            r#"    <navPoint id="np{0}" playOrder="{0}">
      <navLabel><text>{1}</text></navLabel>
      <content src="{2}"/>
    </navPoint>
"#,
            i + 1,
            title,
            src
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="urn:uuid:12345678-1234-1234-1234-123456789abc"/>
    <meta name="dtb:depth" content="1"/>
  </head>
  <docTitle><text>测试书籍</text></docTitle>
  <navMap>
{}  </navMap>
</ncx>"#,
        points
    )
}
