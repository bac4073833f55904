//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）包文档的XML解析功能。

use crate::epub::opf::{
    manifest::{Manifest, ManifestItem},
    metadata::{Metadata, MetaValue},
    spine::{Spine, SpineItem},
};
use crate::epub::path;
use crate::error::{ReflowError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// 当前所在的OPF区段
#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

/// 解析后的OPF包文档
#[derive(Debug, Clone)]
pub struct PackageDocument {
    /// EPUB版本
    pub version: String,
    /// 唯一标识符所指向的元素ID
    pub unique_identifier: Option<String>,
    /// 元数据
    pub metadata: Metadata,
    /// 清单项(文件列表)
    pub manifest: Manifest,
    /// 脊柱(阅读顺序)
    pub spine: Spine,
}

impl PackageDocument {
    /// 解析OPF文件内容
    ///
    /// # 参数
    /// * `xml_content` - OPF文件的XML内容
    ///
    /// # 返回值
    /// * `Result<PackageDocument>` - XML无法解析，或缺少 `<manifest>`/`<spine>`
    ///   时返回 [`ReflowError::MalformedPackage`]
    pub fn parse_xml(xml_content: &str) -> Result<PackageDocument> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut version = String::new();
        let mut unique_identifier = None;
        let mut metadata = Metadata::new();
        let mut manifest = Manifest::new();
        let mut spine = Spine::default();

        let mut seen_package = false;
        let mut seen_manifest = false;
        let mut seen_spine = false;

        let mut section = Section::None;
        let mut text_content = String::new();
        // 正在读取文本的元数据元素：(本地名, 属性)
        let mut open_element: Option<(String, HashMap<String, String>)> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| ReflowError::MalformedPackage(format!("XML解析失败: {}", e)))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    match (section, local_name.as_str()) {
                        (_, "package") => {
                            seen_package = true;
                            let attrs = attributes_of(e)?;
                            version = attrs.get("version").cloned().unwrap_or_default();
                            unique_identifier = attrs.get("unique-identifier").cloned();
                        }
                        (_, "metadata") if !is_empty => section = Section::Metadata,
                        (_, "manifest") => {
                            seen_manifest = true;
                            if !is_empty {
                                section = Section::Manifest;
                            }
                        }
                        (_, "spine") => {
                            seen_spine = true;
                            let attrs = attributes_of(e)?;
                            spine.toc = attrs.get("toc").cloned();
                            spine.page_progression_direction =
                                attrs.get("page-progression-direction").cloned();
                            if !is_empty {
                                section = Section::Spine;
                            }
                        }
                        (Section::Manifest, "item") => {
                            if let Some(item) = parse_manifest_item(e)? {
                                manifest.push(item);
                            }
                        }
                        (Section::Spine, "itemref") => {
                            let attrs = attributes_of(e)?;
                            if let Some(idref) = attrs.get("idref").filter(|s| !s.is_empty()) {
                                spine.items.push(SpineItem {
                                    idref: idref.clone(),
                                    linear: attrs.get("linear").map(String::as_str) != Some("no"),
                                });
                            }
                        }
                        (Section::Metadata, "meta") => {
                            let attrs = attributes_of(e)?;
                            if is_empty {
                                push_meta(&mut metadata, &attrs, None);
                            } else {
                                open_element = Some(("meta".to_string(), attrs));
                                text_content.clear();
                            }
                        }
                        (Section::Metadata, _) if !is_empty => {
                            open_element = Some((local_name, attributes_of(e)?));
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::Text(e) if open_element.is_some() => {
                    let text = e
                        .unescape()
                        .map_err(|e| ReflowError::MalformedPackage(format!("文本解码失败: {}", e)))?;
                    text_content.push_str(&text);
                }
                Event::CData(e) if open_element.is_some() => {
                    text_content.push_str(&String::from_utf8_lossy(&e));
                }
                Event::End(ref e) => {
                    let local_name = e.local_name();
                    match local_name.as_ref() {
                        b"metadata" | b"manifest" | b"spine" => section = Section::None,
                        name => {
                            if let Some((open_name, attrs)) = open_element.take() {
                                if open_name.as_bytes() == name {
                                    let content = text_content.trim().to_string();
                                    if open_name == "meta" {
                                        push_meta(&mut metadata, &attrs, Some(content));
                                    } else if !content.is_empty() {
                                        metadata.add_dublin_core(open_name, content, attrs);
                                    }
                                } else {
                                    open_element = Some((open_name, attrs));
                                }
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_package {
            return Err(ReflowError::MalformedPackage("缺少<package>根元素".to_string()));
        }
        if !seen_manifest {
            return Err(ReflowError::MalformedPackage("缺少<manifest>元素".to_string()));
        }
        if !seen_spine {
            return Err(ReflowError::MalformedPackage("缺少<spine>元素".to_string()));
        }

        Ok(PackageDocument {
            version,
            unique_identifier,
            metadata,
            manifest,
            spine,
        })
    }

    /// 脊柱项引用的清单项，按阅读顺序
    ///
    /// 任何一个脊柱项在清单中找不到时返回 [`ReflowError::MalformedPackage`]。
    pub fn spine_items(&self) -> Result<Vec<&ManifestItem>> {
        self.spine
            .items
            .iter()
            .map(|item| {
                self.manifest.get(&item.idref).ok_or_else(|| {
                    ReflowError::MalformedPackage(format!(
                        "脊柱项 {} 在清单中不存在",
                        item.idref
                    ))
                })
            })
            .collect()
    }

    /// NCX目录的清单项：优先使用spine的toc属性，其次按媒体类型查找
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.spine
            .toc
            .as_deref()
            .and_then(|id| self.manifest.get(id))
            .or_else(|| self.manifest.iter().find(|item| item.is_ncx()))
    }

    /// 把清单项的href解析为容器内路径
    pub fn resolve_href(package_path: &str, href: &str) -> String {
        path::resolve(path::parent_dir(package_path), href)
    }
}

/// 收集元素属性（键为去掉前缀的本地名，值已反转义）
pub(crate) fn attributes_of(e: &BytesStart) -> Result<HashMap<String, String>> {
    let mut attributes = HashMap::new();
    for attr_result in e.attributes() {
        let attr = attr_result
            .map_err(|err| ReflowError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn parse_manifest_item(e: &BytesStart) -> Result<Option<ManifestItem>> {
    let mut attrs = attributes_of(e)?;
    let (Some(id), Some(href), Some(media_type)) = (
        attrs.remove("id"),
        attrs.remove("href"),
        attrs.remove("media-type"),
    ) else {
        log::warn!("清单项缺少id/href/media-type属性，已忽略");
        return Ok(None);
    };
    let mut item = ManifestItem::new(id, href, media_type);
    item.properties = attrs.remove("properties");
    Ok(Some(item))
}

fn push_meta(metadata: &mut Metadata, attrs: &HashMap<String, String>, text: Option<String>) {
    let content = attrs
        .get("content")
        .cloned()
        .or(text)
        .unwrap_or_default();

    if let (Some(refines), Some(property)) = (attrs.get("refines"), attrs.get("property")) {
        metadata.add_meta(MetaValue::RefinesBased {
            refines_id: refines.trim_start_matches('#').to_string(),
            property: property.clone(),
            content,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPUB3_OPF: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:isbn:9787000000000</dc:identifier>
    <dc:title>三体</dc:title>
    <dc:creator id="creator">刘慈欣</dc:creator>
    <meta refines="#creator" property="role" scheme="marc:relators">aut</meta>
    <dc:language>zh-CN</dc:language>
    <meta property="dcterms:modified">2024-06-05T11:24:01Z</meta>
    <meta name="cover" content="cover-image"/>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ch1" href="Text/ch%201.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="Styles/main.css" media-type="text/css"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  </manifest>
  <spine toc="ncx" page-progression-direction="rtl">
    <itemref idref="ch1"/>
    <itemref idref="nav" linear="no"/>
  </spine>
</package>"##;

    #[test]
    fn test_parse_epub3_package() {
        let package = PackageDocument::parse_xml(EPUB3_OPF).unwrap();

        assert_eq!(package.version, "3.0");
        assert_eq!(package.unique_identifier.as_deref(), Some("uid"));
        assert_eq!(package.metadata.title(), Some("三体"));
        assert_eq!(package.metadata.author().as_deref(), Some("刘慈欣"));
        assert_eq!(package.metadata.language(), Some("zh-CN"));

        assert_eq!(package.manifest.len(), 4);
        assert_eq!(package.spine.items.len(), 2);
        assert!(!package.spine.items[1].linear);
        assert_eq!(package.spine.page_progression_direction.as_deref(), Some("rtl"));
        assert_eq!(package.ncx_item().unwrap().href, "toc.ncx");
        assert_eq!(package.manifest.nav().unwrap().href, "nav.xhtml");
    }

    #[test]
    fn test_spine_items_resolve() {
        let package = PackageDocument::parse_xml(EPUB3_OPF).unwrap();
        let items = package.spine_items().unwrap();
        assert_eq!(items[0].id, "ch1");
        assert_eq!(
            PackageDocument::resolve_href("OEBPS/content.opf", &items[0].href),
            "OEBPS/Text/ch%201.xhtml"
        );
    }

    #[test]
    fn test_dangling_spine_item() {
        let opf = EPUB3_OPF.replace(r#"<itemref idref="ch1"/>"#, r#"<itemref idref="ghost"/>"#);
        let package = PackageDocument::parse_xml(&opf).unwrap();
        assert!(matches!(package.spine_items(), Err(ReflowError::MalformedPackage(_))));
    }

    #[test]
    fn test_missing_spine_is_malformed() {
        let opf = r#"<package version="2.0"><metadata/><manifest/></package>"#;
        let err = PackageDocument::parse_xml(opf).unwrap_err();
        assert!(matches!(err, ReflowError::MalformedPackage(ref m) if m.contains("spine")));
    }

    #[test]
    fn test_missing_manifest_is_malformed() {
        let opf = r#"<package version="2.0"><metadata/><spine/></package>"#;
        let err = PackageDocument::parse_xml(opf).unwrap_err();
        assert!(matches!(err, ReflowError::MalformedPackage(ref m) if m.contains("manifest")));
    }

    #[test]
    fn test_unparsable_xml_is_malformed() {
        let err = PackageDocument::parse_xml("<package><manifest></spine>").unwrap_err();
        assert!(matches!(err, ReflowError::MalformedPackage(_)));
    }

    #[test]
    fn test_epub2_creator_attributes() {
        let opf = r#"<package version="2.0" xmlns:opf="http://www.idpf.org/2007/opf">
  <metadata><dc:creator opf:role="aut" opf:file-as="Doe, Jane">Jane Doe</dc:creator></metadata>
  <manifest/><spine/></package>"#;
        let package = PackageDocument::parse_xml(opf).unwrap();
        let creators = package.metadata.creators();
        assert_eq!(creators[0].name, "Jane Doe");
        assert_eq!(creators[0].role.as_deref(), Some("author"));
    }
}
