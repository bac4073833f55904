//! OPF的流式修改
//!
//! 修改只触及目标元素，其余事件原样写回，因此没有被编辑的部分保持原有字节。

use crate::epub::opf::manifest::ManifestItem;
use crate::epub::opf::spine::ReadingDirection;
use crate::error::{ReflowError, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

const DIRECTION_ATTR: &[u8] = b"page-progression-direction";

fn malformed(e: quick_xml::Error) -> ReflowError {
    ReflowError::MalformedPackage(format!("XML解析失败: {}", e))
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner())
        .map_err(|e| ReflowError::MalformedPackage(format!("输出不是有效的UTF-8: {}", e)))
}

/// 在 `<spine>` 上设置翻页方向
///
/// 已有的 `page-progression-direction` 会被替换，方向属性总是写在最后一个，
/// 对同一方向重复调用得到相同的文本。
pub fn set_spine_direction(opf: &str, direction: ReadingDirection) -> Result<String> {
    let mut reader = Reader::from_str(opf);
    let mut writer = Writer::new(Vec::with_capacity(opf.len() + 64));
    let mut found = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) if e.local_name().as_ref() == b"spine" => {
                found = true;
                writer.write_event(Event::Start(with_direction(&e, direction)?))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"spine" => {
                found = true;
                writer.write_event(Event::Empty(with_direction(&e, direction)?))?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }

    if !found {
        return Err(ReflowError::MalformedPackage("缺少<spine>元素".to_string()));
    }
    into_string(writer)
}

fn with_direction(spine: &BytesStart, direction: ReadingDirection) -> Result<BytesStart<'static>> {
    let mut edited = spine.to_owned();
    edited.clear_attributes();
    for attr_result in spine.attributes() {
        let attr = attr_result
            .map_err(|err| ReflowError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        if attr.key.as_ref() != DIRECTION_ATTR {
            edited.push_attribute(attr);
        }
    }
    edited.push_attribute(("page-progression-direction", direction.as_str()));
    Ok(edited)
}

/// 在 `<manifest>` 末尾追加一个清单项
///
/// 新元素沿用manifest元素的命名空间前缀。
pub fn add_manifest_item(opf: &str, item: &ManifestItem) -> Result<String> {
    let mut reader = Reader::from_str(opf);
    let mut writer = Writer::new(Vec::with_capacity(opf.len() + 160));
    let mut found = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::End(e) if e.local_name().as_ref() == b"manifest" => {
                found = true;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Empty(item_element(&name, item)))?;
                writer.write_event(Event::Text(BytesText::from_escaped("\n  ")))?;
                writer.write_event(Event::End(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"manifest" => {
                found = true;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.write_event(Event::Empty(item_element(&name, item)))?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }

    if !found {
        return Err(ReflowError::MalformedPackage("缺少<manifest>元素".to_string()));
    }
    into_string(writer)
}

fn item_element(manifest_name: &str, item: &ManifestItem) -> BytesStart<'static> {
    let name = match manifest_name.split_once(':') {
        Some((prefix, _)) => format!("{}:item", prefix),
        None => "item".to_string(),
    };
    let mut element = BytesStart::new(name);
    element.push_attribute(("id", item.id.as_str()));
    element.push_attribute(("href", item.href.as_str()));
    element.push_attribute(("media-type", item.media_type.as_str()));
    if let Some(properties) = &item.properties {
        element.push_attribute(("properties", properties.as_str()));
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::opf::PackageDocument;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T &amp; U</dc:title></metadata>
  <manifest>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
  </spine>
</package>"#;

    #[test]
    fn test_set_direction_appends_attribute() {
        let edited = set_spine_direction(OPF, ReadingDirection::Ltr).unwrap();
        assert!(edited.contains(r#"<spine toc="ncx" page-progression-direction="ltr">"#));
        // 其余内容保持不变
        assert_eq!(edited.replace(r#" page-progression-direction="ltr""#, ""), OPF);
    }

    #[test]
    fn test_set_direction_replaces_existing() {
        let opf = OPF.replace(
            r#"<spine toc="ncx">"#,
            r#"<spine page-progression-direction="rtl" toc="ncx">"#,
        );
        let edited = set_spine_direction(&opf, ReadingDirection::Ltr).unwrap();
        assert!(edited.contains(r#"<spine toc="ncx" page-progression-direction="ltr">"#));
        assert!(!edited.contains("rtl"));
    }

    #[test]
    fn test_set_direction_is_idempotent() {
        let once = set_spine_direction(OPF, ReadingDirection::Rtl).unwrap();
        let twice = set_spine_direction(&once, ReadingDirection::Rtl).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_direction_without_spine() {
        let err = set_spine_direction("<package><manifest/></package>", ReadingDirection::Ltr)
            .unwrap_err();
        assert!(matches!(err, ReflowError::MalformedPackage(_)));
    }

    #[test]
    fn test_add_manifest_item() {
        let item = ManifestItem::new(
            "reflow-style".to_string(),
            "styles/reflow.css".to_string(),
            "text/css".to_string(),
        );
        let edited = add_manifest_item(OPF, &item).unwrap();
        let package = PackageDocument::parse_xml(&edited).unwrap();
        assert_eq!(package.manifest.len(), 2);
        assert_eq!(package.manifest.get("reflow-style").unwrap().href, "styles/reflow.css");
        assert_eq!(package.metadata.title(), Some("T & U"));
    }

    #[test]
    fn test_add_manifest_item_to_empty_manifest() {
        let opf = r#"<opf:package><opf:manifest/><opf:spine/></opf:package>"#;
        let item = ManifestItem::new("a".to_string(), "a.css".to_string(), "text/css".to_string());
        let edited = add_manifest_item(opf, &item).unwrap();
        assert!(edited.contains(
            r#"<opf:manifest><opf:item id="a" href="a.css" media-type="text/css"/></opf:manifest>"#
        ));
    }
}
