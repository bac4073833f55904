//! 内容文档（XHTML）的流式修改
//!
//! 只改写文本节点和 `<head>` 末尾，标签、属性、注释等原样写回。
//! `<script>` 与 `<style>` 中的文本不做转换。

use crate::error::{ReflowError, Result};
use crate::script::{ConversionReport, ScriptConverter};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// 对单个内容文档要做的修改
#[derive(Clone, Copy, Default)]
pub struct DocumentEdit<'a> {
    /// 简繁转换器，字典不可用时为 `None`
    pub converter: Option<ScriptConverter<'a>>,
    /// 是否执行转换；为false时只做检测
    pub convert: bool,
    /// 需要在 `<head>` 中引用的样式表（相对href）
    pub stylesheet_href: Option<&'a str>,
}

/// 修改结果
#[derive(Debug, Clone)]
pub struct EditedDocument {
    pub content: String,
    pub report: ConversionReport,
    /// 内容是否有实际改动；没有改动时调用方应保留原始字节
    pub modified: bool,
}

fn document_error(path: &str, reason: impl std::fmt::Display) -> ReflowError {
    ReflowError::ContentDocument {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// 修改一个XHTML内容文档
///
/// # 参数
/// * `path` - 文档在容器内的路径，仅用于错误信息
/// * `xhtml` - 文档内容
/// * `edit` - 要做的修改
pub fn edit_document(path: &str, xhtml: &str, edit: &DocumentEdit<'_>) -> Result<EditedDocument> {
    let mut reader = Reader::from_str(xhtml);
    reader.config_mut().check_end_names = false;
    let mut writer = Writer::new(Vec::with_capacity(xhtml.len() + 128));

    let mut report = ConversionReport::empty();
    let mut skip_depth = 0usize;
    let mut already_linked = false;
    let mut link_injected = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| document_error(path, format!("XML解析失败: {}", e)))?;
        match event {
            Event::Start(e) => {
                match tag_of(&e) {
                    Tag::Raw => skip_depth += 1,
                    Tag::Link => already_linked |= links_to(&e, edit.stylesheet_href),
                    _ => {}
                }
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) => {
                let tag = tag_of(&e);
                if tag == Tag::Head && edit.stylesheet_href.is_some() && !already_linked {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(e))?;
                    write_link(&mut writer, edit.stylesheet_href)?;
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                    link_injected = true;
                } else {
                    if tag == Tag::Link {
                        already_linked |= links_to(&e, edit.stylesheet_href);
                    }
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) => {
                let tag = match e.local_name().as_ref() {
                    b"head" => Tag::Head,
                    b"script" | b"style" => Tag::Raw,
                    _ => Tag::Other,
                };
                match tag {
                    Tag::Raw => skip_depth = skip_depth.saturating_sub(1),
                    Tag::Head if edit.stylesheet_href.is_some() && !already_linked && !link_injected => {
                        write_link(&mut writer, edit.stylesheet_href)?;
                        link_injected = true;
                    }
                    _ => {}
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Text(e) if skip_depth == 0 => {
                let raw = String::from_utf8_lossy(&e).into_owned();
                match process_text(&raw, edit, &mut report) {
                    Some(converted) => {
                        writer.write_event(Event::Text(BytesText::from_escaped(converted)))?
                    }
                    None => writer.write_event(Event::Text(e))?,
                }
            }
            Event::CData(e) if skip_depth == 0 => {
                let raw = String::from_utf8_lossy(&e).into_owned();
                match process_text(&raw, edit, &mut report) {
                    Some(converted) => writer.write_event(Event::CData(BytesCData::new(converted)))?,
                    None => writer.write_event(Event::CData(e))?,
                }
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }

    if edit.stylesheet_href.is_some() && !already_linked && !link_injected {
        log::warn!("内容文档 {} 没有<head>，未能插入样式表引用", path);
    }

    let modified = link_injected || report.changed_chars() > 0;
    let content = if modified {
        String::from_utf8(writer.into_inner())
            .map_err(|e| document_error(path, format!("输出不是有效的UTF-8: {}", e)))?
    } else {
        xhtml.to_string()
    };

    Ok(EditedDocument {
        content,
        report,
        modified,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tag {
    Head,
    Link,
    /// 内容不转换的元素
    Raw,
    Other,
}

fn tag_of(element: &BytesStart) -> Tag {
    match element.local_name().as_ref() {
        b"head" => Tag::Head,
        b"link" => Tag::Link,
        b"script" | b"style" => Tag::Raw,
        _ => Tag::Other,
    }
}

/// 转换或检测一段文本，返回转换后的文本（没有变化时返回 `None`）
fn process_text(raw: &str, edit: &DocumentEdit<'_>, report: &mut ConversionReport) -> Option<String> {
    let converter = edit.converter.as_ref()?;
    let (converted, text_report) = converter.process(raw, edit.convert);
    *report = report.merge(&text_report);
    converted.filter(|converted| converted != raw)
}

fn links_to(link: &BytesStart, href: Option<&str>) -> bool {
    let Some(href) = href else {
        return false;
    };
    link.attributes()
        .flatten()
        .any(|attr| attr.key.local_name().as_ref() == b"href" && attr.value.as_ref() == href.as_bytes())
}

fn write_link(writer: &mut Writer<Vec<u8>>, href: Option<&str>) -> Result<()> {
    let Some(href) = href else {
        return Ok(());
    };
    let mut link = BytesStart::new("link");
    link.push_attribute(("rel", "stylesheet"));
    link.push_attribute(("type", "text/css"));
    link.push_attribute(("href", href));
    writer.write_event(Event::Empty(link))?;
    Ok(())
}
