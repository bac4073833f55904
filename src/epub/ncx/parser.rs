//! NCX解析器模块
//!
//! 提供NCX（Navigation Control file for XML）文件的XML解析功能。

use crate::epub::ncx::{NavMap, NavPoint, NcxMetadata};
use crate::epub::opf::attributes_of;
use crate::error::{ReflowError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// NCX文件解析结果
#[derive(Debug, Clone)]
pub struct Ncx {
    /// NCX版本
    pub version: String,
    /// 元数据
    pub metadata: NcxMetadata,
    /// 文档标题
    pub doc_title: Option<String>,
    /// 导航地图
    pub nav_map: NavMap,
}

/// 正在读取的文本所属的位置
#[derive(Debug, Clone, Copy, PartialEq)]
enum TextTarget {
    None,
    DocTitle,
    NavLabel,
}

impl Ncx {
    /// 解析NCX文件内容
    ///
    /// # 参数
    /// * `xml_content` - NCX文件的XML内容
    ///
    /// # 返回值
    /// * `Result<Ncx>` - XML错误或结构错误时返回 [`ReflowError::NcxParse`]
    pub fn parse_xml(xml_content: &str) -> Result<Ncx> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut version = String::new();
        let mut metadata = NcxMetadata::default();
        let mut doc_title = None;
        let mut nav_map = NavMap::new();

        let mut in_head = false;
        let mut in_nav_map = false;
        let mut target = TextTarget::None;
        let mut text_content = String::new();

        // 导航点解析状态：栈中是尚未闭合的祖先
        let mut nav_point_stack: Vec<NavPoint> = Vec::new();
        let mut current_nav_point: Option<NavPoint> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| ReflowError::NcxParse(format!("XML解析失败: {}", e)))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    match e.local_name().as_ref() {
                        b"ncx" => {
                            version = attributes_of(e)?.remove("version").unwrap_or_default();
                        }
                        b"head" if !is_empty => in_head = true,
                        b"meta" if in_head => {
                            let attrs = attributes_of(e)?;
                            let content = attrs.get("content").cloned().unwrap_or_default();
                            match attrs.get("name").map(String::as_str) {
                                Some("dtb:uid") => metadata.uid = Some(content),
                                Some("dtb:depth") => metadata.depth = content.parse().ok(),
                                _ => {}
                            }
                        }
                        b"docTitle" if !is_empty => {
                            target = TextTarget::DocTitle;
                            text_content.clear();
                        }
                        b"navMap" if !is_empty => in_nav_map = true,
                        b"navPoint" if in_nav_map => {
                            let mut attrs = attributes_of(e)?;
                            let point = NavPoint::new(
                                attrs.remove("id").unwrap_or_default(),
                                attrs
                                    .get("playOrder")
                                    .and_then(|v| v.trim().parse().ok())
                                    .unwrap_or(0),
                                String::new(),
                                String::new(),
                            );
                            if is_empty {
                                attach(point, &mut current_nav_point, &mut nav_map);
                            } else {
                                if let Some(parent) = current_nav_point.take() {
                                    nav_point_stack.push(parent);
                                }
                                current_nav_point = Some(point);
                            }
                        }
                        b"navLabel" if in_nav_map && !is_empty => {
                            target = TextTarget::NavLabel;
                            text_content.clear();
                        }
                        b"content" if in_nav_map => {
                            if let Some(point) = current_nav_point.as_mut() {
                                point.src = attributes_of(e)?.remove("src").unwrap_or_default();
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(e) if target != TextTarget::None => {
                    let text = e
                        .unescape()
                        .map_err(|e| ReflowError::NcxParse(format!("文本解码失败: {}", e)))?;
                    if !text_content.is_empty() {
                        text_content.push(' ');
                    }
                    text_content.push_str(&text);
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"head" => in_head = false,
                    b"navMap" => in_nav_map = false,
                    b"docTitle" => {
                        let title = text_content.trim();
                        if !title.is_empty() {
                            doc_title = Some(title.to_string());
                        }
                        target = TextTarget::None;
                    }
                    b"navLabel" if in_nav_map => {
                        if let Some(point) = current_nav_point.as_mut() {
                            point.label = text_content.trim().to_string();
                        }
                        target = TextTarget::None;
                    }
                    b"navPoint" if in_nav_map => {
                        if let Some(point) = current_nav_point.take() {
                            current_nav_point = nav_point_stack.pop();
                            attach(point, &mut current_nav_point, &mut nav_map);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if current_nav_point.is_some() || !nav_point_stack.is_empty() {
            return Err(ReflowError::NcxParse("navPoint未正确闭合".to_string()));
        }

        nav_map.sort_by_play_order();

        Ok(Ncx {
            version,
            metadata,
            doc_title,
            nav_map,
        })
    }

    /// 导航深度：优先使用dtb:depth，否则根据导航地图计算
    pub fn depth(&self) -> u32 {
        self.metadata.depth.unwrap_or_else(|| self.nav_map.depth())
    }
}

/// 把闭合的导航点挂到当前父节点下，没有父节点时作为顶层导航点
fn attach(point: NavPoint, current: &mut Option<NavPoint>, nav_map: &mut NavMap) {
    match current.as_mut() {
        Some(parent) => parent.children.push(point),
        None => nav_map.add_nav_point(point),
    }
}
