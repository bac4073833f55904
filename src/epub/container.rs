use crate::error::{ReflowError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// OPF包文档的媒体类型
pub const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// container.xml中的rootfile信息
#[derive(Debug, Clone, PartialEq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// container.xml的解析结果
#[derive(Debug, Clone)]
pub struct ContainerDocument {
    pub rootfiles: Vec<RootFile>,
}

impl ContainerDocument {
    /// 解析container.xml内容
    ///
    /// # 参数
    /// * `xml_content` - container.xml的文件内容
    ///
    /// # 返回值
    /// * `Result<ContainerDocument>` - 没有任何rootfile时返回 [`ReflowError::ContainerParse`]
    pub fn parse_xml(xml_content: &str) -> Result<ContainerDocument> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut rootfiles = Vec::new();
        let mut in_rootfiles = false;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"rootfiles" => in_rootfiles = true,
                    b"rootfile" if in_rootfiles => {
                        let mut full_path = String::new();
                        let mut media_type = String::new();

                        for attr_result in e.attributes() {
                            let attr = attr_result.map_err(|e| {
                                ReflowError::XmlError(quick_xml::Error::InvalidAttr(e))
                            })?;
                            let value = attr.unescape_value()?.into_owned();
                            match attr.key.local_name().as_ref() {
                                b"full-path" => full_path = value,
                                b"media-type" => media_type = value,
                                _ => {}
                            }
                        }

                        if !full_path.is_empty() {
                            rootfiles.push(RootFile {
                                full_path,
                                media_type,
                            });
                        }
                    }
                    _ => {}
                },
                Event::End(ref e) => {
                    if e.local_name().as_ref() == b"rootfiles" {
                        in_rootfiles = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if rootfiles.is_empty() {
            return Err(ReflowError::ContainerParse(
                "没有找到任何rootfile条目".to_string(),
            ));
        }

        Ok(ContainerDocument { rootfiles })
    }

    /// 获取OPF文件路径
    ///
    /// 优先取第一个 `application/oebps-package+xml` 类型的rootfile，
    /// 否则退回第一个rootfile。
    pub fn package_path(&self) -> Option<&str> {
        self.rootfiles
            .iter()
            .find(|rf| rf.media_type == PACKAGE_MEDIA_TYPE)
            .or_else(|| self.rootfiles.first())
            .map(|rf| rf.full_path.as_str())
    }

    /// 生成只指向一个OPF的container.xml
    pub fn render(package_path: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="{}"/>
  </rootfiles>
</container>
"#,
            quick_xml::escape::escape(package_path),
            PACKAGE_MEDIA_TYPE
        )
    }
}
