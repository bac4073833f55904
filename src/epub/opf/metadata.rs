//! 元数据处理模块
//!
//! 保存OPF `<metadata>` 中的Dublin Core元素与meta标签，
//! 并提供书名、作者、语言等常用字段的查询。

use std::collections::HashMap;

/// 一个Dublin Core元素，如 `<dc:title>`
#[derive(Debug, Clone, PartialEq)]
pub struct DcElement {
    /// 元素文本
    pub value: String,
    /// 元素属性（不含命名空间前缀，如 id、role、file-as）
    pub attributes: HashMap<String, String>,
}

impl DcElement {
    /// 元素ID
    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").map(String::as_str)
    }
}

/// meta标签，只保留精化其他元素的部分
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// 精化其他元素，如 `<meta refines="#creator" property="role">aut</meta>`
    RefinesBased {
        /// 被精化的元素ID（不包含#前缀）
        refines_id: String,
        property: String,
        content: String,
    },
}

/// 创建者信息
#[derive(Debug, Clone, PartialEq)]
pub struct Creator {
    pub name: String,
    /// 角色（marc:relators代码会被展开，如 aut → author）
    pub role: Option<String>,
    pub display_seq: Option<u32>,
}

/// OPF文件中的元数据信息
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// key为DC元素的本地名（title、creator、language……）
    dublin_core: HashMap<String, Vec<DcElement>>,
    metas: Vec<MetaValue>,
}

impl Metadata {
    /// 创建空的元数据
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加Dublin Core元素
    pub fn add_dublin_core(&mut self, name: String, value: String, attributes: HashMap<String, String>) {
        self.dublin_core
            .entry(name)
            .or_default()
            .push(DcElement { value, attributes });
    }

    /// 添加meta标签
    pub fn add_meta(&mut self, meta: MetaValue) {
        self.metas.push(meta);
    }

    fn first(&self, name: &str) -> Option<&str> {
        self.dublin_core
            .get(name)
            .into_iter()
            .flatten()
            .map(|e| e.value.trim())
            .find(|v| !v.is_empty())
    }

    fn refines(&self, id: &str) -> impl Iterator<Item = (&str, &str)> {
        self.metas.iter().filter_map(move |meta| match meta {
            MetaValue::RefinesBased {
                refines_id,
                property,
                content,
            } if refines_id == id => Some((property.as_str(), content.as_str())),
            _ => None,
        })
    }

    /// 书名
    pub fn title(&self) -> Option<&str> {
        self.first("title")
    }

    /// 语言
    pub fn language(&self) -> Option<&str> {
        self.first("language")
    }

    /// 所有标识符
    pub fn identifiers(&self) -> Vec<&DcElement> {
        self.dublin_core.get("identifier").into_iter().flatten().collect()
    }

    /// 所有创建者，支持EPUB2的 `opf:role` 属性和EPUB3的refines关联
    pub fn creators(&self) -> Vec<Creator> {
        let Some(elements) = self.dublin_core.get("creator") else {
            return Vec::new();
        };

        let mut creators: Vec<Creator> = elements
            .iter()
            .filter(|e| !e.value.trim().is_empty())
            .map(|element| {
                let mut creator = Creator {
                    name: element.value.trim().to_string(),
                    role: element.attributes.get("role").map(|r| expand_role(r)),
                    display_seq: None,
                };
                if let Some(id) = element.id() {
                    for (property, content) in self.refines(id) {
                        match property {
                            "role" => creator.role = Some(expand_role(content)),
                            "display-seq" => creator.display_seq = content.parse().ok(),
                            _ => {}
                        }
                    }
                }
                creator
            })
            .collect();

        creators.sort_by_key(|c| c.display_seq.unwrap_or(u32::MAX));
        creators
    }

    /// 主要作者：优先取角色为author的创建者，否则取第一个创建者
    pub fn author(&self) -> Option<String> {
        let creators = self.creators();
        creators
            .iter()
            .find(|c| c.role.as_deref() == Some("author"))
            .or_else(|| creators.first())
            .map(|c| c.name.clone())
    }
}

fn expand_role(code: &str) -> String {
    match code {
        "aut" => "author".to_string(),
        "edt" => "editor".to_string(),
        "trl" => "translator".to_string(),
        "ill" => "illustrator".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_creator_role_from_refines() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core("creator".to_string(), "译者乙".to_string(), attrs(&[("id", "c2")]));
        metadata.add_dublin_core("creator".to_string(), "作者甲".to_string(), attrs(&[("id", "c1")]));
        metadata.add_meta(MetaValue::RefinesBased {
            refines_id: "c1".to_string(),
            property: "role".to_string(),
            content: "aut".to_string(),
        });
        metadata.add_meta(MetaValue::RefinesBased {
            refines_id: "c2".to_string(),
            property: "role".to_string(),
            content: "trl".to_string(),
        });

        assert_eq!(metadata.author().as_deref(), Some("作者甲"));
        let roles: Vec<_> = metadata.creators().into_iter().filter_map(|c| c.role).collect();
        assert!(roles.contains(&"translator".to_string()));
    }

    #[test]
    fn test_epub2_role_attribute() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core("creator".to_string(), "Jane".to_string(), attrs(&[("role", "aut")]));
        assert_eq!(metadata.creators()[0].role.as_deref(), Some("author"));
    }

    #[test]
    fn test_blank_title_is_skipped() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core("title".to_string(), "  ".to_string(), HashMap::new());
        metadata.add_dublin_core("title".to_string(), "书名".to_string(), HashMap::new());
        assert_eq!(metadata.title(), Some("书名"));
        assert_eq!(metadata.language(), None);
    }
}
