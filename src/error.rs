use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReflowError>;

/// 转换流程中的错误类型
#[derive(Error, Debug)]
pub enum ReflowError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("不支持的容器格式: {0}")]
    UnsupportedContainer(String),

    #[error("缺少mimetype文件")]
    MissingMimetype,

    #[error("无效的mimetype: {expected}, 找到: {found}")]
    InvalidMimetype { expected: String, found: String },

    #[error("container.xml解析错误: {0}")]
    ContainerParse(String),

    #[error("OPF文件解析错误: {0}")]
    MalformedPackage(String),

    #[error("NCX文件解析错误: {0}")]
    NcxParse(String),

    #[error("容器中缺少文件: {0}")]
    MissingMember(String),

    #[error("内容文档 {path} 处理失败: {reason}")]
    ContentDocument { path: String, reason: String },

    #[error("简繁转换字典不可用: {0}")]
    DictionaryUnavailable(String),

    #[error("PDF解析错误: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("处理超时（已用时 {elapsed_secs} 秒）")]
    Timeout { elapsed_secs: u64 },

    #[error("转换已被取消")]
    Cancelled,

    #[error("配置文件错误: {0}")]
    Config(String),

    #[error("序列化失败: {0}")]
    Serialization(String),

    #[error("外部工具 {tool} 执行失败: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("无法写入输出文件 {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 出错时所处的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// 解压与格式识别
    Decode,
    /// OPF/container.xml/目录解析与修改
    Package,
    /// 内容文档与样式表修改
    Content,
    /// 简繁转换
    Script,
    /// PDF文本抽取与大纲构建
    Outline,
    /// 重新打包与输出
    Serialize,
    /// 外部工具
    External,
    /// 配置加载
    Config,
    /// 请求边界（取消/超时）
    Request,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decode => "解压",
            Stage::Package => "包文档",
            Stage::Content => "内容文档",
            Stage::Script => "简繁转换",
            Stage::Outline => "大纲",
            Stage::Serialize => "输出",
            Stage::External => "外部工具",
            Stage::Config => "配置",
            Stage::Request => "请求",
        };
        f.write_str(name)
    }
}

impl ReflowError {
    /// 返回出错的处理阶段，供调用方生成结构化的失败信息
    pub fn stage(&self) -> Stage {
        match self {
            ReflowError::Io(_) | ReflowError::Zip(_) => Stage::Decode,
            ReflowError::UnsupportedContainer(_)
            | ReflowError::MissingMimetype
            | ReflowError::InvalidMimetype { .. } => Stage::Decode,
            ReflowError::XmlError(_)
            | ReflowError::ContainerParse(_)
            | ReflowError::MalformedPackage(_)
            | ReflowError::NcxParse(_)
            | ReflowError::MissingMember(_) => Stage::Package,
            ReflowError::ContentDocument { .. } => Stage::Content,
            ReflowError::DictionaryUnavailable(_) => Stage::Script,
            ReflowError::Pdf(_) => Stage::Outline,
            ReflowError::Timeout { .. } | ReflowError::Cancelled => Stage::Request,
            ReflowError::Config(_) => Stage::Config,
            ReflowError::ExternalTool { .. } => Stage::External,
            ReflowError::Serialization(_) | ReflowError::Output { .. } => Stage::Serialize,
        }
    }

    /// 是否属于“容器格式不受支持”一类的错误
    pub fn is_unsupported_container(&self) -> bool {
        matches!(
            self,
            ReflowError::UnsupportedContainer(_)
                | ReflowError::MissingMimetype
                | ReflowError::InvalidMimetype { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_of_package_errors() {
        let err = ReflowError::MalformedPackage("缺少spine".to_string());
        assert_eq!(err.stage(), Stage::Package);
        assert!(err.to_string().contains("缺少spine"));
    }

    #[test]
    fn test_mimetype_errors_are_unsupported_container() {
        let err = ReflowError::InvalidMimetype {
            expected: "application/epub+zip".to_string(),
            found: "text/plain".to_string(),
        };
        assert!(err.is_unsupported_container());
        assert_eq!(err.stage(), Stage::Decode);
        assert!(ReflowError::MissingMimetype.is_unsupported_container());
        assert!(!ReflowError::Cancelled.is_unsupported_container());
    }
}
