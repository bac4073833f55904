//! 输出格式
//!
//! 把大纲树写成Markdown或EPUB，并提供输出文件命名。

mod epub;
mod markdown;

pub use epub::{EpubMetadata, emit_epub};
pub use markdown::{FrontMatter, emit_markdown, parse_markdown};

use crate::error::ReflowError;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// 输出文件名后缀
pub const OUTPUT_SUFFIX: &str = "_horizontal";

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Epub,
    Markdown,
    /// 通过calibre转换
    Mobi,
    /// 通过calibre转换
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Epub => "epub",
            OutputFormat::Markdown => "md",
            OutputFormat::Mobi => "mobi",
            OutputFormat::Pdf => "pdf",
        }
    }

    /// 是否需要外部工具
    pub fn is_external(&self) -> bool {
        matches!(self, OutputFormat::Mobi | OutputFormat::Pdf)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Epub => "epub",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Mobi => "mobi",
            OutputFormat::Pdf => "pdf",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = ReflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epub" => Ok(OutputFormat::Epub),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "mobi" => Ok(OutputFormat::Mobi),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(ReflowError::Config(format!("不支持的输出格式: {}", other))),
        }
    }
}

/// 生成输出文件名：`<安全的原文件名>_horizontal.<扩展名>`
pub fn output_file_name(input: &Path, format: OutputFormat) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}{}.{}", safe_file_name(&stem), OUTPUT_SUFFIX, format.extension())
}

/// 替换文件名中的非法字符，合并空白，去掉首尾的点
pub fn safe_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches('.');
    if trimmed.is_empty() {
        "converted_book".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("/tmp/我的 书.epub"), OutputFormat::Epub),
            "我的 书_horizontal.epub"
        );
        assert_eq!(
            output_file_name(Path::new("report.pdf"), OutputFormat::Markdown),
            "report_horizontal.md"
        );
        assert_eq!(
            output_file_name(Path::new("a:b?c.epub"), OutputFormat::Mobi),
            "a_b_c_horizontal.mobi"
        );
        assert_eq!(
            output_file_name(Path::new("...epub"), OutputFormat::Pdf),
            "converted_book_horizontal.pdf"
        );
    }

    #[test]
    fn test_parse_output_format() {
        assert_eq!("MD".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("epub".parse::<OutputFormat>().unwrap(), OutputFormat::Epub);
        assert!("docx".parse::<OutputFormat>().is_err());
    }
}
