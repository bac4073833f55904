//! 调用calibre的 `ebook-convert` 把EPUB转换为MOBI或PDF

use crate::emit::OutputFormat;
use crate::error::{ReflowError, Result};
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::Command;

/// 默认的calibre转换程序
pub const EBOOK_CONVERT: &str = "ebook-convert";

const MOBI_ARGS: &[&str] = &[
    "--output-profile=kindle",
    "--mobi-file-type=new",
    "--no-inline-toc",
    "--max-toc-links=0",
    "--disable-font-rescaling",
];

const PDF_ARGS: &[&str] = &[
    "--pdf-page-numbers",
    "--pdf-add-toc",
    "--paper-size=a4",
    "--pdf-default-font-size=12",
    "--pdf-mono-font-size=10",
    "--margin-left=36",
    "--margin-right=36",
    "--margin-top=36",
    "--margin-bottom=36",
];

/// calibre转换器
#[derive(Debug, Clone)]
pub struct CalibreConverter {
    program: OsString,
}

impl Default for CalibreConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibreConverter {
    pub fn new() -> Self {
        Self::with_program(EBOOK_CONVERT)
    }

    /// 使用指定的程序路径
    pub fn with_program<S: Into<OsString>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn tool_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn tool_error<S: Into<String>>(&self, reason: S) -> ReflowError {
        ReflowError::ExternalTool {
            tool: self.tool_name(),
            reason: reason.into(),
        }
    }

    /// `ebook-convert --version` 输出的第一行
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|e| self.tool_error(format!("无法启动: {}", e)))?;
        if !output.status.success() {
            return Err(self.tool_error(format!("退出状态 {}", output.status)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    /// calibre是否可用
    pub fn is_available(&self) -> bool {
        self.version().is_ok()
    }

    /// 目标格式对应的转换参数
    pub fn arguments(format: OutputFormat) -> Result<&'static [&'static str]> {
        match format {
            OutputFormat::Mobi => Ok(MOBI_ARGS),
            OutputFormat::Pdf => Ok(PDF_ARGS),
            other => Err(ReflowError::Config(format!(
                "{} 格式不需要calibre转换",
                other
            ))),
        }
    }

    /// 转换磁盘上的EPUB文件
    ///
    /// `output` 的扩展名决定calibre的输出格式，需要与 `format` 一致。
    pub fn convert(&self, epub_path: &Path, output: &Path, format: OutputFormat) -> Result<()> {
        let args = Self::arguments(format)?;
        log::info!(
            "调用 {} 转换为 {}: {}",
            self.tool_name(),
            format,
            output.display()
        );

        let result = Command::new(&self.program)
            .arg(epub_path)
            .arg(output)
            .args(args)
            .output()
            .map_err(|e| self.tool_error(format!("无法启动: {}", e)))?;

        for line in String::from_utf8_lossy(&result.stdout).lines() {
            log::debug!("{}", line.trim());
        }
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(self.tool_error(format!(
                "退出状态 {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        if !output.exists() {
            return Err(self.tool_error(format!("没有生成输出文件 {}", output.display())));
        }
        Ok(())
    }

    /// 转换内存中的EPUB字节
    ///
    /// EPUB先写入临时文件，函数返回时临时文件被删除。
    pub fn convert_bytes(&self, epub: &[u8], output: &Path, format: OutputFormat) -> Result<()> {
        let mut input = tempfile::Builder::new()
            .prefix("bookreflow-")
            .suffix(".epub")
            .tempfile()?;
        input.write_all(epub)?;
        input.flush()?;
        self.convert(input.path(), output, format)
    }
}
