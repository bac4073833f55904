//! 单次转换请求
//!
//! 输入字节先按文件头识别格式，再按 (来源格式, 输出格式) 选择处理路线。
//! 所有中间状态都在调用栈上，失败或取消时不产生任何输出。

use crate::config::ReflowConfig;
use crate::emit::{EpubMetadata, FrontMatter, OutputFormat, emit_epub, emit_markdown};
use crate::epub::reader::{BookInfo, Epub};
use crate::epub::rewriter::{ContainerRewriter, RewriteOptions};
use crate::epub::style::StyleOptions;
use crate::error::{ReflowError, Result};
use crate::guard::RequestGuard;
use crate::outline::{Block, EpubSource, OutlineBuilder, OutlineNode, OutlineSource};
use crate::pdf::{PdfDocument, PdfSource, is_pdf};
use crate::script::{CharTable, ConversionReport, CountPolicy, ScriptConverter, ScriptDictionary};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

/// zip本地文件头
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// 字典不可用时的提示
const NO_DICTIONARY_WARNING: &str = "简繁字典不可用，已跳过文字转换";

/// 输入格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Epub,
    Pdf,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Epub => f.write_str("epub"),
            SourceFormat::Pdf => f.write_str("pdf"),
        }
    }
}

/// 按文件头识别输入格式
pub fn sniff(bytes: &[u8]) -> Result<SourceFormat> {
    if bytes.starts_with(ZIP_MAGIC) {
        Ok(SourceFormat::Epub)
    } else if is_pdf(bytes) {
        Ok(SourceFormat::Pdf)
    } else {
        Err(ReflowError::UnsupportedContainer(
            "既不是zip归档也不是PDF".to_string(),
        ))
    }
}

/// 加载字典服务
///
/// 指定了字表文件但无法加载时不会失败，返回 `None` 和一条提示，由调用方降级处理。
pub fn load_dictionary(path: Option<&Path>) -> (Option<Cow<'static, CharTable>>, Option<String>) {
    match path {
        None => (Some(Cow::Borrowed(CharTable::builtin())), None),
        Some(path) => match CharTable::from_path(path) {
            Ok(table) => (Some(Cow::Owned(table)), None),
            Err(e) => {
                log::warn!("{}", e);
                (None, Some(format!("{}: {}", NO_DICTIONARY_WARNING, e)))
            }
        },
    }
}

/// 转换参数
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub style: StyleOptions,
    pub convert_simplified: bool,
    pub output_format: OutputFormat,
    pub count_policy: CountPolicy,
    /// Markdown输出是否带YAML前置元数据
    pub front_matter: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            style: StyleOptions::default(),
            convert_simplified: true,
            output_format: OutputFormat::Epub,
            count_policy: CountPolicy::default(),
            front_matter: false,
        }
    }
}

impl ConvertOptions {
    pub fn from_config(config: &ReflowConfig, output_format: OutputFormat) -> Self {
        Self {
            style: config.style(),
            convert_simplified: config.convert_simplified,
            output_format,
            count_policy: config.count_policy,
            front_matter: config.front_matter,
        }
    }

    fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            style: self.style.clone(),
            convert_script: self.convert_simplified,
        }
    }
}

/// 转换请求
#[derive(Debug, Clone)]
pub struct ConvertRequest<'a> {
    pub input: &'a [u8],
    pub options: ConvertOptions,
}

/// 转换记录，CLI以YAML打印
#[derive(Debug, Clone, Serialize)]
pub struct ConversionRecord {
    pub title: String,
    pub author: String,
    pub language: String,
    pub conversion_stats: ConversionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub source_format: SourceFormat,
    pub output_format: OutputFormat,
}

/// 转换结果
///
/// 输出格式为MOBI或PDF时 `bytes` 是重排后的EPUB，由外部工具继续转换。
#[derive(Debug, Clone)]
pub struct ConvertOutput {
    pub bytes: Vec<u8>,
    pub record: ConversionRecord,
}

/// 转换流水线
pub struct Pipeline<'a> {
    dictionary: Option<&'a dyn ScriptDictionary>,
    guard: RequestGuard,
    warnings: Vec<String>,
}

impl<'a> Pipeline<'a> {
    /// `dictionary` 为 `None` 时所有文字转换都被跳过
    pub fn new(dictionary: Option<&'a dyn ScriptDictionary>) -> Self {
        Self {
            dictionary,
            guard: RequestGuard::unbounded(),
            warnings: Vec::new(),
        }
    }

    pub fn with_guard(mut self, guard: RequestGuard) -> Self {
        self.guard = guard;
        self
    }

    /// 附加一条在请求之前产生的提示（例如字典加载失败）
    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warnings.extend(warning);
        self
    }

    /// 执行一次转换
    pub fn convert(&self, request: &ConvertRequest<'_>) -> Result<ConvertOutput> {
        self.guard.check()?;
        let options = &request.options;
        let source_format = sniff(request.input)?;
        log::info!("输入格式 {}，输出格式 {}", source_format, options.output_format);

        let mut output = match source_format {
            SourceFormat::Epub => self.convert_epub(request.input, options)?,
            SourceFormat::Pdf => self.convert_pdf(request.input, options)?,
        };
        self.guard.check()?;

        let mut warnings = self.warnings.clone();
        warnings.append(&mut output.record.warnings);
        warnings.dedup();
        output.record.warnings = warnings;
        Ok(output)
    }

    fn convert_epub(&self, input: &[u8], options: &ConvertOptions) -> Result<ConvertOutput> {
        let epub = Epub::from_bytes(input)?;
        let rewriter = ContainerRewriter::new(self.dictionary)
            .with_policy(options.count_policy)
            .with_guard(&self.guard);
        let outcome = rewriter.rewrite(epub.container(), &options.rewrite_options())?;
        self.guard.check()?;

        let bytes = match options.output_format {
            OutputFormat::Markdown => {
                let rewritten = Epub::new(outcome.container)?;
                let source = EpubSource::from_epub(&rewritten, &self.guard)?;
                let root = OutlineBuilder::build(&source);
                log::info!("大纲: {} 个节点", root.descendant_count());
                let front_matter = options.front_matter.then(|| FrontMatter {
                    title: outcome.book_info.title.clone(),
                    author: outcome.book_info.author.clone(),
                    language: outcome.book_info.language.clone(),
                    source: SourceFormat::Epub.to_string(),
                    line_height: options.style.line_height,
                    page_count: None,
                    conversion: Some(outcome.report),
                });
                emit_markdown(&root, front_matter.as_ref())?.into_bytes()
            }
            OutputFormat::Epub | OutputFormat::Mobi | OutputFormat::Pdf => {
                outcome.container.to_bytes()?
            }
        };

        Ok(ConvertOutput {
            bytes,
            record: ConversionRecord {
                title: outcome.book_info.title,
                author: outcome.book_info.author,
                language: outcome.book_info.language,
                conversion_stats: outcome.report,
                page_count: None,
                warnings: outcome.warnings,
                source_format: SourceFormat::Epub,
                output_format: options.output_format,
            },
        })
    }

    fn convert_pdf(&self, input: &[u8], options: &ConvertOptions) -> Result<ConvertOutput> {
        let document = PdfDocument::from_bytes_with_guard(input, &self.guard)?;
        let source = PdfSource::from_document(&document);
        log::info!("PDF识别出 {} 个标题", source.heading_count());

        let mut warnings = Vec::new();
        let (blocks, report) = self.convert_blocks(source.blocks(), options, &mut warnings)?;
        let root = OutlineBuilder::build(&blocks);
        self.guard.check()?;

        let info = BookInfo {
            title: document
                .info
                .title
                .clone()
                .unwrap_or_else(|| BookInfo::UNKNOWN.to_string()),
            author: document
                .info
                .author
                .clone()
                .unwrap_or_else(|| BookInfo::UNKNOWN.to_string()),
            language: BookInfo::UNKNOWN.to_string(),
        };

        let bytes = match options.output_format {
            OutputFormat::Markdown => {
                let front_matter = options.front_matter.then(|| FrontMatter {
                    title: info.title.clone(),
                    author: info.author.clone(),
                    language: info.language.clone(),
                    source: SourceFormat::Pdf.to_string(),
                    line_height: options.style.line_height,
                    page_count: Some(document.page_count),
                    conversion: Some(report),
                });
                emit_markdown(&root, front_matter.as_ref())?.into_bytes()
            }
            OutputFormat::Epub | OutputFormat::Mobi | OutputFormat::Pdf => {
                self.emit_pdf_outline(&root, &info, options)?
            }
        };

        Ok(ConvertOutput {
            bytes,
            record: ConversionRecord {
                title: info.title,
                author: info.author,
                language: info.language,
                conversion_stats: report,
                page_count: Some(document.page_count),
                warnings,
                source_format: SourceFormat::Pdf,
                output_format: options.output_format,
            },
        })
    }

    fn emit_pdf_outline(&self, root: &OutlineNode, info: &BookInfo, options: &ConvertOptions) -> Result<Vec<u8>> {
        let mut metadata = EpubMetadata::from(info);
        if metadata.language == BookInfo::UNKNOWN {
            metadata.language = "und".to_string();
        }
        emit_epub(root, &metadata, &options.style)?.to_bytes()
    }

    /// 对PDF文本块做简繁转换或检测
    fn convert_blocks(
        &self,
        blocks: Vec<Block>,
        options: &ConvertOptions,
        warnings: &mut Vec<String>,
    ) -> Result<(Vec<Block>, ConversionReport)> {
        let Some(dictionary) = self.dictionary else {
            if options.convert_simplified {
                log::warn!("{}", NO_DICTIONARY_WARNING);
                warnings.push(NO_DICTIONARY_WARNING.to_string());
            }
            return Ok((blocks, ConversionReport::empty()));
        };

        let converter = ScriptConverter::new(dictionary, options.count_policy);
        let requested = options.convert_simplified;
        let mut report = ConversionReport::empty();
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            self.guard.check()?;
            let block = match block {
                Block::Heading { level, title } => {
                    let (converted, block_report) = converter.process(&title, requested);
                    report = report.merge(&block_report);
                    Block::heading(level, converted.unwrap_or(title))
                }
                Block::Body(text) => {
                    let (converted, block_report) = converter.process(&text, requested);
                    report = report.merge(&block_report);
                    Block::Body(converted.unwrap_or(text))
                }
            };
            out.push(block);
        }
        Ok((out, report))
    }
}
