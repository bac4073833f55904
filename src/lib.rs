pub mod calibre;
pub mod config;
pub mod emit;
pub mod epub;
pub mod error;
pub mod guard;
pub mod outline;
pub mod pdf;
pub mod pipeline;
pub mod script;

// === 核心API重新导出 ===

/// 转换流水线（主要接口）
pub use pipeline::{
    ConversionRecord, ConvertOptions, ConvertOutput, ConvertRequest, Pipeline, SourceFormat,
    load_dictionary, sniff,
};

/// 错误处理
pub use error::{ReflowError, Result, Stage};

/// 配置
pub use config::ReflowConfig;

/// 请求边界
pub use guard::{CancelToken, RequestGuard};

// === 组件 ===

/// 简繁转换
pub use script::{CharTable, ConversionReport, CountPolicy, ScriptConverter, ScriptDictionary};

/// EPUB容器与重写
pub use epub::{
    BookInfo, Container, ContainerRewriter, Epub, ReadingDirection, RewriteOptions,
    RewriteOutcome, StyleOptions,
};

/// 大纲
pub use outline::{Block, EpubSource, OutlineBuilder, OutlineNode, OutlineSource};

/// PDF
pub use pdf::{HeadingClassifier, PdfDocument, PdfSource};

/// 输出
pub use emit::{
    EpubMetadata, FrontMatter, OutputFormat, emit_epub, emit_markdown, output_file_name,
    parse_markdown,
};

/// 外部格式转换
pub use calibre::CalibreConverter;

// === 库信息 ===

/// 库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库的描述
pub const DESCRIPTION: &str = "将EPUB/PDF电子书重排为横排EPUB或层级化Markdown";

/// 快速重排一个EPUB文件
///
/// 使用内置字表和默认排版参数，返回新的EPUB字节和转换记录。
///
/// # 示例
///
/// ```no_run
/// let output = bookreflow::reflow_file("book.epub")?;
/// println!("书名: {}", output.record.title);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn reflow_file<P: AsRef<std::path::Path>>(path: P) -> Result<ConvertOutput> {
    let input = std::fs::read(path)?;
    Pipeline::new(Some(CharTable::builtin())).convert(&ConvertRequest {
        input: &input,
        options: ConvertOptions::default(),
    })
}
