pub mod archive;
pub mod blocks;
pub mod container;
pub mod content;
pub mod ncx;
pub mod opf;
pub mod path;
pub mod reader;
pub mod rewriter;
pub mod style;
pub mod toc;

#[cfg(test)]
pub(crate) mod fixtures;

// 重新导出容器相关
pub use archive::{CONTAINER_PATH, Container, EPUB_MIMETYPE, MIMETYPE_PATH, Member};
pub use container::{ContainerDocument, RootFile};

// 重新导出EPUB读取器
pub use reader::{BookInfo, Chapter, Epub};

// 重新导出重写相关
pub use content::{DocumentEdit, EditedDocument, edit_document};
pub use rewriter::{ContainerRewriter, RewriteOptions, RewriteOutcome};
pub use style::{StyleOptions, apply_reflow_rules};

// 重新导出OPF相关
pub use opf::{Creator, ManifestItem, Metadata, PackageDocument, ReadingDirection, SpineItem};

// 重新导出目录相关
pub use blocks::{BlockKind, ContentBlock, extract_blocks};
pub use ncx::{NavMap, NavPoint, Ncx};
pub use toc::{TocEntry, TocNode, TocTree};
