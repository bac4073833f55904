//! 大纲构建
//!
//! 把有序的标题/正文块整理成一棵层级树，来源可以是EPUB（目录或标题标记）或PDF。

mod builder;
mod epub_source;
mod node;

pub use builder::{Block, OutlineBuilder, OutlineSource};
pub use epub_source::{EpubSource, SourceDocument};
pub use node::OutlineNode;
