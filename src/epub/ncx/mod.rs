//! NCX（Navigation Control file for XML）文件解析模块
//!
//! NCX是EPUB2的目录文件，EPUB3书籍中也常作为兼容目录保留。

pub mod navigation;
pub mod parser;

pub use navigation::{NavMap, NavPoint, NcxMetadata};
pub use parser::Ncx;
