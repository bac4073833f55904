//! OPF（Open Packaging Format）包文档模块
//!
//! 提供包文档的解析（元数据、清单、脊柱）以及对包文档的流式修改。

mod edit;
mod manifest;
mod metadata;
mod parser;
mod spine;

pub use edit::{add_manifest_item, set_spine_direction};
pub use manifest::{Manifest, ManifestItem};
pub use metadata::{Creator, DcElement, MetaValue, Metadata};
pub(crate) use parser::attributes_of;
pub use parser::PackageDocument;
pub use spine::{ReadingDirection, Spine, SpineItem};
