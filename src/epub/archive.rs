//! EPUB容器的内存表示
//!
//! 容器是有序的成员列表，每个成员是路径加不可变的字节数据。
//! 修改某个成员只替换它自己的数据，其余成员在各阶段之间共享同一份字节。

use crate::epub::path;
use crate::error::{ReflowError, Result};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// mimetype成员的路径
pub const MIMETYPE_PATH: &str = "mimetype";
/// EPUB的mimetype内容
pub const EPUB_MIMETYPE: &str = "application/epub+zip";
/// container.xml的路径
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// 解压成员时预分配的上限，超出部分由读取过程按需扩容
const MAX_PREALLOC: u64 = 1 << 20;

/// 容器中的一个成员
#[derive(Debug, Clone)]
pub struct Member {
    path: String,
    data: Arc<[u8]>,
}

impl Member {
    /// 成员路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 成员数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// 内存中的EPUB容器
#[derive(Debug, Clone, Default)]
pub struct Container {
    members: Vec<Member>,
    index: HashMap<String, usize>,
}

impl Container {
    /// 创建空容器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从EPUB字节解码容器并校验mimetype
    ///
    /// # 参数
    /// * `bytes` - 完整的EPUB文件内容
    ///
    /// # 返回值
    /// * `Result<Container>` - 不是zip归档时返回 [`ReflowError::UnsupportedContainer`]，
    ///   mimetype缺失或不正确时返回对应的错误
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
            ReflowError::UnsupportedContainer(format!("无法作为zip归档打开: {}", e))
        })?;

        let mut container = Container::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            if container.index.contains_key(&name) {
                log::warn!("容器中存在重复的成员 {}，只保留第一个", name);
                continue;
            }
            let mut data = Vec::with_capacity(file.size().min(MAX_PREALLOC) as usize);
            file.read_to_end(&mut data)?;
            container.put(name, data);
        }

        container.validate()?;
        log::debug!("已解码EPUB容器: {} 个成员", container.len());
        Ok(container)
    }

    /// 从文件读取并解码容器
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    fn validate(&self) -> Result<()> {
        let data = self.get(MIMETYPE_PATH).ok_or(ReflowError::MissingMimetype)?;
        let found = String::from_utf8_lossy(data);
        let found = found.trim();
        if found != EPUB_MIMETYPE {
            return Err(ReflowError::InvalidMimetype {
                expected: EPUB_MIMETYPE.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    /// 成员数量
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// 容器是否为空
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// 按原始顺序遍历成员
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    /// 是否存在指定路径的成员，与 [`Container::get`] 一样接受百分号编码的路径
    pub fn contains(&self, path: &str) -> bool {
        self.locate(path).is_some()
    }

    /// 查找成员，找不到时再按百分号解码后的路径查找
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.locate(path).map(|idx| self.members[idx].data())
    }

    /// 读取成员字节，找不到时返回 [`ReflowError::MissingMember`]
    pub fn read(&self, path: &str) -> Result<&[u8]> {
        self.get(path)
            .ok_or_else(|| ReflowError::MissingMember(path.to_string()))
    }

    /// 以UTF-8文本读取成员，去掉开头的BOM
    pub fn read_str(&self, path: &str) -> Result<String> {
        let data = self.read(path)?;
        let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
        String::from_utf8(data.to_vec()).map_err(|e| ReflowError::ContentDocument {
            path: path.to_string(),
            reason: format!("不是有效的UTF-8文本: {}", e),
        })
    }

    /// 写入成员：已存在则原位替换，否则追加到末尾
    pub fn put<S: Into<String>, D: Into<Arc<[u8]>>>(&mut self, path: S, data: D) {
        let path = path.into();
        let data = data.into();
        if let Some(idx) = self.locate(&path) {
            self.members[idx].data = data;
        } else {
            self.index.insert(path.clone(), self.members.len());
            self.members.push(Member { path, data });
        }
    }

    fn locate(&self, path: &str) -> Option<usize> {
        if let Some(&idx) = self.index.get(path) {
            return Some(idx);
        }
        let decoded = path::percent_decode(path)?;
        self.index.get(&decoded).copied()
    }

    /// 序列化为EPUB字节
    ///
    /// mimetype总是第一个成员且不压缩，其余成员按原顺序以Deflate压缩。
    /// 所有成员使用固定的时间戳，相同的容器总是得到相同的字节。
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default());
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        let mimetype = self.get(MIMETYPE_PATH).unwrap_or(EPUB_MIMETYPE.as_bytes());
        zip.start_file(MIMETYPE_PATH, stored)?;
        zip.write_all(mimetype)?;

        for member in self.members.iter().filter(|m| m.path != MIMETYPE_PATH) {
            zip.start_file(member.path.as_str(), deflated)?;
            zip.write_all(&member.data)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}
