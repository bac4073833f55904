//! 简繁字典模块
//!
//! 字典是一个只读的查表服务：给定一个字符，返回其正体写法（若有）。
//! 字典在加载后不再修改，调用方只持有它的引用。

use crate::error::{ReflowError, Result};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// 内置字表（OpenCC STCharacters 格式）
const BUILTIN_TABLE: &str = include_str!("../../data/s2t_characters.txt");

static BUILTIN: Lazy<CharTable> = Lazy::new(|| {
    let table = CharTable::from_entries(BUILTIN_TABLE);
    log::debug!("内置简繁字表已加载: {} 个字符", table.len());
    table
});

/// 简体到正体的逐字查表服务
pub trait ScriptDictionary: Send + Sync {
    /// 查询字符对应的正体字，没有映射时返回 `None`
    fn map(&self, c: char) -> Option<char>;

    /// 字符是否为字典中的源（简体）字
    fn is_source(&self, c: char) -> bool {
        self.map(c).is_some()
    }
}

/// 基于哈希表的字表实现
///
/// 加载时保证两点：
/// 1. 不存在映射到自身的条目；
/// 2. 任何映射结果都不会再作为键出现，因此转换结果是不动点。
#[derive(Debug, Clone, Default)]
pub struct CharTable {
    map: HashMap<char, char>,
}

impl CharTable {
    /// 解析 OpenCC 字表文本
    ///
    /// 每行格式为 `简<TAB>繁 [候选...]`，`#` 开头的行为注释，取第一个候选。
    /// 多字词条会被忽略。
    ///
    /// # 返回值
    /// * `Result<CharTable>` - 解析后没有任何有效条目时返回
    ///   [`ReflowError::DictionaryUnavailable`]
    pub fn parse(text: &str) -> Result<Self> {
        let table = Self::from_entries(text);
        if table.is_empty() {
            return Err(ReflowError::DictionaryUnavailable(
                "字表中没有任何有效条目".to_string(),
            ));
        }
        Ok(table)
    }

    /// 从文件加载字表
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ReflowError::DictionaryUnavailable(format!("无法读取 {}: {}", path.display(), e))
        })?;
        let table = Self::parse(&text)?;
        log::info!("已从 {} 加载简繁字表: {} 个字符", path.display(), table.len());
        Ok(table)
    }

    /// 内置字表，进程内只加载一次
    pub fn builtin() -> &'static CharTable {
        &BUILTIN
    }

    fn from_entries(text: &str) -> Self {
        let mut map = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(key), Some(candidate)) = (fields.next(), fields.next()) else {
                continue;
            };
            let (Some(source), Some(target)) = (single_char(key), single_char(candidate)) else {
                continue;
            };
            if source != target {
                map.entry(source).or_insert(target);
            }
        }

        let targets: HashSet<char> = map.values().copied().collect();
        map.retain(|source, _| !targets.contains(source));

        Self { map }
    }

    /// 字表条目数
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// 字表是否为空
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl ScriptDictionary for CharTable {
    fn map(&self, c: char) -> Option<char> {
        self.map.get(&c).copied()
    }

    fn is_source(&self, c: char) -> bool {
        self.map.contains_key(&c)
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
