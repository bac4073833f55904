//! PDF文本行的标题分级

use crate::pdf::Bookmark;
use crate::script::is_cjk_ideograph;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// 按章节编号判断的标题行最大长度（字符数）
const MAX_HEADING_CHARS: usize = 60;

/// 全大写标题行的最大长度（字符数）
const MAX_UPPERCASE_CHARS: usize = 100;

static PATTERNS: Lazy<Vec<(Regex, u32)>> = Lazy::new(|| {
    let numeral = r"[一二三四五六七八九十百千零〇两\d]+";
    vec![
        (Regex::new(&format!(r"^第{}[章卷部篇]", numeral)).expect("chapter pattern"), 1),
        (Regex::new(r"(?i)^chapter\s+(\d+|[ivxlcdm]+)\b").expect("chapter pattern"), 1),
        (Regex::new(r"(?i)^part\s+(\d+|[ivxlcdm]+)\b").expect("part pattern"), 1),
        (Regex::new(&format!(r"^第{}[節节]", numeral)).expect("section pattern"), 2),
        (Regex::new(r"^\d+\.\d+(\.\d+)*(\s+\S|[^\d\s.])").expect("section pattern"), 2),
        (Regex::new(r"^[一二三四五六七八九十]+、").expect("item pattern"), 3),
        (Regex::new(r"^\d+\.(\s+\S|[^\d\s.])").expect("item pattern"), 3),
    ]
});

/// 标题分级器
///
/// 先查书签标题，再按章节编号规则匹配，最后判断是否为短的全大写拉丁文行。
#[derive(Debug, Clone, Default)]
pub struct HeadingClassifier {
    bookmarks: HashMap<String, u32>,
}

impl HeadingClassifier {
    pub fn new(bookmarks: &[Bookmark]) -> Self {
        let mut map = HashMap::new();
        for bookmark in bookmarks {
            let key = comparable(&bookmark.title);
            if !key.is_empty() {
                map.entry(key).or_insert(bookmark.level);
            }
        }
        Self { bookmarks: map }
    }

    /// 判断一行文本的标题层级，不是标题时返回 `None`
    pub fn classify(&self, line: &str) -> Option<u32> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if let Some(level) = self.bookmarks.get(&comparable(line)) {
            return Some(*level);
        }

        let chars = line.chars().count();
        if chars <= MAX_HEADING_CHARS {
            if let Some((_, level)) = PATTERNS.iter().find(|(pattern, _)| pattern.is_match(line)) {
                return Some(*level);
            }
        }
        if chars <= MAX_UPPERCASE_CHARS && is_uppercase_latin(line) {
            return Some(1);
        }
        None
    }
}

/// 去掉空白后的文本，用于书签比较
fn comparable(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 至少两个拉丁字母、没有小写字母、不含汉字
fn is_uppercase_latin(line: &str) -> bool {
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && !line.chars().any(|c| c.is_lowercase() || is_cjk_ideograph(c))
        && line.chars().any(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_patterns() {
        let classifier = HeadingClassifier::default();
        assert_eq!(classifier.classify("第一章 开始"), Some(1));
        assert_eq!(classifier.classify("第12卷"), Some(1));
        assert_eq!(classifier.classify("Chapter 3 The Road"), Some(1));
        assert_eq!(classifier.classify("PART IV"), Some(1));
        assert_eq!(classifier.classify("第二節 方法"), Some(2));
        assert_eq!(classifier.classify("第三节"), Some(2));
        assert_eq!(classifier.classify("2.1 Background"), Some(2));
        assert_eq!(classifier.classify("一、概述"), Some(3));
        assert_eq!(classifier.classify("3. Results"), Some(3));
        assert_eq!(classifier.classify("INTRODUCTION"), Some(1));
    }

    #[test]
    fn test_body_lines() {
        let classifier = HeadingClassifier::default();
        assert_eq!(classifier.classify("这是一段普通的正文。"), None);
        assert_eq!(classifier.classify("The chapter begins here."), None);
        assert_eq!(classifier.classify("PDF格式"), None);
        assert_eq!(classifier.classify("3.14"), None);
        assert_eq!(classifier.classify("A"), None);
        let long = format!("1. {}", "很长的列表项".repeat(20));
        assert_eq!(classifier.classify(&long), None);
    }

    #[test]
    fn test_bookmarks_take_precedence() {
        let classifier = HeadingClassifier::new(&[
            Bookmark {
                level: 2,
                title: "序 言".to_string(),
            },
            Bookmark {
                level: 3,
                title: "第一章".to_string(),
            },
        ]);
        assert_eq!(classifier.classify("序言"), Some(2));
        assert_eq!(classifier.classify("第一章"), Some(3));
    }
}
