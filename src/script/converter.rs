//! 逐字简繁转换器

use crate::script::dictionary::ScriptDictionary;
use crate::script::report::ConversionReport;
use serde::{Deserialize, Serialize};

/// `total_chars` 的统计口径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CountPolicy {
    /// 只统计中日韩统一表意文字（含扩展区和兼容区）
    #[default]
    #[serde(rename = "cjk")]
    CjkIdeographs,
    /// 统计全部字符
    #[serde(rename = "all")]
    AllChars,
    /// 只统计字典中作为源字出现的字符
    #[serde(rename = "dictionary")]
    DictionaryDomain,
}

impl CountPolicy {
    fn counts(self, c: char, dictionary: &dyn ScriptDictionary) -> bool {
        match self {
            CountPolicy::CjkIdeographs => is_cjk_ideograph(c),
            CountPolicy::AllChars => true,
            CountPolicy::DictionaryDomain => dictionary.is_source(c),
        }
    }
}

/// 是否为中日韩表意文字
pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2A6DF
        | 0x2A700..=0x2EBEF
        | 0x30000..=0x3134F)
}

/// 简繁转换器
///
/// 转换器只是字典引用和统计口径的组合，不持有可变状态，
/// 同一个实例可以在多个线程中同时使用。
#[derive(Clone, Copy)]
pub struct ScriptConverter<'a> {
    dictionary: &'a dyn ScriptDictionary,
    policy: CountPolicy,
}

impl<'a> ScriptConverter<'a> {
    /// 创建转换器
    pub fn new(dictionary: &'a dyn ScriptDictionary, policy: CountPolicy) -> Self {
        Self { dictionary, policy }
    }

    /// 统计口径
    pub fn policy(&self) -> CountPolicy {
        self.policy
    }

    /// 将文本逐字转换为正体并给出统计
    ///
    /// `changed_chars` 只在统计口径内的字符中计数，因此总是不大于 `total_chars`。
    pub fn convert(&self, text: &str) -> (String, ConversionReport) {
        let mut converted = String::with_capacity(text.len());
        let mut total = 0;
        let mut changed = 0;
        let mut detected = false;

        for c in text.chars() {
            let mapped = self.dictionary.map(c);
            detected |= mapped.is_some();
            let out = mapped.unwrap_or(c);

            if self.policy.counts(c, self.dictionary) {
                total += 1;
                if out != c {
                    changed += 1;
                }
            }
            converted.push(out);
        }

        let report = ConversionReport::new(total, changed, detected, changed > 0);
        (converted, report)
    }

    /// 只检测不转换
    ///
    /// 返回的报告中 `changed_chars` 为0，`conversion_performed` 为false。
    pub fn detect(&self, text: &str) -> ConversionReport {
        let mut total = 0;
        let mut detected = false;

        for c in text.chars() {
            detected |= self.dictionary.is_source(c);
            if self.policy.counts(c, self.dictionary) {
                total += 1;
            }
        }

        ConversionReport::new(total, 0, detected, false)
    }

    /// 根据是否请求转换选择 [`convert`](Self::convert) 或 [`detect`](Self::detect)
    pub fn process(&self, text: &str, requested: bool) -> (Option<String>, ConversionReport) {
        if requested {
            let (converted, report) = self.convert(text);
            (Some(converted), report)
        } else {
            (None, self.detect(text))
        }
    }
}
