//! 简繁转换统计模块
//!
//! 提供一次转换过程的不可变统计结果。

use serde::Serialize;

/// 一次文本转换的统计报告
///
/// 报告在创建后不可修改，多个报告只能通过 [`ConversionReport::merge`]
/// 合并为新的报告。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct ConversionReport {
    total_chars: usize,
    changed_chars: usize,
    simplified_detected: bool,
    conversion_performed: bool,
    change_rate: f64,
}

impl ConversionReport {
    /// 根据计数创建报告
    ///
    /// `change_rate` 由计数推导，`total_chars` 为0时定义为0。
    pub fn new(
        total_chars: usize,
        changed_chars: usize,
        simplified_detected: bool,
        conversion_performed: bool,
    ) -> Self {
        let changed_chars = changed_chars.min(total_chars);
        Self {
            total_chars,
            changed_chars,
            simplified_detected,
            conversion_performed,
            change_rate: rate(changed_chars, total_chars),
        }
    }

    /// 空报告（没有任何字符参与统计）
    pub fn empty() -> Self {
        Self::default()
    }

    /// 参与统计的字符数
    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// 转换前后不同的字符数
    pub fn changed_chars(&self) -> usize {
        self.changed_chars
    }

    /// 输入中是否含有字典中的简体字
    pub fn simplified_detected(&self) -> bool {
        self.simplified_detected
    }

    /// 是否真的执行了转换（请求了转换且至少改动了一个字符）
    pub fn conversion_performed(&self) -> bool {
        self.conversion_performed
    }

    /// 改动比例，范围 [0, 1]
    pub fn change_rate(&self) -> f64 {
        self.change_rate
    }

    /// 改动百分比，保留两位小数
    pub fn change_percent(&self) -> f64 {
        (self.change_rate * 10_000.0).round() / 100.0
    }

    /// 合并两份报告：计数相加，比例重新计算
    pub fn merge(&self, other: &ConversionReport) -> ConversionReport {
        ConversionReport::new(
            self.total_chars + other.total_chars,
            self.changed_chars + other.changed_chars,
            self.simplified_detected || other.simplified_detected,
            self.conversion_performed || other.conversion_performed,
        )
    }
}

fn rate(changed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        changed as f64 / total as f64
    }
}
