//! 简体到正体的文字转换
//!
//! 字典服务（[`ScriptDictionary`]）负责查表，[`ScriptConverter`] 负责逐字转换和统计，
//! 统计结果由不可变的 [`ConversionReport`] 表示。

mod converter;
mod dictionary;
mod report;

pub use converter::{CountPolicy, ScriptConverter, is_cjk_ideograph};
pub use dictionary::{CharTable, ScriptDictionary};
pub use report::ConversionReport;
