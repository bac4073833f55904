//! 转换配置模块
//!
//! 提供排版与转换参数的配置管理，支持从YAML文件加载配置。

use crate::epub::opf::ReadingDirection;
use crate::epub::rewriter::RewriteOptions;
use crate::epub::style::StyleOptions;
use crate::error::{ReflowError, Result};
use crate::script::CountPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件名
pub const DEFAULT_CONFIG_PATH: &str = "bookreflow.yaml";

/// 转换配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflowConfig {
    /// 行高
    pub line_height: f64,
    /// 首选字体
    pub font_family: String,
    /// 回退字体链
    pub fallback_fonts: Vec<String>,
    /// 阅读方向
    pub reading_direction: ReadingDirection,
    /// 是否把简体转换为正体
    pub convert_simplified: bool,
    /// `total_chars` 的统计口径
    pub count_policy: CountPolicy,
    /// OpenCC格式的字表文件，未设置时使用内置字表
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_path: Option<PathBuf>,
    /// 单次转换的超时秒数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Markdown输出是否带YAML前置元数据
    pub front_matter: bool,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ReflowConfig {
    /// 获取默认配置
    pub fn default_config() -> Self {
        let style = StyleOptions::default();
        Self {
            line_height: style.line_height,
            font_family: style.font_family,
            fallback_fonts: style.fallback_fonts,
            reading_direction: style.direction,
            convert_simplified: true,
            count_policy: CountPolicy::default(),
            dictionary_path: None,
            timeout_secs: None,
            front_matter: false,
        }
    }

    /// 从配置文件中加载
    ///
    /// # 参数
    /// * `path` - YAML配置文件路径
    ///
    /// # 返回值
    /// * `Result<Self>` - 文件无法读取、格式错误或数值越界时返回 [`ReflowError::Config`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ReflowError::Config(format!("无法读取配置文件 {}: {}", path.display(), e)))?;

        let config: Self = serde_yml::from_str(&content)
            .map_err(|e| ReflowError::Config(format!("配置文件格式错误: {}", e)))?;
        config.validate()?;
        log::debug!("已加载配置文件 {}", path.display());
        Ok(config)
    }

    /// 生成默认配置文件
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = serde_yml::to_string(&Self::default_config())
            .map_err(|e| ReflowError::Config(format!("序列化配置失败: {}", e)))?;

        let content_with_header = format!(
            "# bookreflow 配置文件\n# line_height 取值范围 1.0 - 3.0\n# reading_direction: ltr | rtl\n# count_policy: cjk | all | dictionary\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| ReflowError::Config(format!("写入配置文件失败: {}", e)))?;
        log::info!("已生成默认配置文件 {}", path.as_ref().display());
        Ok(())
    }

    /// 文件存在时加载，否则使用默认配置
    ///
    /// 文件存在但内容有误时返回错误，不会静默退回默认值。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            log::debug!("配置文件 {} 不存在，使用默认配置", path.display());
            Ok(Self::default_config())
        }
    }

    /// 检查数值范围，行高与字体的规则与重写参数相同
    pub fn validate(&self) -> Result<()> {
        self.rewrite_options().validate()?;
        if self.timeout_secs == Some(0) {
            return Err(ReflowError::Config("超时时间必须大于0".to_string()));
        }
        Ok(())
    }

    /// 排版参数
    pub fn style(&self) -> StyleOptions {
        StyleOptions {
            line_height: self.line_height,
            font_family: self.font_family.clone(),
            fallback_fonts: self.fallback_fonts.clone(),
            direction: self.reading_direction,
        }
    }

    /// EPUB重写参数
    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            style: self.style(),
            convert_script: self.convert_simplified,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
