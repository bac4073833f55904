//! 容器重写
//!
//! 按固定顺序修改一个EPUB：脊柱方向、样式表、内容文档文本，最后写回OPF。
//! 每一步都在新的容器副本上进行，输入容器保持不变。

use crate::epub::archive::Container;
use crate::epub::content::{DocumentEdit, edit_document};
use crate::epub::opf::{ManifestItem, PackageDocument, add_manifest_item, set_spine_direction};
use crate::epub::path;
use crate::epub::reader::{BookInfo, locate_package};
use crate::epub::style::{StyleOptions, apply_reflow_rules};
use crate::error::{ReflowError, Result};
use crate::guard::RequestGuard;
use crate::script::{ConversionReport, CountPolicy, ScriptConverter, ScriptDictionary};

/// 注入样式表相对于OPF目录的位置
pub const INJECTED_STYLESHEET: &str = "styles/reflow.css";

const INJECTED_STYLESHEET_ID: &str = "reflow-style";

const MIN_LINE_HEIGHT: f64 = 1.0;
const MAX_LINE_HEIGHT: f64 = 3.0;

/// 重写参数
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOptions {
    pub style: StyleOptions,
    /// 是否执行简繁转换；为false时仍会检测简体字
    pub convert_script: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            style: StyleOptions::default(),
            convert_script: true,
        }
    }
}

impl RewriteOptions {
    /// 检查参数范围
    pub fn validate(&self) -> Result<()> {
        let line_height = self.style.line_height;
        if !(MIN_LINE_HEIGHT..=MAX_LINE_HEIGHT).contains(&line_height) {
            return Err(ReflowError::Config(format!(
                "行高必须在 {} 到 {} 之间，当前为 {}",
                MIN_LINE_HEIGHT, MAX_LINE_HEIGHT, line_height
            )));
        }
        if self.style.font_family.trim().is_empty() {
            return Err(ReflowError::Config("字体名称不能为空".to_string()));
        }
        Ok(())
    }
}

/// 重写结果
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub container: Container,
    /// 所有内容文档的汇总统计
    pub report: ConversionReport,
    pub book_info: BookInfo,
    /// 降级处理时的提示
    pub warnings: Vec<String>,
}

/// EPUB容器重写器
pub struct ContainerRewriter<'a> {
    dictionary: Option<&'a dyn ScriptDictionary>,
    policy: CountPolicy,
    guard: Option<&'a RequestGuard>,
}

impl<'a> ContainerRewriter<'a> {
    /// 创建重写器，`dictionary` 为 `None` 表示字典不可用，此时跳过简繁转换
    pub fn new(dictionary: Option<&'a dyn ScriptDictionary>) -> Self {
        Self {
            dictionary,
            policy: CountPolicy::default(),
            guard: None,
        }
    }

    pub fn with_policy(mut self, policy: CountPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 在每个阶段和每个成员之间检查超时与取消
    pub fn with_guard(mut self, guard: &'a RequestGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    fn checkpoint(&self) -> Result<()> {
        match self.guard {
            Some(guard) => guard.check(),
            None => Ok(()),
        }
    }

    /// 重写容器
    ///
    /// # 参数
    /// * `container` - 输入容器，不会被修改
    /// * `options` - 重写参数
    ///
    /// # 返回值
    /// * `Result<RewriteOutcome>` - 任何成员读写失败都会使整个重写失败
    pub fn rewrite(&self, container: &Container, options: &RewriteOptions) -> Result<RewriteOutcome> {
        options.validate()?;
        self.checkpoint()?;

        let package_path = locate_package(container)?;
        let original_opf = container.read_str(&package_path)?;
        let package = PackageDocument::parse_xml(&original_opf)?;
        for item in package.spine_items()? {
            let member = PackageDocument::resolve_href(&package_path, &item.href);
            if !container.contains(&member) {
                return Err(ReflowError::MissingMember(member));
            }
        }
        log::info!("已解析OPF: {}", package_path);

        let mut output = container.clone();
        let mut warnings = Vec::new();

        let mut opf = set_spine_direction(&original_opf, options.style.direction)?;
        log::info!("脊柱方向设置为 {}", options.style.direction);

        self.checkpoint()?;
        let injected = self.rewrite_stylesheets(&mut output, &package, &package_path, &mut opf, options)?;

        let converter = self.dictionary.map(|dictionary| ScriptConverter::new(dictionary, self.policy));
        if converter.is_none() && options.convert_script {
            let warning = "简繁转换字典不可用，已跳过转换".to_string();
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        let mut report = ConversionReport::empty();
        for item in package.manifest.content_documents() {
            self.checkpoint()?;
            let member = PackageDocument::resolve_href(&package_path, &item.href);
            if !container.contains(&member) {
                log::warn!("清单项 {} 指向的文件 {} 不存在，已跳过", item.id, member);
                continue;
            }

            let href = injected.as_deref().map(|css| path::relative(&member, css));
            let edit = DocumentEdit {
                converter,
                convert: options.convert_script,
                stylesheet_href: href.as_deref(),
            };
            let text = container.read_str(&member)?;
            let edited = edit_document(&member, &text, &edit)?;
            report = report.merge(&edited.report);
            if edited.modified {
                log::debug!("已修改内容文档 {}", member);
                output.put(member, edited.content.into_bytes());
            }
        }
        log::info!(
            "内容文档处理完成: 共 {} 字，转换 {} 字",
            report.total_chars(),
            report.changed_chars()
        );

        if opf != original_opf {
            output.put(package_path, opf.into_bytes());
        }

        Ok(RewriteOutcome {
            container: output,
            report,
            book_info: BookInfo::from_metadata(&package.metadata),
            warnings,
        })
    }

    /// 修改已有样式表；清单中没有可用的样式表时注入一个，返回注入的样式表路径
    fn rewrite_stylesheets(
        &self,
        output: &mut Container,
        package: &PackageDocument,
        package_path: &str,
        opf: &mut String,
        options: &RewriteOptions,
    ) -> Result<Option<String>> {
        let mut found = false;
        for item in package.manifest.stylesheets() {
            self.checkpoint()?;
            let member = PackageDocument::resolve_href(package_path, &item.href);
            if !output.contains(&member) {
                log::warn!("样式表 {} 不存在，已跳过", member);
                continue;
            }
            found = true;
            let css = output.read_str(&member)?;
            let updated = apply_reflow_rules(&css, &options.style);
            if updated != css {
                log::debug!("已更新样式表 {}", member);
                output.put(member, updated.into_bytes());
            }
        }
        if found {
            return Ok(None);
        }

        let member = PackageDocument::resolve_href(package_path, INJECTED_STYLESHEET);
        let item = ManifestItem::new(
            package.manifest.unused_id(INJECTED_STYLESHEET_ID),
            INJECTED_STYLESHEET.to_string(),
            "text/css".to_string(),
        );
        *opf = add_manifest_item(opf, &item)?;
        output.put(member.clone(), apply_reflow_rules("", &options.style).into_bytes());
        log::info!("清单中没有样式表，已注入 {}", member);
        Ok(Some(member))
    }
}
