//! 样式表修改
//!
//! 用 `cssparser` 把样式表切分成规则，只改写受管理的选择器：
//! 已有规则中的同名声明被覆盖，缺少的声明追加在规则末尾，缺少的规则追加在样式表末尾。
//! 其他规则、注释和 @ 规则按原文保留。

use crate::epub::opf::ReadingDirection;
use cssparser::{ParseError, Parser, ParserInput, SourcePosition, Token};
use serde::{Deserialize, Serialize};

type CssParseError<'i> = ParseError<'i, ()>;

/// 不加引号的通用字体族
const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
];

/// 排版参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleOptions {
    pub line_height: f64,
    pub font_family: String,
    pub fallback_fonts: Vec<String>,
    pub direction: ReadingDirection,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            line_height: 1.6,
            font_family: "微軟正黑體".to_string(),
            fallback_fonts: vec![
                "Microsoft JhengHei".to_string(),
                "PingFang TC".to_string(),
                "Helvetica Neue".to_string(),
                "Arial".to_string(),
                "sans-serif".to_string(),
            ],
            direction: ReadingDirection::Ltr,
        }
    }
}

impl StyleOptions {
    /// `font-family` 的值：首选字体加回退链，重复项只保留第一次出现
    pub fn font_stack(&self) -> String {
        let mut families: Vec<&str> = Vec::new();
        for family in std::iter::once(self.font_family.as_str())
            .chain(self.fallback_fonts.iter().map(String::as_str))
        {
            let family = family.trim();
            if !family.is_empty() && !families.contains(&family) {
                families.push(family);
            }
        }
        families
            .into_iter()
            .map(quote_family)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn quote_family(family: &str) -> String {
    let is_ident = family
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && family.starts_with(|c: char| c.is_ascii_alphabetic());
    if GENERIC_FAMILIES.contains(&family) || is_ident {
        family.to_string()
    } else {
        format!("\"{}\"", family.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// 一条受管理的规则
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedRule {
    /// 规范化后的选择器文本
    pub selector: &'static str,
    pub declarations: Vec<(&'static str, String)>,
}

/// 按排版参数生成受管理的规则
pub fn managed_rules(options: &StyleOptions) -> Vec<ManagedRule> {
    let direction = options.direction.as_str().to_string();
    let align = options.direction.text_align().to_string();
    let line_height = format!("{}", options.line_height);

    vec![
        ManagedRule {
            selector: "html, body",
            declarations: vec![
                ("writing-mode", "horizontal-tb".to_string()),
                ("direction", direction.clone()),
                ("text-orientation", "mixed".to_string()),
                ("line-height", line_height.clone()),
            ],
        },
        ManagedRule {
            selector: "*",
            declarations: vec![
                ("font-family", options.font_stack()),
                ("line-height", line_height.clone()),
            ],
        },
        ManagedRule {
            selector: "p, div, span, h1, h2, h3, h4, h5, h6",
            declarations: vec![
                ("writing-mode", "horizontal-tb".to_string()),
                ("direction", direction.clone()),
                ("text-align", align.clone()),
                ("line-height", line_height),
            ],
        },
        ManagedRule {
            selector: "img",
            declarations: vec![
                ("max-width", "100%".to_string()),
                ("height", "auto".to_string()),
            ],
        },
        ManagedRule {
            selector: "table",
            declarations: vec![("direction", direction.clone())],
        },
        ManagedRule {
            selector: "ul, ol",
            declarations: vec![("direction", direction.clone()), ("text-align", align)],
        },
        ManagedRule {
            selector: ".vertical, .vertical-rl, .vertical-lr",
            declarations: vec![
                ("writing-mode", "horizontal-tb".to_string()),
                ("direction", direction),
            ],
        },
    ]
}

/// 样式表中的一段
#[derive(Debug, Clone, PartialEq)]
enum Segment<'a> {
    /// 规则之间的原文（空白、注释、以分号结尾的 @ 语句）
    Raw(&'a str),
    Rule {
        prelude: &'a str,
        body: &'a str,
        raw: &'a str,
    },
}

fn split_rules(css: &str) -> Vec<Segment<'_>> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut segments = Vec::new();

    let mut pending = parser.position();
    let mut rule_start: Option<SourcePosition> = None;

    loop {
        let before = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::WhiteSpace(_) | Token::Comment(_) => {}
            Token::Semicolon => rule_start = None,
            Token::CurlyBracketBlock => {
                let start = rule_start.take().unwrap_or(before);
                if start != pending {
                    segments.push(Segment::Raw(parser.slice(pending..start)));
                }
                let prelude = parser.slice(start..before);
                let body = parser
                    .parse_nested_block(|p| {
                        let inner = p.position();
                        while p.next_including_whitespace_and_comments().is_ok() {}
                        Ok::<_, CssParseError>(p.slice_from(inner))
                    })
                    .unwrap_or_default();
                segments.push(Segment::Rule {
                    prelude,
                    body,
                    raw: parser.slice_from(start),
                });
                pending = parser.position();
            }
            _ => {
                if rule_start.is_none() {
                    rule_start = Some(before);
                }
            }
        }
    }

    let rest = parser.slice_from(pending);
    if !rest.is_empty() {
        segments.push(Segment::Raw(rest));
    }
    segments
}

/// 把规则体拆成 (属性, 值) 列表，注释被丢弃
fn parse_declarations(body: &str) -> Vec<(String, String)> {
    let mut input = ParserInput::new(body);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();
    let mut current = String::new();
    let mut cursor = parser.position();

    loop {
        let before = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Comment(_) => {
                current.push_str(parser.slice(cursor..before));
                cursor = parser.position();
            }
            Token::Semicolon => {
                current.push_str(parser.slice(cursor..before));
                cursor = parser.position();
                finish(&mut current, &mut declarations);
            }
            _ => {}
        }
    }
    current.push_str(parser.slice_from(cursor));
    finish(&mut current, &mut declarations);
    declarations
}

fn finish(text: &mut String, declarations: &mut Vec<(String, String)>) {
    if let Some((name, value)) = text.split_once(':') {
        let name = name.trim();
        let value = value.trim();
        if !name.is_empty() && !value.is_empty() {
            declarations.push((name.to_string(), value.to_string()));
        }
    }
    text.clear();
}

/// 规范化选择器文本：逗号两侧统一为 `, `，连续空白合并
pub fn normalize_selector(selector: &str) -> String {
    selector
        .split(',')
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_rule(prelude: &str, declarations: &[(String, String)]) -> String {
    let mut rule = String::new();
    rule.push_str(prelude);
    rule.push_str(" {\n");
    for (name, value) in declarations {
        rule.push_str("    ");
        rule.push_str(name);
        rule.push_str(": ");
        rule.push_str(value);
        rule.push_str(";\n");
    }
    rule.push('}');
    rule
}

fn upsert(existing: Vec<(String, String)>, managed: &ManagedRule) -> Vec<(String, String)> {
    let mut declarations = existing;
    for (name, value) in &managed.declarations {
        let value = format!("{} !important", value);
        match declarations
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => declarations.push((name.to_string(), value)),
        }
    }
    declarations
}

/// 把受管理的规则写入样式表
///
/// 对输出再次调用（参数相同）得到完全相同的文本。
pub fn apply_reflow_rules(css: &str, options: &StyleOptions) -> String {
    let rules = managed_rules(options);
    let mut applied = vec![false; rules.len()];
    let mut output = String::with_capacity(css.len() + 1024);

    for segment in split_rules(css) {
        match segment {
            Segment::Raw(text) => output.push_str(text),
            Segment::Rule { prelude, body, raw } => {
                let selector = normalize_selector(prelude);
                match rules.iter().position(|rule| rule.selector == selector) {
                    Some(idx) => {
                        applied[idx] = true;
                        let declarations = upsert(parse_declarations(body), &rules[idx]);
                        output.push_str(&render_rule(prelude.trim(), &declarations));
                    }
                    None => output.push_str(raw),
                }
            }
        }
    }

    for (rule, _) in rules.iter().zip(&applied).filter(|(_, applied)| !**applied) {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&render_rule(rule.selector, &upsert(Vec::new(), rule)));
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(line_height: f64, direction: ReadingDirection) -> StyleOptions {
        StyleOptions {
            line_height,
            direction,
            ..StyleOptions::default()
        }
    }

    #[test]
    fn test_empty_stylesheet_gets_all_rules() {
        let css = apply_reflow_rules("", &options(1.8, ReadingDirection::Ltr));
        assert!(css.starts_with("html, body {\n"));
        assert!(css.contains("line-height: 1.8 !important;"));
        assert!(css.contains("writing-mode: horizontal-tb !important;"));
        assert!(css.contains("direction: ltr !important;"));
        assert!(css.contains("text-align: left !important;"));
        assert!(css.contains(
            r#"font-family: "微軟正黑體", "Microsoft JhengHei", "PingFang TC", "Helvetica Neue", Arial, sans-serif !important;"#
        ));
        assert!(css.contains(".vertical, .vertical-rl, .vertical-lr {"));
    }

    #[test]
    fn test_existing_rule_is_upserted() {
        let css = "html,body { color: red; direction: rtl }\np.note { color: blue; }\n";
        let out = apply_reflow_rules(css, &options(2.0, ReadingDirection::Ltr));

        assert!(out.starts_with("html,body {\n    color: red;\n    direction: ltr !important;\n"));
        assert!(out.contains("    line-height: 2 !important;\n"));
        assert!(out.contains("\np.note { color: blue; }\n"));
        assert_eq!(out.matches("html").count(), 1);
        assert!(!out.contains("rtl"));
    }

    #[test]
    fn test_unrelated_content_preserved() {
        let css = "@charset \"utf-8\";\n/* 作者样式 */\n@media screen { p { color: red } }\n.note{margin:0}";
        let out = apply_reflow_rules(css, &StyleOptions::default());
        assert!(out.starts_with(css));
        assert_eq!(out.as_bytes()[css.len()], b'\n');
    }

    #[test]
    fn test_apply_is_idempotent() {
        let css = "body { margin: 0; }\n* { font-family: serif; /* 旧字体 */ }\nimg{width:50%}";
        let opts = options(1.8, ReadingDirection::Rtl);
        let once = apply_reflow_rules(css, &opts);
        let twice = apply_reflow_rules(&once, &opts);
        assert_eq!(once, twice);
        assert!(once.contains("text-align: right !important;"));
    }

    #[test]
    fn test_declarations_with_functions() {
        let declarations =
            parse_declarations(" background: url(\"a;b.png\") ; color: rgb(1, 2, 3); /* x */ margin:0");
        assert_eq!(
            declarations,
            vec![
                ("background".to_string(), "url(\"a;b.png\")".to_string()),
                ("color".to_string(), "rgb(1, 2, 3)".to_string()),
                ("margin".to_string(), "0".to_string()),
            ]
        );
    }

    #[test]
    fn test_normalize_selector() {
        assert_eq!(normalize_selector("  html ,\n body "), "html, body");
        assert_eq!(normalize_selector("ul,ol"), "ul, ol");
    }

    #[test]
    fn test_font_stack_quoting_and_dedup() {
        let opts = StyleOptions {
            font_family: "Arial".to_string(),
            fallback_fonts: vec!["Arial".to_string(), "Noto Sans \"TC\"".to_string(), "serif".to_string()],
            ..StyleOptions::default()
        };
        assert_eq!(opts.font_stack(), r#"Arial, "Noto Sans \"TC\"", serif"#);
    }
}
