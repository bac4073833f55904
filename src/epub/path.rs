//! 容器内路径工具
//!
//! EPUB中的href都是相对于引用它的文件所在目录的URL片段，
//! 这里统一处理拼接、`..` 折叠和相对路径计算。

/// 返回路径所在目录（不含结尾的 `/`），根目录下的文件返回空串
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// 把href拆成路径和片段两部分
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment).filter(|f| !f.is_empty())),
        None => (href, None),
    }
}

/// 以 `base_dir` 为基准解析href，得到容器内的规范路径
///
/// 片段部分会被丢弃；`.` 和 `..` 段会被折叠，越过根目录的 `..` 被忽略。
pub fn resolve(base_dir: &str, href: &str) -> String {
    let (path, _) = split_fragment(href);
    if path.starts_with('/') {
        return normalize(path.trim_start_matches('/'));
    }
    if base_dir.is_empty() {
        normalize(path)
    } else {
        normalize(&format!("{}/{}", base_dir, path))
    }
}

/// 折叠路径中的 `.` 与 `..`
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// 计算从文件 `from` 引用文件 `to` 时应写入的相对href
pub fn relative(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = parent_dir(from).split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    // 目标文件名本身不参与公共前缀
    let common = common.min(to_parts.len().saturating_sub(1));

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        parts.push("..");
    }
    parts.extend_from_slice(&to_parts[common..]);
    parts.join("/")
}

/// 对路径做百分号解码，解码失败时返回 `None`
pub fn percent_decode(path: &str) -> Option<String> {
    percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("OEBPS/content.opf"), "OEBPS");
        assert_eq!(parent_dir("content.opf"), "");
        assert_eq!(parent_dir("a/b/c.xhtml"), "a/b");
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("OEBPS", "Text/ch1.xhtml"), "OEBPS/Text/ch1.xhtml");
        assert_eq!(resolve("OEBPS/Text", "../Styles/a.css"), "OEBPS/Styles/a.css");
        assert_eq!(resolve("", "ch1.xhtml#sec"), "ch1.xhtml");
        assert_eq!(resolve("OEBPS", "./ch1.xhtml"), "OEBPS/ch1.xhtml");
        assert_eq!(resolve("OEBPS", "/root.xhtml"), "root.xhtml");
    }

    #[test]
    fn test_relative() {
        assert_eq!(relative("OEBPS/Text/ch1.xhtml", "OEBPS/styles/reflow.css"), "../styles/reflow.css");
        assert_eq!(relative("OEBPS/ch1.xhtml", "OEBPS/styles/reflow.css"), "styles/reflow.css");
        assert_eq!(relative("ch1.xhtml", "styles/reflow.css"), "styles/reflow.css");
        assert_eq!(relative("a/b/c.xhtml", "a/b/d.css"), "d.css");
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("ch1.xhtml#s2"), ("ch1.xhtml", Some("s2")));
        assert_eq!(split_fragment("ch1.xhtml#"), ("ch1.xhtml", None));
        assert_eq!(split_fragment("ch1.xhtml"), ("ch1.xhtml", None));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("Text/chapter%201.xhtml").as_deref(), Some("Text/chapter 1.xhtml"));
    }
}
