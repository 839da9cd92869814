//! UNC 路径工具
//!
//! 解析 / 拼接 `\\server\share\rest`，处理 `\\?\UNC\` 扩展前缀

use std::fmt;

use super::normalizer::{normalize, split_prefix, SEPARATOR, UNC_PREFIX};

/// 扩展长度 UNC 前缀（去掉 `\\?\` 之后的部分）
const EXTENDED_UNC_MARKER: &str = r"UNC\";

/// 拆分后的 UNC 路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncPath {
    pub server: String,
    pub share: String,
    /// share 之后的相对部分，不带前导分隔符，可能为空
    pub rest: String,
}

impl UncPath {
    /// 解析 UNC 路径，接受普通形式和 `\\?\UNC\` 扩展形式
    ///
    /// 缺少 server 或 share 时返回 None
    pub fn parse(path: &str) -> Option<Self> {
        let plain = strip_extended_prefix(&normalize(path));
        let body = plain.strip_prefix(UNC_PREFIX)?;

        let mut parts = body.splitn(3, SEPARATOR);
        let server = parts.next().filter(|s| !s.is_empty())?;
        let share = parts.next().filter(|s| !s.is_empty())?;
        let rest = parts.next().unwrap_or("");

        Some(Self {
            server: server.to_string(),
            share: share.to_string(),
            rest: rest.to_string(),
        })
    }

    /// `\\server\share` 部分
    pub fn root(&self) -> String {
        build_unc_path(&self.server, &self.share, "")
    }
}

impl fmt::Display for UncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build_unc_path(&self.server, &self.share, &self.rest))
    }
}

/// 拼接 UNC 路径
pub fn build_unc_path(server: &str, share: &str, rest: &str) -> String {
    let base = format!(r"\\{}\{}", server, share);
    let rest = rest.trim_start_matches(['\\', '/']);
    if rest.is_empty() {
        base
    } else {
        format!(r"{}\{}", base, rest)
    }
}

/// 去掉 `\\?\` 扩展前缀
///
/// - `\\?\UNC\server\share` → `\\server\share`
/// - `\\?\C:\dir` → `C:\dir`
/// - 其他路径原样返回（包括 `\\.\` 设备路径）
pub fn strip_extended_prefix(path: &str) -> String {
    let Some(body) = path.strip_prefix(r"\\?\") else {
        return path.to_string();
    };
    if let Some(marker) = body.get(..EXTENDED_UNC_MARKER.len()) {
        if marker.eq_ignore_ascii_case(EXTENDED_UNC_MARKER) {
            return format!("{}{}", UNC_PREFIX, &body[EXTENDED_UNC_MARKER.len()..]);
        }
    }
    body.to_string()
}

/// 结构上是否为 UNC 路径（不查询映射表）
pub fn is_unc(path: &str) -> bool {
    let plain = strip_extended_prefix(&normalize(path));
    match split_prefix(&plain) {
        (UNC_PREFIX, body) => !body.is_empty(),
        _ => false,
    }
}

/// 为超长路径加上 `\\?\` 前缀；UNC 路径使用 `\\?\UNC\`
pub fn apply_long_path_prefix(path: &str) -> String {
    let normalized = normalize(path);
    match split_prefix(&normalized) {
        (UNC_PREFIX, body) => format!(r"\\?\{}{}", EXTENDED_UNC_MARKER, body),
        ("", _) => format!(r"\\?\{}", normalized),
        // 已带扩展前缀
        _ => normalized.into_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_path() {
        let unc = UncPath::parse(r"\\server\share\folder\file.txt").unwrap();
        assert_eq!(unc.server, "server");
        assert_eq!(unc.share, "share");
        assert_eq!(unc.rest, r"folder\file.txt");
        assert_eq!(unc.root(), r"\\server\share");
    }

    #[test]
    fn test_parse_forward_slashes_and_extended() {
        let unc = UncPath::parse("//srv/data/").unwrap();
        assert_eq!((unc.server.as_str(), unc.share.as_str(), unc.rest.as_str()), ("srv", "data", ""));

        let unc = UncPath::parse(r"\\?\unc\srv\data\x").unwrap();
        assert_eq!(unc.to_string(), r"\\srv\data\x");
    }

    #[test]
    fn test_parse_rejects_incomplete() {
        assert!(UncPath::parse(r"\\server").is_none());
        assert!(UncPath::parse(r"\\").is_none());
        assert!(UncPath::parse(r"C:\share").is_none());
    }

    #[test]
    fn test_build_unc_path() {
        assert_eq!(build_unc_path("s", "sh", ""), r"\\s\sh");
        assert_eq!(build_unc_path("s", "sh", r"\a\b"), r"\\s\sh\a\b");
        assert_eq!(build_unc_path("s", "sh", "/a"), r"\\s\sh\a");
    }

    #[test]
    fn test_strip_extended_prefix() {
        assert_eq!(strip_extended_prefix(r"\\?\UNC\s\sh\x"), r"\\s\sh\x");
        assert_eq!(strip_extended_prefix(r"\\?\C:\x"), r"C:\x");
        assert_eq!(strip_extended_prefix(r"\\.\pipe\x"), r"\\.\pipe\x");
        assert_eq!(strip_extended_prefix(r"\\s\sh"), r"\\s\sh");
    }

    #[test]
    fn test_is_unc() {
        assert!(is_unc(r"\\server\share\folder"));
        assert!(is_unc(r"\\?\UNC\server\share"));
        assert!(!is_unc(r"\\"));
        assert!(!is_unc(r"\\?\C:\x"));
        assert!(!is_unc(r"C:\x"));
    }

    #[test]
    fn test_apply_long_path_prefix() {
        assert_eq!(apply_long_path_prefix(r"C:\a"), r"\\?\C:\a");
        assert_eq!(apply_long_path_prefix(r"\\s\sh\a"), r"\\?\UNC\s\sh\a");
        assert_eq!(apply_long_path_prefix(r"\\?\C:\a"), r"\\?\C:\a");
    }
}
