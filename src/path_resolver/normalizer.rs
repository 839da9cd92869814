//! 路径规范化
//!
//! 统一分隔符、折叠重复分隔符、大写驱动器字母、去掉末尾分隔符。
//! 纯字符串处理，不访问文件系统，也不查询映射表。
//!
//! 示例：
//! - c:/Users//me/ → C:\Users\me
//! - //server/share/dir/ → \\server\share\dir
//! - \\?\unc\server\share → \\?\unc\server\share（扩展前缀原样保留）

use std::fmt;
use std::ops::Deref;

/// 规范分隔符
pub const SEPARATOR: char = '\\';

/// 扩展长度前缀 `\\?\` 与设备前缀 `\\.\`
pub(crate) const EXTENDED_PREFIXES: [&str; 2] = [r"\\?\", r"\\.\"];

/// UNC 前缀
pub(crate) const UNC_PREFIX: &str = r"\\";

/// 规范化后的路径
///
/// 只能由 [`normalize`] 生成：
/// - 只使用反斜杠分隔符
/// - 除 UNC / 扩展前缀外没有连续分隔符
/// - 除根路径外没有末尾分隔符
/// - 驱动器字母为大写
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// 解析驱动器形式的路径（`Z:`、`Z:\dir`、`\\?\Z:\dir`）
    ///
    /// 返回大写驱动器字母与字母之后的剩余部分（空串或以 `\` 开头）
    pub fn drive(&self) -> Option<(char, &str)> {
        split_drive(&self.0)
    }
}

impl Deref for NormalizedPath {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<NormalizedPath> for String {
    fn from(path: NormalizedPath) -> Self {
        path.0
    }
}

/// 路径规范化器
pub struct PathNormalizer;

impl PathNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, path: &str) -> NormalizedPath {
        normalize(path)
    }
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// 规范化路径，幂等：`normalize(normalize(p)) == normalize(p)`
pub fn normalize(path: &str) -> NormalizedPath {
    // 步骤 1: 统一分隔符并折叠重复分隔符
    let collapsed = collapse_separators(&path.replace('/', "\\"));

    // 步骤 2: 只大写驱动器字母
    let upper = uppercase_drive(collapsed);

    // 步骤 3: 去掉末尾的单个分隔符（根路径除外）
    NormalizedPath(strip_trailing_separator(upper))
}

/// 拆分前缀：扩展前缀、UNC 前缀或无前缀
pub(crate) fn split_prefix(path: &str) -> (&str, &str) {
    for prefix in EXTENDED_PREFIXES {
        if let Some(rest) = path.strip_prefix(prefix) {
            return (prefix, rest);
        }
    }
    match path.strip_prefix(UNC_PREFIX) {
        Some(rest) => (UNC_PREFIX, rest),
        None => ("", path),
    }
}

fn collapse_separators(path: &str) -> String {
    let (prefix, body) = split_prefix(path);
    let body = if prefix.is_empty() {
        body
    } else {
        body.trim_start_matches(SEPARATOR)
    };

    let mut out = String::with_capacity(path.len());
    out.push_str(prefix);

    let mut prev_sep = false;
    for c in body.chars() {
        let is_sep = c == SEPARATOR;
        if is_sep && prev_sep {
            continue;
        }
        prev_sep = is_sep;
        out.push(c);
    }
    out
}

fn uppercase_drive(mut path: String) -> String {
    let (prefix, body) = split_prefix(&path);
    // \\c:\... 中的 c: 是服务器名，不是驱动器
    if prefix == UNC_PREFIX || !starts_with_drive(body) {
        return path;
    }
    let idx = prefix.len();
    path[idx..idx + 1].make_ascii_uppercase();
    path
}

fn strip_trailing_separator(mut path: String) -> String {
    if path.ends_with(SEPARATOR) && !is_root(&path) {
        path.pop();
    }
    path
}

/// 根路径：`\`、`C:\`、`\\`、`\\?\`、`\\?\C:\`
fn is_root(path: &str) -> bool {
    let (prefix, body) = split_prefix(path);
    if body.is_empty() {
        return true;
    }
    if prefix.is_empty() && body == "\\" {
        return true;
    }
    prefix != UNC_PREFIX && body.len() == 3 && starts_with_drive(body) && body.ends_with(SEPARATOR)
}

/// 是否以 `X:` 开头（X 为 ASCII 字母）
pub(crate) fn starts_with_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// 从（已规范化的）路径中拆出驱动器字母和其后部分
///
/// `Z:foo` 这类驱动器相对路径不算驱动器形式；只接受无前缀或 `\\?\` 前缀，
/// `\\.\Z:` 设备路径不参与映射
pub(crate) fn split_drive(path: &str) -> Option<(char, &str)> {
    let (prefix, body) = split_prefix(path);
    if !(prefix.is_empty() || prefix == EXTENDED_PREFIXES[0]) || !starts_with_drive(body) {
        return None;
    }
    let rest = &body[2..];
    if !rest.is_empty() && !rest.starts_with(SEPARATOR) {
        return None;
    }
    let letter = (body.as_bytes()[0] as char).to_ascii_uppercase();
    Some((letter, rest))
}
