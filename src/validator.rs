//! 路径校验
//!
//! 可访问性检查和问题检测都只是参考信息，不会阻止转换。

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::mapping::{MappingSnapshot, TargetKind};
use crate::path_resolver::classifier::{classify_with, PathKind};
use crate::path_resolver::normalizer::{normalize, EXTENDED_PREFIXES};
use crate::path_resolver::unc::UncPath;
use crate::path_resolver::PathResolveError;

/// Windows MAX_PATH
pub const MAX_PATH_WINDOWS: usize = 260;

/// 带 `\\?\` 前缀时的上限
pub const MAX_PATH_EXTENDED: usize = 32_767;

/// 共享名最大长度
pub const MAX_SHARE_NAME_LEN: usize = 80;

/// server / share 名和文件名中不允许出现的字符
const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows 保留设备名，不区分大小写，带扩展名也不能用
pub const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL",
    "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9",
    "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// 清理后为空时使用的文件名
const UNNAMED: &str = "unnamed";

static DRIVE_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]:(?:\\.*)?$").expect("驱动器路径正则无效"));

static POSIX_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:/[^/]*)+/?$").expect("POSIX 路径正则无效"));

/// 可访问性检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessCheck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessCheck {
    fn ok() -> Self {
        Self { ok: true, reason: None }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// 路径潜在问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PathIssue {
    /// 超过长度上限且没有扩展前缀
    TooLong { length: usize, limit: usize },
    /// UNC 缺少 server 或 share
    MissingServerOrShare,
    InvalidServerName { server: String },
    InvalidShareName { share: String },
    /// 网络驱动器的目标不是完整的 `\\server\share`
    NetworkDriveWithoutTarget { drive: String },
    /// SUBST 目标不存在
    SubstTargetMissing { drive: String, target: String },
}

impl fmt::Display for PathIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathIssue::TooLong { length, limit } => {
                write!(f, "路径长度 {} 超过上限 {}", length, limit)
            }
            PathIssue::MissingServerOrShare => write!(f, "UNC 路径缺少服务器名或共享名"),
            PathIssue::InvalidServerName { server } => write!(f, "无效的服务器名: {}", server),
            PathIssue::InvalidShareName { share } => write!(f, "无效的共享名: {}", share),
            PathIssue::NetworkDriveWithoutTarget { drive } => {
                write!(f, "网络驱动器 {} 没有可用的 UNC 目标", drive)
            }
            PathIssue::SubstTargetMissing { drive, target } => {
                write!(f, "SUBST 驱动器 {} 指向不存在的目标: {}", drive, target)
            }
        }
    }
}

/// 路径长度信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathLength {
    pub length: usize,
    /// 去掉扩展前缀后的长度
    pub effective_length: usize,
    pub has_extended_prefix: bool,
    /// 超过给定上限（带扩展前缀时按扩展上限计算）
    pub exceeds_limit: bool,
}

/// 检查路径长度
pub fn check_path_length(path: &str, limit: usize) -> PathLength {
    let length = path.chars().count();
    let prefix = EXTENDED_PREFIXES.iter().find(|p| path.starts_with(*p));
    let effective_length = length - prefix.map_or(0, |p| p.len());

    let exceeds_limit = match prefix {
        Some(_) => length > MAX_PATH_EXTENDED,
        None => length > limit,
    };

    PathLength {
        length,
        effective_length,
        has_extended_prefix: prefix.is_some(),
        exceeds_limit,
    }
}

pub fn is_valid_server_name(server: &str) -> bool {
    if server.is_empty() || server.contains(INVALID_NAME_CHARS) {
        return false;
    }
    if server.contains(' ') {
        log::warn!("[Validator] 服务器名包含空格: '{}'", server);
    }
    true
}

pub fn is_valid_share_name(share: &str) -> bool {
    !share.is_empty()
        && !share.contains(INVALID_NAME_CHARS)
        && share.chars().count() <= MAX_SHARE_NAME_LEN
}

/// 校验 UNC 路径结构和 server / share 名
pub fn validate_unc_path(path: &str) -> Result<UncPath, PathResolveError> {
    let unc = UncPath::parse(path)
        .ok_or_else(|| PathResolveError::InvalidArgument(format!("不是有效的 UNC 路径: {}", path)))?;

    if !is_valid_server_name(&unc.server) {
        return Err(PathResolveError::InvalidArgument(format!(
            "无效的服务器名: {}",
            unc.server
        )));
    }
    if !is_valid_share_name(&unc.share) {
        return Err(PathResolveError::InvalidArgument(format!(
            "无效的共享名: {}",
            unc.share
        )));
    }
    Ok(unc)
}

/// 校验本地路径
///
/// 接受 `C:` 和 `C:\...`；`windows_only` 为 false 时也接受 `/usr/share` 这样的绝对路径
pub fn validate_local_path(path: &str, windows_only: bool) -> Result<(), PathResolveError> {
    if path.trim().is_empty() {
        return Err(PathResolveError::InvalidArgument("路径为空".to_string()));
    }
    if DRIVE_PATH.is_match(&normalize(path)) {
        return Ok(());
    }
    if windows_only {
        return Err(PathResolveError::InvalidArgument(format!(
            "不是有效的 Windows 驱动器路径: {}",
            path
        )));
    }
    if POSIX_PATH.is_match(path) {
        return Ok(());
    }
    Err(PathResolveError::InvalidArgument(format!("不是有效的本地路径: {}", path)))
}

/// 拆分主名和扩展名（最后一个 `.` 起），开头的 `.` 不算扩展名
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if !name[..i].trim_start_matches('.').is_empty() => (&name[..i], &name[i..]),
        _ => (name, ""),
    }
}

fn is_reserved_name(name: &str) -> bool {
    let (stem, _) = split_extension(name);
    RESERVED_NAMES.iter().any(|r| stem.eq_ignore_ascii_case(r))
}

/// 文件名是否可以在所有平台上使用
pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains(INVALID_NAME_CHARS) && !is_reserved_name(name)
}

/// 替换非法字符；保留设备名在主名后追加 `replacement`；结果为空时返回 `unnamed`
pub fn sanitize_filename(name: &str, replacement: &str) -> String {
    let mut sanitized = name.replace(INVALID_NAME_CHARS, replacement);

    if is_reserved_name(&sanitized) {
        let (stem, ext) = split_extension(&sanitized);
        sanitized = format!("{}{}{}", stem, replacement, ext);
    }

    if sanitized.is_empty() {
        return UNNAMED.to_string();
    }
    sanitized
}

/// 路径校验器
#[derive(Debug, Clone)]
pub struct Validator {
    max_path_length: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(MAX_PATH_WINDOWS)
    }
}

impl Validator {
    pub fn new(max_path_length: usize) -> Self {
        Self { max_path_length }
    }

    pub fn max_path_length(&self) -> usize {
        self.max_path_length
    }

    /// 尽力检查路径是否可读：文件要能读出内容，目录要能列出
    pub fn check_accessible(&self, path: &str) -> AccessCheck {
        let target = Path::new(path);

        let metadata = match fs::metadata(target) {
            Ok(metadata) => metadata,
            Err(e) => return AccessCheck::failed(format!("无法访问: {}", e)),
        };

        let read = if metadata.is_dir() {
            fs::read_dir(target).map(|_| ())
        } else {
            fs::File::open(target).and_then(|mut file| file.read(&mut [0u8; 1]).map(|_| ()))
        };

        match read {
            Ok(()) => AccessCheck::ok(),
            Err(e) => {
                log::debug!("[Validator] 读取失败 {}: {}", path, e);
                AccessCheck::failed(format!("无法读取: {}", e))
            }
        }
    }

    /// 检测路径的潜在问题
    pub fn detect_issues(&self, path: &str, snapshot: &MappingSnapshot) -> Vec<PathIssue> {
        let mut issues = Vec::new();

        let length = check_path_length(path, self.max_path_length);
        if length.exceeds_limit && !length.has_extended_prefix {
            issues.push(PathIssue::TooLong {
                length: length.length,
                limit: self.max_path_length,
            });
        }

        let normalized = normalize(path);
        match classify_with(snapshot, &normalized) {
            PathKind::Unc => match UncPath::parse(&normalized) {
                None => issues.push(PathIssue::MissingServerOrShare),
                Some(unc) => {
                    if !is_valid_server_name(&unc.server) {
                        issues.push(PathIssue::InvalidServerName { server: unc.server.clone() });
                    }
                    if !is_valid_share_name(&unc.share) {
                        issues.push(PathIssue::InvalidShareName { share: unc.share });
                    }
                }
            },
            PathKind::NetworkDrive => {
                if let Some(mapping) = normalized.drive().and_then(|(letter, _)| snapshot.lookup(letter)) {
                    if UncPath::parse(&mapping.target).is_none() {
                        issues.push(PathIssue::NetworkDriveWithoutTarget { drive: mapping.drive() });
                    }
                }
            }
            PathKind::SubstDrive => {
                if let Some(mapping) = normalized.drive().and_then(|(letter, _)| snapshot.lookup(letter)) {
                    if mapping.target_kind == TargetKind::LocalPath && !Path::new(&mapping.target).exists() {
                        issues.push(PathIssue::SubstTargetMissing {
                            drive: mapping.drive(),
                            target: mapping.target.clone(),
                        });
                    }
                }
            }
            PathKind::Local | PathKind::Unknown => {}
        }

        if !issues.is_empty() {
            log::debug!("[Validator] {} 存在 {} 个问题", path, issues.len());
        }
        issues
    }
}
