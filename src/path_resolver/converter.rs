//! UNC ↔ 驱动器路径转换器
//!
//! 示例（映射 Z: → \\server\share）：
//! - \\server\share\folder\file.txt → Z:\folder\file.txt
//! - Z:\folder\file.txt → \\server\share\folder\file.txt
//!
//! 转换只处理字符串和映射表快照，不访问磁盘。
//! 找不到映射不是错误，返回原路径且 `changed = false`。

use std::sync::Arc;

use serde::Serialize;

use super::classifier::{classify_with, PathKind};
use super::normalizer::{normalize, NormalizedPath};
use super::unc::strip_extended_prefix;
use super::{PathConverter, PathResolveError};
use crate::mapping::{MappingSnapshot, MappingTable};

/// SUBST 解析最多跟随的跳数
pub const MAX_SUBST_HOPS: usize = 1;

/// 转换方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    ToLocal,
    ToUnc,
}

/// 转换结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// 转换后的路径（已规范化）
    pub path: String,
    /// 输出路径的类型
    pub kind: PathKind,
    /// 与规范化后的输入是否不同
    pub changed: bool,
}

impl ConversionResult {
    fn unchanged(input: &NormalizedPath, kind: PathKind) -> Self {
        Self {
            path: input.to_string(),
            kind,
            changed: false,
        }
    }

    fn converted(input: &NormalizedPath, output: NormalizedPath, kind: PathKind) -> Self {
        Self {
            changed: output != *input,
            path: output.into_string(),
            kind,
        }
    }
}

/// 拒绝空输入，其余一律规范化
pub(crate) fn prepare(path: &str) -> Result<NormalizedPath, PathResolveError> {
    if path.trim().is_empty() {
        return Err(PathResolveError::InvalidArgument("路径为空".to_string()));
    }
    Ok(normalize(path))
}

/// 用映射目标替换驱动器字母：`Z:\a` + (Z: → \\s\sh) → `\\s\sh\a`
fn splice_drive_target(snapshot: &MappingSnapshot, path: &NormalizedPath) -> Option<NormalizedPath> {
    let (letter, rest) = path.drive()?;
    let mapping = snapshot.lookup(letter)?;
    Some(normalize(&format!("{}{}", mapping.target, rest)))
}

/// UNC → 驱动器路径
pub fn to_local_with(snapshot: &MappingSnapshot, path: &NormalizedPath) -> ConversionResult {
    let kind = classify_with(snapshot, path);
    if kind != PathKind::Unc {
        return ConversionResult::unchanged(path, kind);
    }

    let plain = strip_extended_prefix(path);
    let Some(mapping) = snapshot.reverse_match(&plain) else {
        log::debug!("[Converter] 没有覆盖 {} 的驱动器映射", path);
        return ConversionResult::unchanged(path, kind);
    };

    let rest = &plain[mapping.target.len()..];
    let local = normalize(&format!("{}{}", mapping.drive(), if rest.is_empty() { r"\" } else { rest }));
    log::debug!("[Converter] {} → {}", path, local);

    let kind = classify_with(snapshot, &local);
    ConversionResult::converted(path, local, kind)
}

/// 驱动器路径 → UNC
pub fn to_unc_with(snapshot: &MappingSnapshot, path: &NormalizedPath) -> ConversionResult {
    let kind = classify_with(snapshot, path);
    let output = match kind {
        PathKind::Unc | PathKind::Local | PathKind::Unknown => None,
        PathKind::NetworkDrive => splice_drive_target(snapshot, path),
        PathKind::SubstDrive => resolve_subst(snapshot, path),
    };

    match output {
        Some(output) => {
            log::debug!("[Converter] {} → {}", path, output);
            let kind = classify_with(snapshot, &output);
            ConversionResult::converted(path, output, kind)
        }
        None => ConversionResult::unchanged(path, kind),
    }
}

/// 展开 SUBST 驱动器，再尝试把结果转换为 UNC
///
/// 只跟随 [`MAX_SUBST_HOPS`] 跳 SUBST；结果仍是 SUBST 驱动器时（链或环）直接返回展开后的本地路径
fn resolve_subst(snapshot: &MappingSnapshot, path: &NormalizedPath) -> Option<NormalizedPath> {
    let mut resolved = path.clone();

    for _ in 0..MAX_SUBST_HOPS {
        if classify_with(snapshot, &resolved) != PathKind::SubstDrive {
            break;
        }
        resolved = splice_drive_target(snapshot, &resolved)?;
    }

    match classify_with(snapshot, &resolved) {
        PathKind::NetworkDrive => splice_drive_target(snapshot, &resolved).or(Some(resolved)),
        PathKind::SubstDrive => {
            log::debug!("[Converter] SUBST 链超过 {} 跳，停在 {}", MAX_SUBST_HOPS, resolved);
            Some(resolved)
        }
        _ => Some(resolved),
    }
}

/// 路径转换器
pub struct Converter {
    table: Arc<MappingTable>,
}

impl Converter {
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self { table }
    }

    /// 按方向转换
    pub fn convert(&self, path: &str, direction: Direction) -> Result<ConversionResult, PathResolveError> {
        match direction {
            Direction::ToLocal => self.to_local(path),
            Direction::ToUnc => self.to_unc(path),
        }
    }

    /// 规范化并倾向某一种形式：`prefer_unc` 为 true 时转 UNC，否则转驱动器路径
    pub fn canonicalize(&self, path: &str, prefer_unc: bool) -> Result<ConversionResult, PathResolveError> {
        let direction = if prefer_unc {
            Direction::ToUnc
        } else {
            Direction::ToLocal
        };
        self.convert(path, direction)
    }
}

impl PathConverter for Converter {
    fn to_local(&self, path: &str) -> Result<ConversionResult, PathResolveError> {
        let normalized = prepare(path)?;
        let snapshot = self.table.snapshot();
        Ok(to_local_with(&snapshot, &normalized))
    }

    fn to_unc(&self, path: &str) -> Result<ConversionResult, PathResolveError> {
        let normalized = prepare(path)?;
        let snapshot = self.table.snapshot();
        Ok(to_unc_with(&snapshot, &normalized))
    }
}
