//! 路径分类器
//!
//! 判断路径属于 UNC、网络驱动器、SUBST 驱动器、本地路径还是无法识别。
//! 分类总能得到结果，畸形输入归为 `Unknown`。

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::normalizer::{normalize, NormalizedPath};
use super::unc::is_unc;
use crate::mapping::{drive_letter, MappingSnapshot, MappingTable, TargetKind};

/// 路径类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PathKind {
    Local,
    Unc,
    NetworkDrive,
    SubstDrive,
    Unknown,
}

impl PathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathKind::Local => "local",
            PathKind::Unc => "unc",
            PathKind::NetworkDrive => "network",
            PathKind::SubstDrive => "subst",
            PathKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 在给定快照上分类已规范化的路径
pub fn classify_with(snapshot: &MappingSnapshot, path: &NormalizedPath) -> PathKind {
    if is_unc(path) {
        return PathKind::Unc;
    }

    let Some((letter, _)) = path.drive() else {
        return PathKind::Unknown;
    };

    match snapshot.lookup(letter) {
        None => PathKind::Local,
        Some(mapping) => match (mapping.target_kind, mapping.substituted) {
            (TargetKind::Unc, _) => PathKind::NetworkDrive,
            (TargetKind::LocalPath, true) => PathKind::SubstDrive,
            (TargetKind::LocalPath, false) => PathKind::Local,
        },
    }
}

/// 解析 `Z`、`Z:`、`Z:\dir` 形式的驱动器参数
fn parse_drive_arg(drive: &str) -> Option<char> {
    let mut chars = drive.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return drive_letter(c);
    }
    normalize(drive).drive().map(|(letter, _)| letter)
}

/// 路径分类器
pub struct PathClassifier {
    table: Arc<MappingTable>,
}

impl PathClassifier {
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self { table }
    }

    pub fn classify(&self, path: &str) -> PathKind {
        let snapshot = self.table.snapshot();
        let kind = classify_with(&snapshot, &normalize(path));
        log::trace!("[PathClassifier] {:?} → {}", path, kind);
        kind
    }

    /// 结构判断，不查询映射表
    pub fn is_unc_path(&self, path: &str) -> bool {
        is_unc(path)
    }

    pub fn is_network_drive(&self, drive: &str) -> bool {
        self.network_target(drive).is_some()
    }

    pub fn is_subst_drive(&self, drive: &str) -> bool {
        self.subst_target(drive).is_some()
    }

    /// 网络驱动器的 UNC 目标
    pub fn network_target(&self, drive: &str) -> Option<String> {
        let letter = parse_drive_arg(drive)?;
        self.table
            .lookup(letter)
            .filter(|m| m.target_kind == TargetKind::Unc)
            .map(|m| m.target)
    }

    /// SUBST 驱动器的目标
    pub fn subst_target(&self, drive: &str) -> Option<String> {
        let letter = parse_drive_arg(drive)?;
        self.table
            .lookup(letter)
            .filter(|m| m.substituted && m.target_kind == TargetKind::LocalPath)
            .map(|m| m.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{DriveMapping, StaticMappingSource};

    fn classifier() -> PathClassifier {
        let source = StaticMappingSource::new(vec![
            DriveMapping::network('Z', r"\\server\share").unwrap(),
            DriveMapping::subst('S', r"C:\work").unwrap(),
            DriveMapping::network('L', r"D:\volume").unwrap(),
        ]);
        PathClassifier::new(Arc::new(MappingTable::new(Arc::new(source))))
    }

    #[test]
    fn test_unc_paths() {
        let classifier = classifier();
        assert_eq!(classifier.classify(r"\\server\share\folder"), PathKind::Unc);
        assert_eq!(classifier.classify("//server/share"), PathKind::Unc);
        assert_eq!(classifier.classify(r"\\?\UNC\server\share\x"), PathKind::Unc);
    }

    #[test]
    fn test_drive_paths() {
        let classifier = classifier();
        assert_eq!(classifier.classify(r"C:\Users\a"), PathKind::Local);
        assert_eq!(classifier.classify(r"z:\folder"), PathKind::NetworkDrive);
        assert_eq!(classifier.classify("Z:"), PathKind::NetworkDrive);
        assert_eq!(classifier.classify(r"S:\src"), PathKind::SubstDrive);
        assert_eq!(classifier.classify(r"\\?\S:\src"), PathKind::SubstDrive);
        // 本地目标但不是 SUBST
        assert_eq!(classifier.classify(r"L:\x"), PathKind::Local);
    }

    #[test]
    fn test_unknown_inputs() {
        let classifier = classifier();
        for input in ["", "relative\\path", "Z:folder", r"\\", r"\\.\pipe\x", r"\\.\Z:\a", r"\\.\C:\x", "1:\\x", ":::"] {
            assert_eq!(classifier.classify(input), PathKind::Unknown, "input: {:?}", input);
        }
    }

    #[test]
    fn test_detector_helpers() {
        let classifier = classifier();
        assert!(classifier.is_unc_path(r"\\server\share"));
        assert!(classifier.is_network_drive("Z"));
        assert!(classifier.is_network_drive(r"z:\folder"));
        assert!(!classifier.is_network_drive("S:"));
        assert!(classifier.is_subst_drive("S:"));
        assert!(!classifier.is_subst_drive("C:"));
        assert_eq!(classifier.network_target("Z:").as_deref(), Some(r"\\server\share"));
        assert_eq!(classifier.subst_target("s").as_deref(), Some(r"C:\work"));
        assert_eq!(classifier.network_target("not a drive"), None);
    }
}
