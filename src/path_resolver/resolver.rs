//! UNC 路径解析器
//!
//! 把分类、规范化、转换和校验组合在同一个映射表上

use std::sync::Arc;

use serde::Serialize;

use super::classifier::{classify_with, PathKind};
use super::converter::{prepare, to_local_with, to_unc_with, ConversionResult, Converter, Direction};
use super::normalizer::{normalize, NormalizedPath};
use crate::config::ResolverConfig;
use crate::mapping::{MappingSource, MappingTable};
use crate::validator::{PathIssue, Validator};

/// 路径解析错误
#[derive(Debug, thiserror::Error)]
pub enum PathResolveError {
    #[error("无效的参数: {0}")]
    InvalidArgument(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 路径转换器 Trait
pub trait PathConverter {
    /// UNC → 驱动器路径
    fn to_local(&self, path: &str) -> Result<ConversionResult, PathResolveError>;

    /// 驱动器路径 → UNC
    fn to_unc(&self, path: &str) -> Result<ConversionResult, PathResolveError>;
}

/// 批量转换中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub input: String,
    /// 转换结果；失败时为原始输入
    pub output: String,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// UNC 路径解析器
pub struct UncResolver {
    table: Arc<MappingTable>,
    converter: Converter,
    validator: Validator,
}

impl UncResolver {
    /// 使用给定映射表创建解析器
    pub fn new(table: Arc<MappingTable>, validator: Validator) -> Self {
        Self {
            converter: Converter::new(Arc::clone(&table)),
            table,
            validator,
        }
    }

    /// 按配置创建解析器
    pub fn from_config(config: &ResolverConfig) -> Result<Self, PathResolveError> {
        let source = config.build_source()?;
        let table = MappingTable::new(source)
            .with_ttl(config.ttl())
            .with_refresh_timeout(config.refresh_timeout())
            .with_case_insensitive(config.case_insensitive);

        log::info!(
            "[UncResolver] 初始化完成，来源: {}，TTL: {:?}",
            table.source_name(),
            table.ttl()
        );
        Ok(Self::new(Arc::new(table), Validator::new(config.max_path_length)))
    }

    /// 使用默认配置和指定来源创建解析器（用于测试和嵌入）
    pub fn with_source(source: Arc<dyn MappingSource>) -> Self {
        Self::new(Arc::new(MappingTable::new(source)), Validator::default())
    }

    pub fn table(&self) -> &Arc<MappingTable> {
        &self.table
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn classify(&self, path: &str) -> PathKind {
        classify_with(&self.table.snapshot(), &normalize(path))
    }

    pub fn normalize(&self, path: &str) -> NormalizedPath {
        normalize(path)
    }

    pub fn convert(&self, path: &str, direction: Direction) -> Result<ConversionResult, PathResolveError> {
        self.converter.convert(path, direction)
    }

    /// `prefer_unc` 为 true 时转 UNC，否则转驱动器路径
    pub fn canonicalize(&self, path: &str, prefer_unc: bool) -> Result<ConversionResult, PathResolveError> {
        self.converter.canonicalize(path, prefer_unc)
    }

    /// 批量转换，所有条目共用同一个快照
    ///
    /// 单项失败不影响其他条目，失败项保留原始输入
    pub fn batch_convert<S: AsRef<str>>(&self, paths: &[S], direction: Direction) -> Vec<BatchEntry> {
        let snapshot = self.table.snapshot();

        let entries: Vec<BatchEntry> = paths
            .iter()
            .map(|path| {
                let input = path.as_ref();
                match prepare(input) {
                    Ok(normalized) => {
                        let result = match direction {
                            Direction::ToLocal => to_local_with(&snapshot, &normalized),
                            Direction::ToUnc => to_unc_with(&snapshot, &normalized),
                        };
                        BatchEntry {
                            input: input.to_string(),
                            output: result.path,
                            changed: result.changed,
                            error: None,
                        }
                    }
                    Err(e) => BatchEntry {
                        input: input.to_string(),
                        output: input.to_string(),
                        changed: false,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect();

        log::debug!(
            "[UncResolver] 批量转换 {} 项，{} 项已转换",
            entries.len(),
            entries.iter().filter(|e| e.changed).count()
        );
        entries
    }

    /// 找一个可以访问的路径形式：先试原路径，再试转换后的形式
    pub fn find_accessible(&self, path: &str) -> Option<String> {
        if self.validator.check_accessible(path).ok {
            return Some(path.to_string());
        }

        let normalized = prepare(path).ok()?;
        let snapshot = self.table.snapshot();
        let alternate = match classify_with(&snapshot, &normalized) {
            PathKind::Unc => to_local_with(&snapshot, &normalized),
            _ => to_unc_with(&snapshot, &normalized),
        };

        if alternate.changed && self.validator.check_accessible(&alternate.path).ok {
            log::debug!("[UncResolver] {} 不可访问，改用 {}", path, alternate.path);
            return Some(alternate.path);
        }
        None
    }

    /// 检测路径潜在问题
    pub fn detect_issues(&self, path: &str) -> Vec<PathIssue> {
        self.validator.detect_issues(path, &self.table.snapshot())
    }
}

impl PathConverter for UncResolver {
    fn to_local(&self, path: &str) -> Result<ConversionResult, PathResolveError> {
        self.converter.to_local(path)
    }

    fn to_unc(&self, path: &str) -> Result<ConversionResult, PathResolveError> {
        self.converter.to_unc(path)
    }
}

impl std::fmt::Debug for UncResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UncResolver")
            .field("table", &self.table)
            .field("validator", &self.validator)
            .finish()
    }
}
