//! 映射来源
//!
//! 映射表的数据来自操作系统（Win32 API，或 `net use` / `subst` 命令）。
//! 启动时选定一个实现：Windows 上用 API 来源，其他平台用空来源。

use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::table::DriveMapping;

/// 映射来源错误
#[derive(Debug, thiserror::Error)]
pub enum MappingSourceError {
    #[error("映射来源不可用: {0}")]
    Unavailable(String),

    #[error("命令 `{command}` 执行失败，退出码: {code:?}")]
    CommandFailed { command: String, code: Option<i32> },

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("查询超时（{0:?}）")]
    Timeout(Duration),

    #[error("查询线程意外退出")]
    Aborted,

    #[error("上一次查询仍在进行")]
    InFlight,
}

/// 映射来源 Trait
pub trait MappingSource: Send + Sync {
    /// 来源名称（用于日志）
    fn name(&self) -> &'static str;

    /// 查询当前所有驱动器映射
    fn query(&self) -> Result<Vec<DriveMapping>, MappingSourceError>;
}

/// 空来源：平台不支持映射查询时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMappingSource;

impl MappingSource for NullMappingSource {
    fn name(&self) -> &'static str {
        "null"
    }

    fn query(&self) -> Result<Vec<DriveMapping>, MappingSourceError> {
        Ok(Vec::new())
    }
}

/// 固定映射来源（配置文件 / 测试）
#[derive(Debug, Default)]
pub struct StaticMappingSource {
    mappings: RwLock<Vec<DriveMapping>>,
}

impl StaticMappingSource {
    pub fn new(mappings: Vec<DriveMapping>) -> Self {
        Self {
            mappings: RwLock::new(mappings),
        }
    }

    /// 替换映射列表，下次刷新时生效
    pub fn replace(&self, mappings: Vec<DriveMapping>) {
        let mut guard = self.mappings.write().unwrap_or_else(|e| e.into_inner());
        *guard = mappings;
    }
}

impl MappingSource for StaticMappingSource {
    fn name(&self) -> &'static str {
        "static"
    }

    fn query(&self) -> Result<Vec<DriveMapping>, MappingSourceError> {
        let guard = self.mappings.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }
}

/// 按平台选择默认来源
pub fn default_source() -> Arc<dyn MappingSource> {
    #[cfg(windows)]
    {
        Arc::new(super::windows::WindowsMappingSource::new())
    }
    #[cfg(not(windows))]
    {
        log::debug!("[MappingSource] 非 Windows 平台，使用空映射来源");
        Arc::new(NullMappingSource)
    }
}
