//! unc-bridge
//!
//! Windows 路径分类与转换：UNC 路径、网络驱动器和 SUBST 驱动器之间互相转换。
//!
//! ```no_run
//! use unc_bridge::{to_local, to_unc};
//!
//! let local = to_local(r"\\server\share\folder\file.txt")?;
//! let unc = to_unc(r"Z:\folder\file.txt")?;
//! # Ok::<(), unc_bridge::PathResolveError>(())
//! ```

pub mod logging;
pub mod path_resolver;
pub mod mapping;
pub mod validator;
pub mod config;

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

pub use config::{ResolverConfig, SourceKind, StaticMapping};
pub use mapping::{
    DriveMapping,
    MappingSnapshot,
    MappingSource,
    MappingSourceError,
    MappingTable,
    RefreshOutcome,
    TargetKind,
};
pub use path_resolver::{
    ConversionResult,
    Direction,
    NormalizedPath,
    PathClassifier,
    PathConverter,
    PathKind,
    PathNormalizer,
    PathResolveError,
    UncResolver,
};
pub use validator::{AccessCheck, PathIssue, Validator};

/// 懒加载全局解析器
static DEFAULT_RESOLVER: Lazy<RwLock<Option<Arc<UncResolver>>>> = Lazy::new(|| RwLock::new(None));

/// 用给定配置初始化（或替换）全局解析器
pub fn init_resolver(config: &ResolverConfig) -> Result<Arc<UncResolver>, PathResolveError> {
    let resolver = Arc::new(UncResolver::from_config(config)?);
    let mut guard = DEFAULT_RESOLVER.write().unwrap_or_else(|e| e.into_inner());
    *guard = Some(Arc::clone(&resolver));
    Ok(resolver)
}

/// 获取全局解析器，未初始化时使用默认配置创建
pub fn resolver() -> Arc<UncResolver> {
    if let Some(resolver) = DEFAULT_RESOLVER.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        return Arc::clone(resolver);
    }

    let mut guard = DEFAULT_RESOLVER.write().unwrap_or_else(|e| e.into_inner());
    let resolver = guard.get_or_insert_with(|| {
        let resolver = UncResolver::from_config(&ResolverConfig::default()).unwrap_or_else(|e| {
            log::warn!("[UncBridge] 默认配置初始化失败，改用默认来源: {}", e);
            UncResolver::with_source(mapping::default_source())
        });
        Arc::new(resolver)
    });
    Arc::clone(resolver)
}

/// 便捷函数：分类路径
pub fn classify(path: &str) -> PathKind {
    resolver().classify(path)
}

/// 便捷函数：规范化路径
pub fn normalize(path: &str) -> NormalizedPath {
    path_resolver::normalize(path)
}

/// 便捷函数：UNC → 驱动器路径
pub fn to_local(path: &str) -> Result<ConversionResult, PathResolveError> {
    resolver().to_local(path)
}

/// 便捷函数：驱动器路径 → UNC
pub fn to_unc(path: &str) -> Result<ConversionResult, PathResolveError> {
    resolver().to_unc(path)
}

/// 便捷函数：立即刷新全局映射表
pub fn refresh_mappings() -> RefreshOutcome {
    resolver().table().refresh()
}

/// 便捷函数：使全局映射表失效，下一次查询时刷新
pub fn invalidate_mappings() {
    resolver().table().invalidate();
}
