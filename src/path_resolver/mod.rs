//! 路径解析模块
//!
//! 在 UNC 路径（`\\server\share\...`）和驱动器路径（`Z:\...`）之间分类、规范化和转换

pub mod classifier;
pub mod converter;
pub mod normalizer;
pub mod resolver;
pub mod unc;


pub use classifier::{classify_with, PathClassifier, PathKind};
pub use converter::{to_local_with, to_unc_with, ConversionResult, Converter, Direction, MAX_SUBST_HOPS};
pub use normalizer::{normalize, NormalizedPath, PathNormalizer};
pub use resolver::{BatchEntry, PathConverter, PathResolveError, UncResolver};
pub use unc::{apply_long_path_prefix, build_unc_path, is_unc, strip_extended_prefix, UncPath};

/// 重新导出常用类型
pub type Result<T> = std::result::Result<T, PathResolveError>;
