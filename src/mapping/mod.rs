//! 驱动器映射模块
//!
//! 映射表与其数据来源

pub mod command;
pub mod source;
pub mod table;
pub mod windows;

pub use command::CommandMappingSource;
#[cfg(windows)]
pub use windows::WindowsMappingSource;
pub use source::{
    default_source,
    MappingSource,
    MappingSourceError,
    NullMappingSource,
    StaticMappingSource,
};
pub use table::{
    drive_letter,
    DriveMapping,
    MappingSnapshot,
    MappingTable,
    RefreshOutcome,
    TargetKind,
    DEFAULT_REFRESH_TIMEOUT,
    DEFAULT_TTL,
};
