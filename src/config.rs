//! 解析器配置
//!
//! 从 TOML 文件加载，所有字段都有默认值。
//!
//! ```toml
//! mappingTtlMs = 5000
//! refreshTimeoutMs = 2000
//! caseInsensitive = true
//! source = "static"
//!
//! [[staticMappings]]
//! drive = "Z:"
//! target = '\\server\share'
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::mapping::{
    default_source,
    CommandMappingSource,
    DriveMapping,
    MappingSource,
    NullMappingSource,
    StaticMappingSource,
};
use crate::path_resolver::PathResolveError;

/// 配置目录名
const APP_DIR: &str = "unc-bridge";

/// 配置文件名
const CONFIG_FILE: &str = "config.toml";

/// 映射来源选择
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Windows 上用 Win32 API 来源，其他平台为空
    #[default]
    Auto,
    /// 强制使用 `net use` / `subst`
    Command,
    /// 只使用 `staticMappings`
    Static,
    /// 永远为空
    Disabled,
}

/// 配置文件中的一条固定映射
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticMapping {
    /// `Z` 或 `Z:`
    pub drive: String,
    pub target: String,
    #[serde(default)]
    pub persistent: bool,
    /// 是否为 SUBST 驱动器
    #[serde(default)]
    pub subst: bool,
}

impl StaticMapping {
    fn to_drive_mapping(&self) -> Result<DriveMapping, PathResolveError> {
        let drive = self.drive.trim().trim_end_matches(':');
        let mut chars = drive.chars();
        let letter = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(PathResolveError::InvalidArgument(format!(
                    "无效的驱动器: {:?}",
                    self.drive
                )))
            }
        };
        Ok(DriveMapping::new(letter, &self.target, self.subst)?.with_persistent(self.persistent))
    }
}

/// 解析器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// 映射快照 TTL（毫秒）
    pub mapping_ttl_ms: u64,

    /// 单次映射查询超时（毫秒），0 表示不限制
    pub refresh_timeout_ms: u64,

    /// 反查时 server/share 是否忽略大小写
    pub case_insensitive: bool,

    pub source: SourceKind,

    pub static_mappings: Vec<StaticMapping>,

    /// 非扩展前缀路径的最大长度
    pub max_path_length: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mapping_ttl_ms: 5_000,
            refresh_timeout_ms: 2_000,
            case_insensitive: true,
            source: SourceKind::Auto,
            static_mappings: Vec::new(),
            max_path_length: crate::validator::MAX_PATH_WINDOWS,
        }
    }
}

impl ResolverConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.mapping_ttl_ms)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        (self.refresh_timeout_ms > 0).then(|| Duration::from_millis(self.refresh_timeout_ms))
    }

    /// 默认配置文件路径
    ///
    /// - Windows: %APPDATA%\unc-bridge\config.toml
    /// - macOS:   ~/Library/Application Support/unc-bridge/config.toml
    /// - Linux:   ~/.config/unc-bridge/config.toml
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// 加载配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;

        let config: ResolverConfig = toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;

        config.validate()?;

        log::debug!(
            "[ResolverConfig] 加载配置成功: {}，固定映射 {} 条",
            path.display(),
            config.static_mappings.len()
        );
        Ok(config)
    }

    /// 文件不存在时返回默认配置
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("[ResolverConfig] 配置文件不存在，使用默认配置: {}", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// 保存配置
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content).context("写入配置文件失败")?;

        log::debug!("[ResolverConfig] 配置已保存: {}", path.display());
        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        let mappings = self.static_drive_mappings()?;

        let mut letters = HashSet::new();
        for mapping in &mappings {
            if !letters.insert(mapping.drive_letter) {
                anyhow::bail!("固定映射中驱动器重复: {}", mapping.drive());
            }
        }
        Ok(())
    }

    /// 把 `staticMappings` 转换为映射记录
    pub fn static_drive_mappings(&self) -> Result<Vec<DriveMapping>, PathResolveError> {
        self.static_mappings
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                entry
                    .to_drive_mapping()
                    .map_err(|e| PathResolveError::Config(format!("staticMappings[{}]: {}", i, e)))
            })
            .collect()
    }

    /// 按 `source` 构建映射来源
    pub fn build_source(&self) -> Result<Arc<dyn MappingSource>, PathResolveError> {
        let source: Arc<dyn MappingSource> = match self.source {
            SourceKind::Auto => default_source(),
            SourceKind::Command => Arc::new(CommandMappingSource::new()),
            SourceKind::Static => Arc::new(StaticMappingSource::new(self.static_drive_mappings()?)),
            SourceKind::Disabled => Arc::new(NullMappingSource),
        };
        log::debug!("[ResolverConfig] 使用映射来源: {}", source.name());
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(5));
        assert_eq!(config.refresh_timeout(), Some(Duration::from_secs(2)));
        assert!(config.case_insensitive);
        assert_eq!(config.source, SourceKind::Auto);
        assert_eq!(config.max_path_length, 260);
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let config = ResolverConfig {
            refresh_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.refresh_timeout(), None);
    }

    #[test]
    fn test_parse_partial_toml() {
        let content = r#"
mappingTtlMs = 100
source = "static"

[[staticMappings]]
drive = "z:"
target = '\\server\share'

[[staticMappings]]
drive = "S"
target = 'C:\work'
subst = true
"#;
        let config: ResolverConfig = toml::from_str(content).unwrap();
        assert_eq!(config.mapping_ttl_ms, 100);
        assert_eq!(config.refresh_timeout_ms, 2_000);
        assert_eq!(config.source, SourceKind::Static);

        let mappings = config.static_drive_mappings().unwrap();
        assert_eq!(mappings[0].drive_letter, 'Z');
        assert!(!mappings[0].substituted);
        assert!(mappings[1].substituted);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_drives() {
        let mut config = ResolverConfig::default();
        config.static_mappings = vec![
            StaticMapping {
                drive: "Z:".to_string(),
                target: r"\\a\b".to_string(),
                persistent: false,
                subst: false,
            },
            StaticMapping {
                drive: "z".to_string(),
                target: r"\\c\d".to_string(),
                persistent: false,
                subst: false,
            },
        ];
        assert!(config.validate().is_err());

        config.static_mappings.truncate(1);
        config.static_mappings[0].drive = "ZZ".to_string();
        assert!(matches!(
            config.static_drive_mappings(),
            Err(PathResolveError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(CONFIG_FILE);

        let mut config = ResolverConfig::default();
        config.source = SourceKind::Disabled;
        config.case_insensitive = false;
        config.save(&path).unwrap();

        let loaded = ResolverConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = ResolverConfig::load_or_default(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "mappingTtlMs = \"soon\"").unwrap();
        assert!(ResolverConfig::load(&path).is_err());
    }

    #[test]
    fn test_build_static_source() {
        let config = ResolverConfig {
            source: SourceKind::Static,
            static_mappings: vec![StaticMapping {
                drive: "Z".to_string(),
                target: r"\\server\share".to_string(),
                persistent: true,
                subst: false,
            }],
            ..Default::default()
        };
        let source = config.build_source().unwrap();
        assert_eq!(source.name(), "static");

        let mappings = source.query().unwrap();
        assert_eq!(mappings.len(), 1);
        assert!(mappings[0].is_persistent);
    }
}
