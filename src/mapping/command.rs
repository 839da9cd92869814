//! 基于系统命令的映射来源
//!
//! 解析 `net use`（网络驱动器）与 `subst`（替换驱动器）的输出。
//!
//! `net use` 输出示例：
//! ```text
//! Status       Local     Remote                    Network
//! -------------------------------------------------------------------------------
//! OK           Z:        \\server\share            Microsoft Windows Network
//! Unavailable  Y:        \\nas\backup              Microsoft Windows Network
//! ```
//!
//! 状态列随系统语言变化（`Getrennt`、`Non disponible`...），解析时只看列的位置。
//! Windows 上默认使用 [`super::windows`] 中的 API 来源，这里是备用实现。
//!
//! `subst` 输出示例：
//! ```text
//! S:\: => C:\work\src
//! T:\: => UNC\server\share
//! ```

use std::collections::HashSet;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;

use super::source::{MappingSource, MappingSourceError};
use super::table::DriveMapping;

static NET_USE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:(\S.*?)[ \t]+)?([A-Za-z]):[ \t]+(\\\\\S+(?: \S+)*)",
    )
    .expect("net use 正则无效")
});

static SUBST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*([A-Za-z]):\\: => (.+?)[ \t\r]*$").expect("subst 正则无效")
});

/// 运行 `net use` 和 `subst` 的映射来源
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandMappingSource;

impl CommandMappingSource {
    pub fn new() -> Self {
        Self
    }

    fn run(program: &str, args: &[&str]) -> Result<String, MappingSourceError> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            return Err(MappingSourceError::CommandFailed {
                command,
                code: output.status.code(),
            });
        }

        // 控制台代码页不一定是 UTF-8，这里只关心 ASCII 部分
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl MappingSource for CommandMappingSource {
    fn name(&self) -> &'static str {
        "command"
    }

    fn query(&self) -> Result<Vec<DriveMapping>, MappingSourceError> {
        let net_use = Self::run("net", &["use"]);
        let subst = Self::run("subst", &[]);

        if let (Err(net_err), Err(subst_err)) = (&net_use, &subst) {
            return Err(MappingSourceError::Unavailable(format!(
                "net use: {}; subst: {}",
                net_err, subst_err
            )));
        }

        let mut mappings = Vec::new();
        match net_use {
            Ok(output) => mappings.extend(parse_net_use_output(&output)),
            Err(e) => log::warn!("[CommandMappingSource] net use 查询失败: {}", e),
        }
        match subst {
            Ok(output) => mappings.extend(parse_subst_output(&output)),
            Err(e) => log::warn!("[CommandMappingSource] subst 查询失败: {}", e),
        }

        Ok(merge_mappings(mappings))
    }
}

/// 解析 `net use` 输出
///
/// 状态不是 `OK` 的行（已记住但未连接）视为持久映射
pub fn parse_net_use_output(output: &str) -> Vec<DriveMapping> {
    NET_USE_LINE
        .captures_iter(output)
        .filter_map(|caps| {
            let status = caps.get(1).map(|m| m.as_str().trim());
            let letter = caps[2].chars().next()?;
            let remote = caps[3].trim();

            let persistent = status.is_some_and(|s| !s.eq_ignore_ascii_case("OK"));

            match DriveMapping::network(letter, remote) {
                Ok(mapping) => Some(mapping.with_persistent(persistent)),
                Err(e) => {
                    log::debug!("[CommandMappingSource] 跳过无效的 net use 行: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// 解析 `subst` 输出
pub fn parse_subst_output(output: &str) -> Vec<DriveMapping> {
    SUBST_LINE
        .captures_iter(output)
        .filter_map(|caps| {
            let letter = caps[1].chars().next()?;
            let target = expand_unc_marker(caps[2].trim());
            DriveMapping::subst(letter, &target).ok()
        })
        .collect()
}

/// SUBST 到网络共享时目标显示为 `UNC\server\share`，还原为 `\\server\share`
pub(crate) fn expand_unc_marker(target: &str) -> String {
    match target.get(..4) {
        Some(head) if head.eq_ignore_ascii_case(r"UNC\") => format!(r"\\{}", &target[4..]),
        _ => target.to_string(),
    }
}

/// 同一个驱动器字母只保留第一条（网络映射先于 SUBST 收集）
pub fn merge_mappings(mappings: Vec<DriveMapping>) -> Vec<DriveMapping> {
    let mut seen = HashSet::new();
    mappings
        .into_iter()
        .filter(|m| {
            let first = seen.insert(m.drive_letter);
            if !first {
                log::debug!("[CommandMappingSource] 重复的驱动器 {}:，忽略后者", m.drive_letter);
            }
            first
        })
        .collect()
}
