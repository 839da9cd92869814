//! 打印当前驱动器映射快照
//!
//! 用法: dump_mappings [配置文件路径] [要转换的路径...]

use std::path::PathBuf;

use anyhow::{Context, Result};
use unc_bridge::logging;
use unc_bridge::{PathConverter, PathKind, ResolverConfig, UncResolver};

fn main() -> Result<()> {
    logging::init("info");

    let mut args = std::env::args().skip(1);
    let config_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => ResolverConfig::default_config_path().context("无法确定配置目录")?,
    };

    println!("=== 驱动器映射 ===\n");
    println!("配置文件: {}", config_path.display());

    let config = ResolverConfig::load_or_default(&config_path)?;
    let resolver = UncResolver::from_config(&config).context("创建解析器失败")?;

    let outcome = resolver.table().refresh();
    println!("刷新结果: {:?}", outcome);

    let snapshot = resolver.table().peek();
    println!("{}", serde_json::to_string_pretty(&*snapshot).context("序列化快照失败")?);

    let metrics = resolver.table().metrics();
    println!(
        "\n刷新 {} 次，失败 {} 次，超时 {} 次，最近耗时 {:?}",
        metrics.total, metrics.failed, metrics.timed_out, metrics.last_duration
    );

    for path in args {
        println!("\n{}", path);
        let kind = resolver.classify(&path);
        println!("  类型: {}", kind);

        let converted = match kind {
            PathKind::Unc => resolver.to_local(&path),
            _ => resolver.to_unc(&path),
        };
        match converted {
            Ok(result) if result.changed => println!("  ✓ {}", result.path),
            Ok(_) => println!("  - 无法转换"),
            Err(e) => println!("  ✗ {}", e),
        }

        for issue in resolver.detect_issues(&path) {
            println!("  ! {}", issue);
        }
    }

    Ok(())
}
