//! 驱动器映射表
//!
//! 缓存驱动器字母 → 目标（UNC 或本地路径）的映射快照。
//! - 读者拿到的是已提交的完整快照（`Arc<MappingSnapshot>`），不会看到半更新的表
//! - 刷新时构建新快照再整体替换
//! - 快照超过 TTL 或被 `invalidate()` 后，下一次查询时惰性刷新
//! - 刷新失败或超时时保留上一次快照
//! - 同一时间最多只有一个来源查询在运行，超时的查询结束前不会再启动新的查询
//! - 晚到的查询结果不会覆盖更新的快照

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::source::{MappingSource, MappingSourceError};
use crate::logging::{RefreshMetrics, RefreshStatus, RefreshSummary, Timer};
use crate::path_resolver::normalizer::{normalize, SEPARATOR};
use crate::path_resolver::unc::{is_unc, strip_extended_prefix};
use crate::path_resolver::PathResolveError;

/// 默认 TTL
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// 默认单次查询超时
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(2);

/// 映射目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    /// 网络共享 `\\server\share`
    Unc,
    /// 本机路径
    LocalPath,
}

/// 映射表中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveMapping {
    /// 大写驱动器字母
    pub drive_letter: char,
    pub target_kind: TargetKind,
    /// 规范化后的目标（扩展前缀已去掉）
    pub target: String,
    pub is_persistent: bool,
    /// 是否为 SUBST 替换驱动器
    pub substituted: bool,
}

impl DriveMapping {
    /// 创建映射，目标会被规范化
    pub fn new(letter: char, target: &str, substituted: bool) -> Result<Self, PathResolveError> {
        let drive_letter = drive_letter(letter).ok_or_else(|| {
            PathResolveError::InvalidArgument(format!("无效的驱动器字母: {:?}", letter))
        })?;

        let target = normalize(&strip_extended_prefix(&normalize(target))).into_string();
        if target.is_empty() {
            return Err(PathResolveError::InvalidArgument(format!(
                "驱动器 {}: 的映射目标为空",
                drive_letter
            )));
        }

        let target_kind = if is_unc(&target) {
            TargetKind::Unc
        } else {
            TargetKind::LocalPath
        };

        Ok(Self {
            drive_letter,
            target_kind,
            target,
            is_persistent: false,
            substituted,
        })
    }

    /// 网络驱动器映射
    pub fn network(letter: char, target: &str) -> Result<Self, PathResolveError> {
        Self::new(letter, target, false)
    }

    /// SUBST 替换驱动器
    pub fn subst(letter: char, target: &str) -> Result<Self, PathResolveError> {
        Self::new(letter, target, true)
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.is_persistent = persistent;
        self
    }

    /// `Z:` 形式
    pub fn drive(&self) -> String {
        format!("{}:", self.drive_letter)
    }
}

/// 校验并大写驱动器字母
pub fn drive_letter(c: char) -> Option<char> {
    c.is_ascii_alphabetic().then(|| c.to_ascii_uppercase())
}

/// `path` 是否以 `prefix` 为路径前缀（按路径组件边界匹配）
pub(crate) fn has_path_prefix(path: &str, prefix: &str, case_insensitive: bool) -> bool {
    let Some(head) = path.get(..prefix.len()) else {
        return false;
    };
    let same = if case_insensitive {
        head.eq_ignore_ascii_case(prefix)
    } else {
        head == prefix
    };
    same && (path.len() == prefix.len() || path[prefix.len()..].starts_with(SEPARATOR))
}

/// 映射表快照（不可变）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSnapshot {
    mappings: BTreeMap<char, DriveMapping>,
    source: String,
    captured_at: Option<DateTime<Utc>>,
    degraded: bool,
    #[serde(skip)]
    refreshed_at: Option<Instant>,
    #[serde(skip)]
    case_insensitive: bool,
}

impl MappingSnapshot {
    /// 进程启动时的空快照（从未刷新）
    pub fn empty() -> Self {
        Self {
            mappings: BTreeMap::new(),
            source: String::new(),
            captured_at: None,
            degraded: false,
            refreshed_at: None,
            case_insensitive: true,
        }
    }

    /// 用一组映射构建快照；同一字母只保留第一条
    pub fn from_mappings(source: &str, list: Vec<DriveMapping>, case_insensitive: bool) -> Self {
        let mut mappings = BTreeMap::new();
        for mapping in list {
            if mappings.contains_key(&mapping.drive_letter) {
                log::warn!("[MappingTable] 驱动器 {} 重复出现，忽略: {}", mapping.drive(), mapping.target);
                continue;
            }
            mappings.insert(mapping.drive_letter, mapping);
        }

        Self {
            mappings,
            source: source.to_string(),
            captured_at: Some(Utc::now()),
            degraded: false,
            refreshed_at: Some(Instant::now()),
            case_insensitive,
        }
    }

    /// 查询失败时沿用旧数据，标记为降级并重新计时
    fn retained(&self) -> Self {
        Self {
            degraded: true,
            refreshed_at: Some(Instant::now()),
            ..self.clone()
        }
    }

    pub fn lookup(&self, letter: char) -> Option<&DriveMapping> {
        drive_letter(letter).and_then(|l| self.mappings.get(&l))
    }

    /// 找到能覆盖该 UNC 路径的映射
    ///
    /// 多条映射都匹配时：目标最长者优先，仍相同则取字母最小者
    pub fn reverse_match(&self, unc_path: &str) -> Option<&DriveMapping> {
        let path = strip_extended_prefix(&normalize(unc_path));

        let mut best: Option<&DriveMapping> = None;
        // BTreeMap 按字母升序遍历，只有更长的目标才替换当前结果
        for mapping in self.mappings.values() {
            if mapping.target_kind != TargetKind::Unc {
                continue;
            }
            if !has_path_prefix(&path, &mapping.target, self.case_insensitive) {
                continue;
            }
            if best.map_or(true, |b| mapping.target.len() > b.target.len()) {
                best = Some(mapping);
            }
        }
        best
    }

    pub fn reverse_lookup(&self, unc_path: &str) -> Option<char> {
        self.reverse_match(unc_path).map(|m| m.drive_letter)
    }

    pub fn mappings(&self) -> impl Iterator<Item = &DriveMapping> {
        self.mappings.values()
    }

    /// 驱动器 → UNC 目标（仅网络目标）
    pub fn network_mappings(&self) -> BTreeMap<char, String> {
        self.mappings
            .values()
            .filter(|m| m.target_kind == TargetKind::Unc)
            .map(|m| (m.drive_letter, m.target.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// 是否为刷新失败后沿用的旧数据
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.refreshed_at.map_or(true, |t| t.elapsed() >= ttl)
    }
}

impl Default for MappingSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// 一次刷新的结果（刷新本身从不失败）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// 发布了新快照，包含的映射条数
    Updated(usize),
    /// 查询失败或超时，保留旧快照
    Retained(String),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }
}

/// 来源查询进行中的标记，随查询结束（包括超时后被放弃的线程）一起清除
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 进程级映射表
pub struct MappingTable {
    source: Arc<dyn MappingSource>,
    current: RwLock<Arc<MappingSnapshot>>,
    /// 每发布一次新快照加一
    generation: AtomicU64,
    invalidated: AtomicBool,
    in_flight: Arc<AtomicBool>,
    refresh_lock: Mutex<()>,
    ttl: Duration,
    refresh_timeout: Option<Duration>,
    case_insensitive: bool,
    metrics: RefreshMetrics,
}

impl MappingTable {
    /// 创建空表，首次查询时刷新
    pub fn new(source: Arc<dyn MappingSource>) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(MappingSnapshot::empty())),
            generation: AtomicU64::new(0),
            invalidated: AtomicBool::new(false),
            in_flight: Arc::new(AtomicBool::new(false)),
            refresh_lock: Mutex::new(()),
            ttl: DEFAULT_TTL,
            refresh_timeout: Some(DEFAULT_REFRESH_TIMEOUT),
            case_insensitive: true,
            metrics: RefreshMetrics::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// None 表示不限制查询时间
    pub fn with_refresh_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn metrics(&self) -> RefreshSummary {
        self.metrics.summary()
    }

    /// 当前已提交的快照，不触发刷新
    pub fn peek(&self) -> Arc<MappingSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// 获取快照，必要时惰性刷新
    ///
    /// 已有数据时若其他线程正在刷新，直接返回当前快照而不等待
    pub fn snapshot(&self) -> Arc<MappingSnapshot> {
        let current = self.peek();
        if !self.needs_refresh(&current) {
            return current;
        }

        let guard = if current.refreshed_at.is_none() {
            Some(self.lock_refresh())
        } else {
            match self.refresh_lock.try_lock() {
                Ok(guard) => Some(guard),
                Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
                Err(TryLockError::WouldBlock) => None,
            }
        };

        if let Some(_guard) = guard {
            // 拿到锁之后再检查一次，可能已被其他线程刷新
            if self.needs_refresh(&self.peek()) {
                self.refresh_locked();
            }
        }
        self.peek()
    }

    /// 立即刷新
    pub fn refresh(&self) -> RefreshOutcome {
        let _guard = self.lock_refresh();
        self.refresh_locked()
    }

    /// 异步刷新：查询在阻塞线程池中执行，超时后保留旧快照
    ///
    /// 等待期间若已有更新的快照发布，本次结果直接丢弃
    pub async fn refresh_async(&self) -> RefreshOutcome {
        self.invalidated.store(false, Ordering::SeqCst);

        let start = self.generation.load(Ordering::SeqCst);
        let timer = Timer::start();
        let result = match self.begin_query() {
            Ok(in_flight) => {
                let source = Arc::clone(&self.source);
                let task = tokio::task::spawn_blocking(move || {
                    let _in_flight = in_flight;
                    source.query()
                });

                match self.refresh_timeout {
                    Some(limit) => match tokio::time::timeout(limit, task).await {
                        Ok(joined) => joined.unwrap_or_else(|_| Err(MappingSourceError::Aborted)),
                        Err(_) => Err(MappingSourceError::Timeout(limit)),
                    },
                    None => task.await.unwrap_or_else(|_| Err(MappingSourceError::Aborted)),
                }
            }
            Err(e) => Err(e),
        };

        let _guard = self.lock_refresh();
        self.commit(start, result, timer.stop())
    }

    /// 标记快照失效，下一次查询时刷新
    pub fn invalidate(&self) {
        log::debug!("[MappingTable] 快照已失效");
        self.invalidated.store(true, Ordering::SeqCst);
    }

    pub fn lookup(&self, letter: char) -> Option<DriveMapping> {
        self.snapshot().lookup(letter).cloned()
    }

    pub fn reverse_lookup(&self, unc_path: &str) -> Option<char> {
        self.snapshot().reverse_lookup(unc_path)
    }

    fn needs_refresh(&self, snapshot: &MappingSnapshot) -> bool {
        self.invalidated.load(Ordering::SeqCst) || snapshot.is_expired(self.ttl)
    }

    fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 调用方必须持有 refresh_lock
    fn refresh_locked(&self) -> RefreshOutcome {
        // 查询期间再发生的 invalidate 会保留到下一次
        self.invalidated.store(false, Ordering::SeqCst);

        let start = self.generation.load(Ordering::SeqCst);
        let timer = Timer::start();
        let result = self.query_source();
        self.commit(start, result, timer.stop())
    }

    /// 占用查询标记；上一次查询（可能已超时被放弃）仍在运行时返回 `InFlight`
    fn begin_query(&self) -> Result<InFlight, MappingSourceError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(MappingSourceError::InFlight);
        }
        Ok(InFlight(Arc::clone(&self.in_flight)))
    }

    fn query_source(&self) -> Result<Vec<DriveMapping>, MappingSourceError> {
        let in_flight = self.begin_query()?;
        let Some(limit) = self.refresh_timeout else {
            let result = self.source.query();
            drop(in_flight);
            return result;
        };

        let source = Arc::clone(&self.source);
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("mapping-refresh".to_string())
            .spawn(move || {
                let result = source.query();
                drop(in_flight);
                // 超时后接收端已丢弃，发送失败可以忽略
                let _ = tx.send(result);
            })?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(MappingSourceError::Timeout(limit)),
            Err(RecvTimeoutError::Disconnected) => Err(MappingSourceError::Aborted),
        }
    }

    /// 提交查询结果，调用方必须持有 refresh_lock
    ///
    /// `start` 是查询开始时的快照代数；之后已发布过新快照时丢弃本次结果
    fn commit(
        &self,
        start: u64,
        result: Result<Vec<DriveMapping>, MappingSourceError>,
        elapsed: Duration,
    ) -> RefreshOutcome {
        let source = self.source.name();
        if self.generation.load(Ordering::SeqCst) != start {
            log::debug!("[MappingTable] 来自 '{}' 的查询结果已过时，丢弃", source);
            return RefreshOutcome::Retained("已有更新的快照".to_string());
        }

        match result {
            Ok(list) => {
                let snapshot = MappingSnapshot::from_mappings(source, list, self.case_insensitive);
                let count = snapshot.len();
                self.publish(snapshot);
                self.generation.fetch_add(1, Ordering::SeqCst);
                self.metrics.record(source, elapsed, RefreshStatus::Updated);

                log::debug!("[MappingTable] 从 '{}' 刷新完成，共 {} 条映射", source, count);
                RefreshOutcome::Updated(count)
            }
            Err(e) => {
                let status = match &e {
                    MappingSourceError::Timeout(_) | MappingSourceError::InFlight => RefreshStatus::TimedOut,
                    _ => RefreshStatus::Failed,
                };
                self.metrics.record(source, elapsed, status);

                let retained = self.peek().retained();
                self.publish(retained);

                log::warn!("[MappingTable] 从 '{}' 刷新失败，保留上一次快照: {}", source, e);
                RefreshOutcome::Retained(e.to_string())
            }
        }
    }

    fn publish(&self, snapshot: MappingSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(snapshot);
    }
}

impl std::fmt::Debug for MappingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingTable")
            .field("source", &self.source.name())
            .field("ttl", &self.ttl)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("case_insensitive", &self.case_insensitive)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::source::{NullMappingSource, StaticMappingSource};
    use std::sync::atomic::AtomicUsize;

    /// 统计查询次数的来源
    struct CountingSource {
        inner: StaticMappingSource,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(mappings: Vec<DriveMapping>) -> Self {
            Self {
                inner: StaticMappingSource::new(mappings),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MappingSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn query(&self) -> Result<Vec<DriveMapping>, MappingSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.query()
        }
    }

    struct FailingSource;

    impl MappingSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn query(&self) -> Result<Vec<DriveMapping>, MappingSourceError> {
            Err(MappingSourceError::Unavailable("测试".to_string()))
        }
    }

    /// 每次查询都很慢，记录同时运行的查询数
    struct HangingSource {
        delay: Duration,
        calls: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl HangingSource {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }
    }

    impl MappingSource for HangingSource {
        fn name(&self) -> &'static str {
            "hanging"
        }

        fn query(&self) -> Result<Vec<DriveMapping>, MappingSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![DriveMapping::network('Z', r"\\s\sh").unwrap()])
        }
    }

    fn network(letter: char, target: &str) -> DriveMapping {
        DriveMapping::network(letter, target).unwrap()
    }

    #[test]
    fn test_drive_mapping_normalizes_target() {
        let mapping = DriveMapping::network('z', "//Server/Share/").unwrap();
        assert_eq!(mapping.drive_letter, 'Z');
        assert_eq!(mapping.target, r"\\Server\Share");
        assert_eq!(mapping.target_kind, TargetKind::Unc);

        let mapping = DriveMapping::subst('s', r"\\?\c:\work\").unwrap();
        assert_eq!(mapping.target, r"C:\work");
        assert_eq!(mapping.target_kind, TargetKind::LocalPath);
    }

    #[test]
    fn test_drive_mapping_rejects_invalid() {
        assert!(DriveMapping::network('1', r"\\s\sh").is_err());
        assert!(DriveMapping::network('Z', "").is_err());
    }

    #[test]
    fn test_has_path_prefix_respects_boundaries() {
        assert!(has_path_prefix(r"\\s\share\x", r"\\s\share", false));
        assert!(has_path_prefix(r"\\s\share", r"\\s\share", false));
        assert!(!has_path_prefix(r"\\s\shared\x", r"\\s\share", false));
        assert!(!has_path_prefix(r"\\S\SHARE\x", r"\\s\share", false));
        assert!(has_path_prefix(r"\\S\SHARE\x", r"\\s\share", true));
    }

    #[test]
    fn test_reverse_lookup_longest_prefix_wins() {
        let snapshot = MappingSnapshot::from_mappings(
            "test",
            vec![network('Y', r"\\s\share"), network('X', r"\\s\share\sub")],
            true,
        );
        assert_eq!(snapshot.reverse_lookup(r"\\s\share\sub\file.txt"), Some('X'));
        assert_eq!(snapshot.reverse_lookup(r"\\s\share\other"), Some('Y'));
        assert_eq!(snapshot.reverse_lookup(r"\\t\share"), None);
    }

    #[test]
    fn test_reverse_lookup_tie_breaks_on_lowest_letter() {
        let snapshot = MappingSnapshot::from_mappings(
            "test",
            vec![network('W', r"\\s\share"), network('M', r"\\s\share")],
            true,
        );
        assert_eq!(snapshot.reverse_lookup(r"\\s\share\a"), Some('M'));
    }

    #[test]
    fn test_reverse_lookup_case_mode() {
        let mappings = vec![network('Z', r"\\Server\Share")];
        let insensitive = MappingSnapshot::from_mappings("test", mappings.clone(), true);
        let sensitive = MappingSnapshot::from_mappings("test", mappings, false);

        assert_eq!(insensitive.reverse_lookup(r"\\server\share\a"), Some('Z'));
        assert_eq!(sensitive.reverse_lookup(r"\\server\share\a"), None);
        assert_eq!(sensitive.reverse_lookup(r"\\Server\Share\a"), Some('Z'));
    }

    #[test]
    fn test_reverse_lookup_ignores_local_targets() {
        let snapshot = MappingSnapshot::from_mappings(
            "test",
            vec![DriveMapping::subst('S', r"C:\work").unwrap()],
            true,
        );
        assert_eq!(snapshot.reverse_lookup(r"C:\work\x"), None);
    }

    #[test]
    fn test_snapshot_keeps_first_duplicate() {
        let snapshot = MappingSnapshot::from_mappings(
            "test",
            vec![network('Z', r"\\a\b"), network('Z', r"\\c\d")],
            true,
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.lookup('z').unwrap().target, r"\\a\b");
    }

    #[test]
    fn test_lazy_refresh_on_first_query() {
        let source = Arc::new(CountingSource::new(vec![network('Z', r"\\s\sh")]));
        let table = MappingTable::new(source.clone());

        assert_eq!(source.calls(), 0);
        assert!(table.lookup('Z').is_some());
        assert_eq!(source.calls(), 1);

        // TTL 内不再查询
        assert!(table.lookup('Z').is_some());
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_invalidate_forces_refresh() {
        let source = Arc::new(CountingSource::new(vec![network('Z', r"\\s\sh")]));
        let table = MappingTable::new(source.clone()).with_ttl(Duration::from_secs(3600));

        table.lookup('Z');
        source.inner.replace(vec![network('Y', r"\\t\sh")]);
        assert!(table.lookup('Y').is_none());

        table.invalidate();
        assert!(table.lookup('Y').is_some());
        assert!(table.lookup('Z').is_none());
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_ttl_expiry_refreshes() {
        let source = Arc::new(CountingSource::new(Vec::new()));
        let table = MappingTable::new(source.clone()).with_ttl(Duration::from_millis(20));

        table.snapshot();
        thread::sleep(Duration::from_millis(40));
        table.snapshot();
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_null_source_gives_empty_table() {
        let table = MappingTable::new(Arc::new(NullMappingSource));
        assert_eq!(table.refresh(), RefreshOutcome::Updated(0));
        assert!(table.snapshot().is_empty());
        assert_eq!(table.reverse_lookup(r"\\s\sh\x"), None);
    }

    #[test]
    fn test_failed_refresh_retains_snapshot() {
        let table = MappingTable::new(Arc::new(FailingSource));
        let outcome = table.refresh();
        assert!(!outcome.is_updated());

        let snapshot = table.peek();
        assert!(snapshot.is_empty());
        assert!(snapshot.is_degraded());
        assert_eq!(table.metrics().failed, 1);
    }

    #[test]
    fn test_explicit_refresh_reports_count() {
        let source = Arc::new(StaticMappingSource::new(vec![
            network('Z', r"\\s\sh"),
            DriveMapping::subst('S', r"C:\work").unwrap(),
        ]));
        let table = MappingTable::new(source);
        assert_eq!(table.refresh(), RefreshOutcome::Updated(2));
        assert_eq!(table.metrics().updated, 1);
        assert!(table.peek().captured_at().is_some());
        assert_eq!(table.peek().network_mappings().get(&'Z').map(String::as_str), Some(r"\\s\sh"));
    }

    #[test]
    fn test_hung_query_blocks_new_queries() {
        let source = Arc::new(HangingSource::new(Duration::from_millis(300)));
        let table = MappingTable::new(source.clone())
            .with_ttl(Duration::from_millis(1))
            .with_refresh_timeout(Some(Duration::from_millis(20)));

        // 第一次查询超时，线程仍在后台运行
        assert!(table.snapshot().is_degraded());
        for _ in 0..10 {
            thread::sleep(Duration::from_millis(15));
            table.snapshot();
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.max_running.load(Ordering::SeqCst), 1);
        assert!(table.metrics().timed_out >= 2);

        // 挂起的查询结束后可以重新查询
        thread::sleep(Duration::from_millis(400));
        table.snapshot();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(source.max_running.load(Ordering::SeqCst) <= 1);
    }

    #[test]
    fn test_stale_result_does_not_replace_newer_snapshot() {
        let source = Arc::new(StaticMappingSource::new(vec![network('Z', r"\\old\sh")]));
        let table = MappingTable::new(source.clone());

        // 查询开始时记下的代数，之后同步刷新发布了新快照
        let start = table.generation.load(Ordering::SeqCst);
        source.replace(vec![network('Y', r"\\new\sh")]);
        assert!(table.refresh().is_updated());

        let _guard = table.lock_refresh();
        let late = table.commit(start, Ok(vec![network('Z', r"\\old\sh")]), Duration::ZERO);
        assert!(!late.is_updated());
        let late = table.commit(start, Err(MappingSourceError::Timeout(Duration::ZERO)), Duration::ZERO);
        assert!(!late.is_updated());

        let snapshot = table.peek();
        assert!(snapshot.lookup('Y').is_some());
        assert!(snapshot.lookup('Z').is_none());
        assert!(!snapshot.is_degraded());
        assert_eq!(table.metrics().timed_out, 0);
    }
}
