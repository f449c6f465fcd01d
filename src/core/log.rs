//! 任务日志聚合：追加式、全程去重的状态行序列
//!
//! - 去重范围是整个聚合器生命周期（不只是相邻重复）：同一原文出现过一次后，后续再出现一律忽略，
//!   包括周期性的心跳行。只有 reset（新任务开始）才清空去重记录。
//! - 行首的 `[HH:MM:SS]` 被剥离为时间戳，否则使用追加时的本地时间。
//! - 严重级别：显式 error/success/warning/debug 原样采用；未指定或为通用级别（log/info）时按内容标记判定，
//!   优先级 error > success > warning > 默认。

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;
use serde::Serialize;

const ERROR_MARKERS: &[&str] = &["error", "failed", "critical", "fatal", "exception", "❌"];
const SUCCESS_MARKERS: &[&str] = &["completed", "finished ok", "success", "saved ", "ready for download", "🏁", "✅"];
const WARNING_MARKERS: &[&str] = &["warning", "cancel", "skipping", "retrying", "🛑"];

/// 日志严重级别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    /// 通用级别，可被内容标记覆盖
    Log,
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl Severity {
    /// 通用级别（log / info）允许被内容标记覆盖
    pub fn is_generic(self) -> bool {
        matches!(self, Severity::Log | Severity::Info)
    }
}

/// 单条展示用日志（由原始行派生）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: NaiveTime,
    pub severity: Severity,
    /// 去掉时间前缀后的展示文本
    pub text: String,
    /// 原始行（去重键）
    pub raw: String,
}

/// 判定严重级别
pub fn classify(text: &str, explicit: Option<Severity>) -> Severity {
    if let Some(sev) = explicit.filter(|s| !s.is_generic()) {
        return sev;
    }
    let lower = text.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
    if has(ERROR_MARKERS) {
        Severity::Error
    } else if has(SUCCESS_MARKERS) {
        Severity::Success
    } else if has(WARNING_MARKERS) {
        Severity::Warning
    } else {
        explicit.unwrap_or(Severity::Info)
    }
}

fn time_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(\d{2}):(\d{2}):(\d{2})\]\s*").expect("time prefix regex")
    })
}

/// 拆出行首 `[HH:MM:SS]`；时间非法时视为无前缀
pub fn split_timestamp(raw: &str) -> (Option<NaiveTime>, &str) {
    let Some(caps) = time_prefix().captures(raw) else {
        return (None, raw);
    };
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let time = match (field(1), field(2), field(3)) {
        (Some(h), Some(m), Some(s)) => NaiveTime::from_hms_opt(h, m, s),
        _ => None,
    };
    match (time, caps.get(0)) {
        (Some(t), Some(whole)) => (Some(t), &raw[whole.end()..]),
        _ => (None, raw),
    }
}

/// 日志聚合器
#[derive(Clone, Debug, Default)]
pub struct LogAggregator {
    seen: HashSet<String>,
    entries: Vec<LogEntry>,
}

impl LogAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空去重记录与已展示序列（仅在新任务开始时调用）
    pub fn reset(&mut self) {
        self.seen.clear();
        self.entries.clear();
    }

    /// 追加一行；原文已出现过（或为空白行）时返回 None
    pub fn append(&mut self, raw: &str, explicit: Option<Severity>) -> Option<&LogEntry> {
        let now = chrono::Local::now().time();
        self.append_at(raw, explicit, now)
    }

    /// 同 append，但由调用方提供「当前时间」
    pub fn append_at(
        &mut self,
        raw: &str,
        explicit: Option<Severity>,
        now: NaiveTime,
    ) -> Option<&LogEntry> {
        if raw.trim().is_empty() || self.seen.contains(raw) {
            return None;
        }
        let (embedded, text) = split_timestamp(raw);
        let entry = LogEntry {
            timestamp: embedded.unwrap_or(now),
            severity: classify(text, explicit),
            text: text.to_string(),
            raw: raw.to_string(),
        };
        self.seen.insert(raw.to_string());
        self.entries.push(entry);
        self.entries.last()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_timestamp_prefix_stripped() {
        let mut log = LogAggregator::new();
        let entry = log
            .append_at("[12:00:01] Crawling...", None, t(9, 0, 0))
            .unwrap();
        assert_eq!(entry.timestamp, t(12, 0, 1));
        assert_eq!(entry.text, "Crawling...");
        assert_eq!(entry.raw, "[12:00:01] Crawling...");
        assert_eq!(entry.severity, Severity::Info);
    }

    #[test]
    fn test_missing_or_invalid_prefix_uses_now() {
        let mut log = LogAggregator::new();
        let entry = log.append_at("Task queued.", None, t(9, 30, 0)).unwrap();
        assert_eq!(entry.timestamp, t(9, 30, 0));
        assert_eq!(entry.text, "Task queued.");

        let entry = log.append_at("[25:61:00] odd clock", None, t(9, 30, 0)).unwrap();
        assert_eq!(entry.timestamp, t(9, 30, 0));
        assert_eq!(entry.text, "[25:61:00] odd clock");
    }

    #[test]
    fn test_whole_lifetime_dedup() {
        let mut log = LogAggregator::new();
        assert!(log.append("[12:00:01] heartbeat", None).is_some());
        assert!(log.append("[12:00:02] Crawling...", None).is_some());
        // 非相邻重复同样被忽略
        assert!(log.append("[12:00:01] heartbeat", None).is_none());
        assert!(log.append("[12:00:02] Crawling...", Some(Severity::Error)).is_none());
        assert_eq!(log.len(), 2);

        let raws: HashSet<_> = log.entries().iter().map(|e| e.raw.clone()).collect();
        assert_eq!(raws.len(), log.len());
    }

    #[test]
    fn test_reset_allows_reappend() {
        let mut log = LogAggregator::new();
        log.append("Task queued.", None);
        log.reset();
        assert!(log.is_empty());
        assert!(log.append("Task queued.", None).is_some());
    }

    #[test]
    fn test_blank_lines_ignored() {
        let mut log = LogAggregator::new();
        assert!(log.append("   ", None).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_classification_precedence() {
        assert_eq!(classify("Error saving domain list: failed", None), Severity::Error);
        // error 标记优先于 success / warning
        assert_eq!(classify("Warning: Failed to save keywords file", None), Severity::Error);
        assert_eq!(classify("Final Status: COMPLETED - Finished OK (12.0s)", None), Severity::Success);
        assert_eq!(classify("Saved 40 domains to valid.txt", None), Severity::Success);
        assert_eq!(classify("Cancellation requested by user...", None), Severity::Warning);
        assert_eq!(classify("Phase 1: Collecting domains", None), Severity::Info);
    }

    #[test]
    fn test_explicit_severity() {
        // 非通用级别原样采用
        assert_eq!(classify("Crawling...", Some(Severity::Error)), Severity::Error);
        assert_eq!(classify("Runtime Error", Some(Severity::Debug)), Severity::Debug);
        assert_eq!(classify("Cancel failed", Some(Severity::Success)), Severity::Success);
        // 通用级别被内容覆盖，无标记时保持
        assert_eq!(classify("Runtime Error: boom", Some(Severity::Log)), Severity::Error);
        assert_eq!(classify("Task finished: COMPLETED", Some(Severity::Info)), Severity::Success);
        assert_eq!(classify("Crawling...", Some(Severity::Log)), Severity::Log);
    }
}
