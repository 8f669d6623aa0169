//! 时间处理工具模块
//!
//! - **事件层**: 所有时间字段使用 UTC 毫秒时间戳（u64）
//! - **状态层**: 同步记录使用 RFC 3339 字符串（毫秒精度，UTC）

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};

/// 当前 UTC 毫秒时间戳
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// 当前时间的 RFC 3339 表示，例如 `2024-05-01T08:30:00.123Z`
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 解析 RFC 3339 时间为 UTC 毫秒时间戳；早于 1970 或格式错误返回 None
pub fn parse_rfc3339_millis(value: &str) -> Option<u64> {
    let parsed = DateTime::parse_from_rfc3339(value).ok()?;
    u64::try_from(parsed.with_timezone(&Utc).timestamp_millis()).ok()
}

/// 文件修改时间转毫秒（早于 UNIX 纪元的按 0 计）
pub fn system_time_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_rfc3339_with_offset() {
        assert_eq!(parse_rfc3339_millis("1970-01-01T00:00:01.500Z"), Some(1_500));
        assert_eq!(parse_rfc3339_millis("1970-01-01T08:00:00+08:00"), Some(0));
        assert_eq!(parse_rfc3339_millis("1969-12-31T23:59:59Z"), None);
        assert_eq!(parse_rfc3339_millis("yesterday"), None);
    }

    #[test]
    fn now_rfc3339_round_trips() {
        let stamp = now_rfc3339();
        assert!(stamp.ends_with('Z'));
        let millis = parse_rfc3339_millis(&stamp).unwrap();
        assert!(now_millis() - millis < 5_000);
    }

    #[test]
    fn system_time_conversion() {
        let t = UNIX_EPOCH + Duration::from_millis(42);
        assert_eq!(system_time_millis(t), 42);
    }
}
