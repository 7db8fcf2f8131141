//! 通用工具函数
//!
//! 队列中的时间均为当天的"时:分"字符串，这里集中处理格式化、解析和时钟。

use chrono::{Duration, Local, NaiveTime, Timelike};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};

/// 时分格式
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M";

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;
const MINUTES_PER_DAY: u64 = 24 * 60;

/// 时钟接口
///
/// 管理器通过它读取"现在"，测试中可替换为固定时钟。
pub trait Clock: Send + Sync + Debug {
    /// 当前时刻（当天）
    fn now(&self) -> NaiveTime;
}

/// 系统本地时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// 可手动拨动的固定时钟
#[derive(Debug)]
pub struct FixedClock {
    seconds_from_midnight: AtomicU32,
}

impl FixedClock {
    /// 创建固定在指定时刻的时钟
    pub fn at(time: NaiveTime) -> Self {
        Self {
            seconds_from_midnight: AtomicU32::new(time.num_seconds_from_midnight()),
        }
    }

    /// 按"HH:MM"创建，无法解析时落在午夜
    pub fn at_hm(value: &str) -> Self {
        Self::at(parse_time_of_day(value).unwrap_or(NaiveTime::MIN))
    }

    /// 设置时刻
    pub fn set(&self, time: NaiveTime) {
        self.seconds_from_midnight
            .store(time.num_seconds_from_midnight(), Ordering::SeqCst);
    }

    /// 向前拨动若干分钟，跨午夜回绕
    pub fn advance_minutes(&self, minutes: u32) {
        let current = self.seconds_from_midnight.load(Ordering::SeqCst);
        let next = (current + minutes * 60) % SECONDS_PER_DAY;
        self.seconds_from_midnight.store(next, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveTime {
        let secs = self.seconds_from_midnight.load(Ordering::SeqCst);
        NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap_or(NaiveTime::MIN)
    }
}

/// 格式化为"HH:MM"
pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format(TIME_OF_DAY_FORMAT).to_string()
}

/// 解析"HH:MM"或"HH:MM:SS"
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, TIME_OF_DAY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// `now` 超过 `scheduled` 的整分钟数，未到时为 0
pub fn minutes_past(now: NaiveTime, scheduled: NaiveTime) -> u32 {
    if now <= scheduled {
        return 0;
    }
    ((now - scheduled).num_seconds() / 60) as u32
}

/// `now` 加上若干分钟后的时分字符串（跨午夜回绕）
pub fn time_after_minutes(now: NaiveTime, minutes: u64) -> String {
    // 按一天取模后再换算，避免超大分钟数溢出
    let minutes = (minutes % MINUTES_PER_DAY) as i64;
    let (later, _) = now.overflowing_add_signed(Duration::minutes(minutes));
    format_time_of_day(later)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_format_and_parse() {
        assert_eq!(format_time_of_day(hm(9, 5)), "09:05");
        assert_eq!(parse_time_of_day("14:30"), Some(hm(14, 30)));
        assert_eq!(parse_time_of_day("08:15:59"), NaiveTime::from_hms_opt(8, 15, 59));
        assert_eq!(parse_time_of_day("not a time"), None);
    }

    #[test]
    fn test_minutes_past_floors() {
        let scheduled = hm(10, 0);
        assert_eq!(minutes_past(hm(9, 30), scheduled), 0);
        assert_eq!(minutes_past(hm(10, 0), scheduled), 0);
        let now = NaiveTime::from_hms_opt(10, 7, 59).unwrap();
        assert_eq!(minutes_past(now, scheduled), 7);
    }

    #[test]
    fn test_time_after_minutes_wraps() {
        assert_eq!(time_after_minutes(hm(9, 0), 45), "09:45");
        assert_eq!(time_after_minutes(hm(23, 50), 20), "00:10");
        assert_eq!(time_after_minutes(hm(9, 0), 3 * 24 * 60 + 30), "09:30");
        assert_eq!(time_after_minutes(hm(0, 0), u64::MAX), "12:15");
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::at_hm("08:00");
        assert_eq!(clock.now(), hm(8, 0));
        clock.advance_minutes(90);
        assert_eq!(clock.now(), hm(9, 30));
        clock.set(hm(23, 59));
        clock.advance_minutes(2);
        assert_eq!(clock.now(), hm(0, 1));
    }
}
