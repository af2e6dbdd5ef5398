use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;

use crate::services::time_window;

/// 每日运行时间窗（本地时间，可跨午夜）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeWindow {
    #[serde(deserialize_with = "hh_mm")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "hh_mm")]
    pub stop: NaiveTime,
}

impl TimeWindow {
    #[cfg(test)]
    pub fn new(start: NaiveTime, stop: NaiveTime) -> Self {
        Self { start, stop }
    }

    pub fn contains(&self, now: NaiveTime) -> bool {
        time_window::is_active(now, self.start, self.stop)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.stop.format("%H:%M"))
    }
}

fn hh_mm<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| {
        serde::de::Error::custom(format!("invalid time of day `{}` (expected HH:MM): {}", raw, e))
    })
}

/// 重启规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartRule {
    /// 窗口内挂掉就重启
    #[default]
    Always,
    /// 调度器类进程：日出之后不再重启
    UntilSunrise,
}

/// 重启所需的命令行和日志位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub command: String,
    pub log: PathBuf,
}

/// 被监控的进程（配置加载后只读）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredProcess {
    /// 既是数据库主键，也是用于匹配进程命令行的模式
    pub identifier: String,
    /// 运行时间窗，None 表示全天
    pub window: Option<TimeWindow>,
    /// None 表示只上报状态、不重启
    pub launch: Option<LaunchSpec>,
    pub restart: RestartRule,
}

impl MonitoredProcess {
    pub fn window_active(&self, now: NaiveTime) -> bool {
        self.window.map_or(true, |w| w.contains(now))
    }
}
