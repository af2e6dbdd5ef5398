use chrono::{DateTime, Utc};
use std::fmt;

/// 进程运行状态（库里存 1 / 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Up,
    Down,
}

impl ProcessState {
    pub fn from_running(running: bool) -> Self {
        if running {
            ProcessState::Up
        } else {
            ProcessState::Down
        }
    }

    pub fn as_flag(self) -> u8 {
        match self {
            ProcessState::Up => 1,
            ProcessState::Down => 0,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessState::Up => "UP",
            ProcessState::Down => "DOWN",
        })
    }
}

/// 一条状态记录，(process, site_id) 唯一
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub process: String,
    pub site_id: String,
    pub state: ProcessState,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    Healthy,
    OutsideWindow,
    NoLaunchCommand,
    AfterSunrise,
    Down,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestartReason::Healthy => "process is running",
            RestartReason::OutsideWindow => "outside operating window",
            RestartReason::NoLaunchCommand => "no launch command configured",
            RestartReason::AfterSunrise => "sun is up",
            RestartReason::Down => "process is down inside its window",
        })
    }
}

/// 每轮重新计算，不持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartDecision {
    pub attempt: bool,
    pub reason: RestartReason,
}

impl RestartDecision {
    pub fn restart() -> Self {
        Self {
            attempt: true,
            reason: RestartReason::Down,
        }
    }

    pub fn skip(reason: RestartReason) -> Self {
        Self {
            attempt: false,
            reason,
        }
    }
}
