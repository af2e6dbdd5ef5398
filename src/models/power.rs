use std::fmt;

/// 电源插座编号（从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(u8);

impl Port {
    pub fn new(number: u8) -> Option<Self> {
        (number > 0).then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    On,
    Off,
    Cycle,
    Status,
}

impl PowerAction {
    pub fn verb(self) -> &'static str {
        match self {
            PowerAction::On => "on",
            PowerAction::Off => "off",
            PowerAction::Cycle => "cycle",
            PowerAction::Status => "status",
        }
    }
}

impl From<PowerState> for PowerAction {
    fn from(state: PowerState) -> Self {
        match state {
            PowerState::On => PowerAction::On,
            PowerState::Off => PowerAction::Off,
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// 电源操作结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOutcome {
    /// 开关回读确认已到达目标状态
    Confirmed(PowerState),
    /// 原子 cycle 命令被开关接受
    Cycled,
    /// 命令执行成功，但后端无法回读状态
    Unverified,
    /// 未指定端口，什么都没做
    Skipped,
}
