pub mod power;
pub mod process;
pub mod status;

pub use power::{Port, PowerAction, PowerOutcome, PowerState};
pub use process::{LaunchSpec, MonitoredProcess, RestartRule, TimeWindow};
pub use status::{ProcessState, RestartDecision, RestartReason, StatusRecord};
