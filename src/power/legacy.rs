use std::process::{Command, Stdio};
use std::time::Duration;

use super::{Pause, PowerBackend};
use crate::error::{ConfigError, PowerCommandError};
use crate::models::{Port, PowerAction, PowerOutcome, PowerState};

/// 断电后等设备彻底放电再上电
pub const CYCLE_SETTLE: Duration = Duration::from_secs(2);

/// 旧式串口电源：每个动作调用一次外部脚本 `<script...> <on|off> <port>`，无法回读状态
#[derive(Debug, Clone)]
pub struct LegacyScript {
    program: String,
    args: Vec<String>,
}

impl LegacyScript {
    pub fn new(command: &[String]) -> Result<Self, ConfigError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ConfigError::Invalid("legacy power script command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn run(&self, action: PowerAction, port: Port) -> Result<(), PowerCommandError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(action.verb())
            .arg(port.to_string())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| PowerCommandError::Spawn {
                action,
                port,
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("power script {} {}: {}", action, port, stdout.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            log::debug!(
                "power script stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Err(PowerCommandError::Script {
                action,
                port,
                status: output.status,
            })
        }
    }
}

impl PowerBackend for LegacyScript {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn set(&self, port: Port, state: PowerState) -> Result<(), PowerCommandError> {
        self.run(state.into(), port)
    }

    fn cycle(&self, port: Port, pause: &dyn Pause) -> Result<PowerOutcome, PowerCommandError> {
        let abort = |stage, source| PowerCommandError::CycleAborted {
            port,
            stage,
            source: Box::new(source),
        };

        self.run(PowerAction::Off, port)
            .map_err(|e| abort(PowerState::Off, e))?;
        pause.pause(CYCLE_SETTLE);
        self.run(PowerAction::On, port)
            .map_err(|e| abort(PowerState::On, e))?;

        Ok(PowerOutcome::Unverified)
    }

    fn query(&self, _port: Port) -> Result<Option<PowerState>, PowerCommandError> {
        Ok(None)
    }
}
