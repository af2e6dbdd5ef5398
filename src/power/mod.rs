pub mod legacy;
pub mod networked;
pub mod retry;

use crate::config::PowerConfig;
use crate::error::PowerCommandError;
use crate::models::{Port, PowerOutcome, PowerState};

pub use legacy::LegacyScript;
pub use networked::NetworkedSwitch;
pub use retry::{Pause, RetryPolicy, ThreadPause};

/// 电源开关后端
pub trait PowerBackend {
    fn name(&self) -> &'static str;

    fn set(&self, port: Port, state: PowerState) -> Result<(), PowerCommandError>;

    /// 断电再上电；返回 `Cycled`（开关确认）或 `Unverified`（仅命令成功）
    fn cycle(&self, port: Port, pause: &dyn Pause) -> Result<PowerOutcome, PowerCommandError>;

    /// 回读插座状态；后端没有查询通道时返回 None
    fn query(&self, port: Port) -> Result<Option<PowerState>, PowerCommandError>;
}

pub struct PowerSwitchController {
    backend: Box<dyn PowerBackend>,
    pause: Box<dyn Pause>,
    retry: RetryPolicy,
}

impl PowerSwitchController {
    pub fn new(backend: Box<dyn PowerBackend>) -> Self {
        Self::with_pause(backend, Box::new(ThreadPause))
    }

    pub fn with_pause(backend: Box<dyn PowerBackend>, pause: Box<dyn Pause>) -> Self {
        Self {
            backend,
            pause,
            retry: RetryPolicy::CONFIRM,
        }
    }

    /// 按配置里的 `networked` 开关选择后端
    pub fn from_config(config: &PowerConfig) -> anyhow::Result<Self> {
        let backend: Box<dyn PowerBackend> = if config.networked {
            let host = config
                .host
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("networked power switch needs a host"))?;
            Box::new(NetworkedSwitch::connect(
                host,
                &config.user,
                &config.password,
            )?)
        } else {
            Box::new(LegacyScript::new(&config.script)?)
        };
        Ok(Self::new(backend))
    }

    pub fn turn_on(&self, port: Option<Port>) -> Result<PowerOutcome, PowerCommandError> {
        self.switch(port, PowerState::On)
    }

    pub fn turn_off(&self, port: Option<Port>) -> Result<PowerOutcome, PowerCommandError> {
        self.switch(port, PowerState::Off)
    }

    pub fn cycle(&self, port: Option<Port>) -> Result<PowerOutcome, PowerCommandError> {
        let Some(port) = port else {
            log::debug!("No port given, nothing to cycle");
            return Ok(PowerOutcome::Skipped);
        };

        let result = self.backend.cycle(port, self.pause.as_ref());
        match &result {
            Ok(PowerOutcome::Unverified) => {
                log::info!("Cycled port {} (unverified, {} backend)", port, self.backend.name())
            }
            Ok(_) => log::info!("Cycled port {}", port),
            Err(e) => log::error!("Cannot cycle port {}: {}", port, e),
        }
        result
    }

    fn switch(&self, port: Option<Port>, target: PowerState) -> Result<PowerOutcome, PowerCommandError> {
        let Some(port) = port else {
            log::debug!("No port given, nothing to switch {}", target);
            return Ok(PowerOutcome::Skipped);
        };

        let result = self.switch_port(port, target);
        match &result {
            Ok(PowerOutcome::Unverified) => log::info!(
                "Powered {} port {} (unverified, {} backend)",
                target,
                port,
                self.backend.name()
            ),
            Ok(_) => log::info!("Powered {} port {}", target, port),
            Err(e) => log::error!("Cannot power {} port {}: {}", target, port, e),
        }
        result
    }

    fn switch_port(&self, port: Port, target: PowerState) -> Result<PowerOutcome, PowerCommandError> {
        self.backend.set(port, target)?;

        let observed = self.retry.confirm(
            self.pause.as_ref(),
            || self.backend.query(port),
            |state| state.map_or(true, |s| s == target),
        )?;

        match observed {
            None => Ok(PowerOutcome::Unverified),
            Some(state) if state == target => Ok(PowerOutcome::Confirmed(target)),
            Some(state) => Err(PowerCommandError::NotConfirmed {
                port,
                expected: target,
                observed: state,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::retry::tests::RecordingPause;
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::rc::Rc;
    use std::time::Duration;

    /// 按顺序吐出预设状态的假开关
    #[derive(Default)]
    struct ScriptedSwitch {
        states: RefCell<VecDeque<Option<PowerState>>>,
        commands: RefCell<Vec<String>>,
        fail_set: bool,
    }

    impl PowerBackend for Rc<ScriptedSwitch> {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn set(&self, port: Port, state: PowerState) -> Result<(), PowerCommandError> {
            self.commands.borrow_mut().push(format!("{} {}", state, port));
            if self.fail_set {
                return Err(PowerCommandError::Script {
                    action: state.into(),
                    port,
                    status: ExitStatus::from_raw(1 << 8),
                });
            }
            Ok(())
        }

        fn cycle(&self, port: Port, _pause: &dyn Pause) -> Result<PowerOutcome, PowerCommandError> {
            self.commands.borrow_mut().push(format!("CYCLE {}", port));
            Ok(PowerOutcome::Cycled)
        }

        fn query(&self, port: Port) -> Result<Option<PowerState>, PowerCommandError> {
            self.commands.borrow_mut().push(format!("STATUS {}", port));
            Ok(self.states.borrow_mut().pop_front().flatten())
        }
    }

    fn controller(
        states: Vec<Option<PowerState>>,
        fail_set: bool,
    ) -> (PowerSwitchController, Rc<ScriptedSwitch>, Rc<RecordingPause>) {
        let switch = Rc::new(ScriptedSwitch {
            states: RefCell::new(states.into()),
            fail_set,
            ..Default::default()
        });
        let pause = Rc::new(RecordingPause::default());
        let controller =
            PowerSwitchController::with_pause(Box::new(switch.clone()), Box::new(pause.clone()));
        (controller, switch, pause)
    }

    impl Pause for Rc<RecordingPause> {
        fn pause(&self, duration: Duration) {
            self.as_ref().pause(duration)
        }
    }

    fn port(n: u8) -> Option<Port> {
        Port::new(n)
    }

    #[test]
    fn turn_on_confirmed_immediately_does_not_wait() {
        let (c, switch, pause) = controller(vec![Some(PowerState::On)], false);

        let outcome = c.turn_on(port(2)).unwrap();

        assert_eq!(outcome, PowerOutcome::Confirmed(PowerState::On));
        assert_eq!(*switch.commands.borrow(), vec!["ON 2", "STATUS 2"]);
        assert!(pause.pauses.borrow().is_empty());
    }

    #[test]
    fn turn_on_gets_one_delayed_recheck() {
        let (c, switch, pause) =
            controller(vec![Some(PowerState::Off), Some(PowerState::On)], false);

        let outcome = c.turn_on(port(2)).unwrap();

        assert_eq!(outcome, PowerOutcome::Confirmed(PowerState::On));
        assert_eq!(*switch.commands.borrow(), vec!["ON 2", "STATUS 2", "STATUS 2"]);
        assert_eq!(*pause.pauses.borrow(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn turn_on_still_off_after_recheck_fails() {
        let (c, switch, pause) = controller(
            vec![Some(PowerState::Off), Some(PowerState::Off), Some(PowerState::On)],
            false,
        );

        let err = c.turn_on(port(5)).unwrap_err();

        assert!(matches!(
            err,
            PowerCommandError::NotConfirmed {
                expected: PowerState::On,
                observed: PowerState::Off,
                ..
            }
        ));
        // 只有一次重查，不是循环
        assert_eq!(switch.commands.borrow().len(), 3);
        assert_eq!(pause.pauses.borrow().len(), 1);
    }

    #[test]
    fn turn_off_is_symmetric() {
        let (c, switch, pause) =
            controller(vec![Some(PowerState::On), Some(PowerState::Off)], false);

        let outcome = c.turn_off(port(1)).unwrap();

        assert_eq!(outcome, PowerOutcome::Confirmed(PowerState::Off));
        assert_eq!(*switch.commands.borrow(), vec!["OFF 1", "STATUS 1", "STATUS 1"]);
        assert_eq!(pause.pauses.borrow().len(), 1);
    }

    #[test]
    fn backend_without_status_reports_unverified() {
        let (c, switch, pause) = controller(vec![None], false);

        let outcome = c.turn_on(port(3)).unwrap();

        assert_eq!(outcome, PowerOutcome::Unverified);
        assert_eq!(*switch.commands.borrow(), vec!["ON 3", "STATUS 3"]);
        assert!(pause.pauses.borrow().is_empty());
    }

    #[test]
    fn failed_command_is_not_followed_by_status_checks() {
        let (c, switch, _pause) = controller(vec![Some(PowerState::On)], true);

        assert!(c.turn_on(port(3)).is_err());
        assert_eq!(*switch.commands.borrow(), vec!["ON 3"]);
    }

    #[test]
    fn missing_port_is_a_no_op() {
        let (c, switch, pause) = controller(vec![], true);

        assert_eq!(c.turn_on(None).unwrap(), PowerOutcome::Skipped);
        assert_eq!(c.turn_off(None).unwrap(), PowerOutcome::Skipped);
        assert_eq!(c.cycle(None).unwrap(), PowerOutcome::Skipped);
        assert!(switch.commands.borrow().is_empty());
        assert!(pause.pauses.borrow().is_empty());
    }

    #[test]
    fn cycle_delegates_to_backend() {
        let (c, switch, _pause) = controller(vec![], false);

        assert_eq!(c.cycle(port(4)).unwrap(), PowerOutcome::Cycled);
        assert_eq!(*switch.commands.borrow(), vec!["CYCLE 4"]);
    }
}
