use chrono::Utc;

use crate::error::{ProbeError, ReportError, RestartLaunchError};
use crate::models::{MonitoredProcess, ProcessState, RestartDecision, StatusRecord};
use crate::services::almanac::Almanac;
use crate::services::launcher::Launcher;
use crate::services::process_checker::LivenessProbe;
use crate::services::restart_policy::should_restart;
use crate::services::status_reporter::StatusStore;

/// 单个进程本轮的检查结果
#[derive(Debug)]
pub enum CheckOutcome {
    /// 不在运行时间窗内：不探测、不上报、不重启
    OutsideWindow,
    /// 无法枚举进程表，不上报为 DOWN
    ProbeFailed(ProbeError),
    Checked {
        state: ProcessState,
        report: Result<(), ReportError>,
        decision: RestartDecision,
        launch: Option<Result<u32, RestartLaunchError>>,
    },
}

impl CheckOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            CheckOutcome::OutsideWindow => false,
            CheckOutcome::ProbeFailed(_) => true,
            CheckOutcome::Checked { report, launch, .. } => {
                report.is_err() || matches!(launch, Some(Err(_)))
            }
        }
    }
}

#[derive(Debug)]
pub struct ProcessReport {
    pub identifier: String,
    pub outcome: CheckOutcome,
}

#[derive(Debug)]
pub struct CycleSummary {
    pub site_id: String,
    pub checked_at: chrono::DateTime<Utc>,
    pub processes: Vec<ProcessReport>,
}

impl CycleSummary {
    pub fn failures(&self) -> usize {
        self.processes.iter().filter(|p| p.outcome.is_failure()).count()
    }
}

/// 一次巡检：时间窗 → 探活 → 上报 → 重启判断 → 启动
pub struct Supervisor<'a, P, S, L, A> {
    site_id: String,
    processes: &'a [MonitoredProcess],
    probe: P,
    store: S,
    launcher: L,
    almanac: A,
}

impl<'a, P, S, L, A> Supervisor<'a, P, S, L, A>
where
    P: LivenessProbe,
    S: StatusStore,
    L: Launcher,
    A: Almanac,
{
    pub fn new(
        site_id: impl Into<String>,
        processes: &'a [MonitoredProcess],
        probe: P,
        store: S,
        launcher: L,
        almanac: A,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            processes,
            probe,
            store,
            launcher,
            almanac,
        }
    }

    pub fn run_cycle(&self) -> CycleSummary {
        let now = self.almanac.current_local_time();
        let checked_at = now.with_timezone(&Utc);

        let processes = self
            .processes
            .iter()
            .map(|process| ProcessReport {
                identifier: process.identifier.clone(),
                outcome: self.check(process, now),
            })
            .collect();

        CycleSummary {
            site_id: self.site_id.clone(),
            checked_at,
            processes,
        }
    }

    fn check(
        &self,
        process: &MonitoredProcess,
        now: chrono::DateTime<chrono::FixedOffset>,
    ) -> CheckOutcome {
        let window_active = process.window_active(now.time());
        if !window_active {
            log::debug!(
                "{} outside its window {}, skipping",
                process.identifier,
                process.window.map(|w| w.to_string()).unwrap_or_default()
            );
            return CheckOutcome::OutsideWindow;
        }

        let running = match self.probe.is_running(&process.identifier) {
            Ok(running) => running,
            Err(e) => {
                log::error!("❌ Cannot probe {}: {}", process.identifier, e);
                return CheckOutcome::ProbeFailed(e);
            }
        };
        let state = ProcessState::from_running(running);
        log::info!("{} {}", process.identifier, state);

        let record = StatusRecord {
            process: process.identifier.clone(),
            site_id: self.site_id.clone(),
            state,
            checked_at: self.almanac.current_local_time().with_timezone(&Utc),
        };
        let report = self.store.upsert_status(&record);
        if let Err(e) = &report {
            log::error!("❌ Failed to report {} status: {}", process.identifier, e);
        }

        let decision = should_restart(process, running, window_active, now, &self.almanac);
        let launch = match (&process.launch, decision.attempt) {
            (Some(spec), true) => {
                log::info!("🔄 Restarting {}: {}", process.identifier, spec.command);
                let result = self.launcher.start_background(spec);
                match &result {
                    Ok(pid) => log::info!(
                        "✓ Started {} as PID {} (log {})",
                        process.identifier,
                        pid,
                        spec.log.display()
                    ),
                    Err(e) => log::error!("❌ Failed to restart {}: {}", process.identifier, e),
                }
                Some(result)
            }
            _ => {
                if state == ProcessState::Down {
                    log::debug!("Not restarting {}: {}", process.identifier, decision.reason);
                }
                None
            }
        };

        CheckOutcome::Checked {
            state,
            report,
            decision,
            launch,
        }
    }
}
