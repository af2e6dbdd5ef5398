use prometheus::{
    register_gauge_vec_with_registry, register_gauge_with_registry, Encoder, Gauge, GaugeVec,
    Opts, Registry, TextEncoder,
};
use std::fs;
use std::path::Path;

use crate::models::ProcessState;
use crate::services::supervisor::{CheckOutcome, CycleSummary};

/// 单次巡检结果导出为 Prometheus 文本（node_exporter textfile collector）
pub struct MetricsRegistry {
    registry: Registry,

    pub process_up: GaugeVec,
    pub process_window_active: GaugeVec,
    pub process_restart_attempted: GaugeVec,
    pub process_restart_suppressed: GaugeVec,
    pub process_last_check_timestamp: GaugeVec,
    pub cycle_failures: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        // 定义通用的标签
        let common_labels = &["process", "site"];

        let process_up = register_gauge_vec_with_registry!(
            Opts::new("watchdog_process_up", "Process is running (1) or down (0)"),
            common_labels,
            registry
        )?;

        let process_window_active = register_gauge_vec_with_registry!(
            Opts::new(
                "watchdog_process_window_active",
                "Process is inside its operating window"
            ),
            common_labels,
            registry
        )?;

        let process_restart_attempted = register_gauge_vec_with_registry!(
            Opts::new(
                "watchdog_process_restart_attempted",
                "A restart was attempted in the last cycle"
            ),
            common_labels,
            registry
        )?;

        let process_restart_suppressed = register_gauge_vec_with_registry!(
            Opts::new(
                "watchdog_process_restart_suppressed",
                "Process is down but the restart policy declined to restart it"
            ),
            common_labels,
            registry
        )?;

        let process_last_check_timestamp = register_gauge_vec_with_registry!(
            Opts::new(
                "watchdog_process_last_check_timestamp_seconds",
                "Unix timestamp of last process check"
            ),
            common_labels,
            registry
        )?;

        let cycle_failures = register_gauge_with_registry!(
            Opts::new(
                "watchdog_cycle_failures",
                "Probe, report or restart failures in the last cycle"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            process_up,
            process_window_active,
            process_restart_attempted,
            process_restart_suppressed,
            process_last_check_timestamp,
            cycle_failures,
        })
    }

    pub fn record(&self, summary: &CycleSummary) {
        let checked_at = summary.checked_at.timestamp() as f64;

        for report in &summary.processes {
            let labels = &[report.identifier.as_str(), summary.site_id.as_str()];

            match &report.outcome {
                CheckOutcome::OutsideWindow => {
                    self.process_window_active.with_label_values(labels).set(0.0);
                }
                // 探测失败时不输出 up，避免被当成 DOWN
                CheckOutcome::ProbeFailed(_) => {
                    self.process_window_active.with_label_values(labels).set(1.0);
                }
                CheckOutcome::Checked {
                    state,
                    decision,
                    launch,
                    ..
                } => {
                    self.process_window_active.with_label_values(labels).set(1.0);
                    self.process_up
                        .with_label_values(labels)
                        .set(if *state == ProcessState::Up { 1.0 } else { 0.0 });
                    self.process_restart_attempted
                        .with_label_values(labels)
                        .set(if launch.is_some() { 1.0 } else { 0.0 });
                    let suppressed = *state == ProcessState::Down && !decision.attempt;
                    self.process_restart_suppressed
                        .with_label_values(labels)
                        .set(if suppressed { 1.0 } else { 0.0 });
                    self.process_last_check_timestamp
                        .with_label_values(labels)
                        .set(checked_at);
                }
            }
        }

        self.cycle_failures.set(summary.failures() as f64);
    }

    pub fn render(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// 先写临时文件再 rename，collector 不会读到半截文件
    pub fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        let text = self
            .render()
            .map_err(|e| anyhow::anyhow!("Failed to render metrics: {}", e))?;
        let tmp_path = path.with_extension("prom.tmp");
        fs::write(&tmp_path, text)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::models::{RestartDecision, RestartReason};
    use crate::services::supervisor::ProcessReport;
    use chrono::{TimeZone, Utc};

    fn summary() -> CycleSummary {
        CycleSummary {
            site_id: "low".into(),
            checked_at: Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap(),
            processes: vec![
                ProcessReport {
                    identifier: "main_scheduler.py".into(),
                    outcome: CheckOutcome::OutsideWindow,
                },
                ProcessReport {
                    identifier: "skyalert-logger.py".into(),
                    outcome: CheckOutcome::Checked {
                        state: ProcessState::Down,
                        report: Ok(()),
                        decision: RestartDecision::restart(),
                        launch: Some(Ok(77)),
                    },
                },
                ProcessReport {
                    identifier: "cloud-sensor.py".into(),
                    outcome: CheckOutcome::ProbeFailed(ProbeError::ProcessTableUnavailable),
                },
                ProcessReport {
                    identifier: "main_scheduler.py@dawn".into(),
                    outcome: CheckOutcome::Checked {
                        state: ProcessState::Down,
                        report: Ok(()),
                        decision: RestartDecision::skip(RestartReason::AfterSunrise),
                        launch: None,
                    },
                },
                ProcessReport {
                    identifier: "ftp-upload.py".into(),
                    outcome: CheckOutcome::Checked {
                        state: ProcessState::Up,
                        report: Ok(()),
                        decision: RestartDecision::skip(RestartReason::Healthy),
                        launch: None,
                    },
                },
            ],
        }
    }

    #[test]
    fn renders_cycle_summary() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record(&summary());
        let text = metrics.render().unwrap();

        assert!(text.contains(r#"watchdog_process_up{process="skyalert-logger.py",site="low"} 0"#));
        assert!(text.contains(r#"watchdog_process_up{process="ftp-upload.py",site="low"} 1"#));
        assert!(text.contains(
            r#"watchdog_process_restart_attempted{process="skyalert-logger.py",site="low"} 1"#
        ));
        assert!(text.contains(
            r#"watchdog_process_window_active{process="main_scheduler.py",site="low"} 0"#
        ));
        assert!(text.contains(
            r#"watchdog_process_restart_suppressed{process="main_scheduler.py@dawn",site="low"} 1"#
        ));
        assert!(text.contains(
            r#"watchdog_process_restart_suppressed{process="skyalert-logger.py",site="low"} 0"#
        ));
        assert!(text.contains(
            r#"watchdog_process_restart_suppressed{process="ftp-upload.py",site="low"} 0"#
        ));
        assert!(text.contains("watchdog_cycle_failures 1"));
        assert!(!text.contains(r#"watchdog_process_up{process="cloud-sensor.py""#));
        assert!(!text.contains(r#"watchdog_process_up{process="main_scheduler.py""#));
    }

    #[test]
    fn textfile_is_written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.prom");
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record(&summary());

        metrics.write_textfile(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("watchdog_process_last_check_timestamp_seconds"));
        assert!(!dir.path().join("watchdog.prom.tmp").exists());
    }
}
