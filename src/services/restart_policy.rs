use chrono::{DateTime, FixedOffset};

use crate::models::{MonitoredProcess, RestartDecision, RestartReason, RestartRule};
use crate::services::almanac::Almanac;

/// 判断挂掉的进程是否应该重启（纯判断，不启动任何东西）
pub fn should_restart<A: Almanac + ?Sized>(
    process: &MonitoredProcess,
    running: bool,
    window_active: bool,
    now: DateTime<FixedOffset>,
    almanac: &A,
) -> RestartDecision {
    if running {
        return RestartDecision::skip(RestartReason::Healthy);
    }

    if !window_active {
        return RestartDecision::skip(RestartReason::OutsideWindow);
    }

    if process.launch.is_none() {
        return RestartDecision::skip(RestartReason::NoLaunchCommand);
    }

    match process.restart {
        RestartRule::Always => RestartDecision::restart(),
        RestartRule::UntilSunrise => match almanac.daylight(now.date_naive()) {
            Some(daylight) if daylight.sun_is_up(&now) => {
                log::info!(
                    "Not restarting {}: sunrise was at {}, expected to be dormant",
                    process.identifier,
                    daylight.sunrise.with_timezone(now.offset()).format("%H:%M")
                );
                RestartDecision::skip(RestartReason::AfterSunrise)
            }
            Some(_) => RestartDecision::restart(),
            None => {
                log::warn!(
                    "No sunrise today for {}, restarting without daylight check",
                    process.identifier
                );
                RestartDecision::restart()
            }
        },
    }
}
