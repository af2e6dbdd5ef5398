use regex::Regex;
use sysinfo::{Pid, Process, ProcessesToUpdate, System};

use crate::error::ProbeError;

/// 进程存活探测
pub trait LivenessProbe {
    fn is_running(&self, pattern: &str) -> Result<bool, ProbeError>;
}

/// 通过 sysinfo 枚举进程表，按命令行匹配（语义同 `pgrep -f`）
#[derive(Debug, Default)]
pub struct ProcessTableProbe;

impl LivenessProbe for ProcessTableProbe {
    fn is_running(&self, pattern: &str) -> Result<bool, ProbeError> {
        let pids = get_all_matching_pids(pattern)?;
        log::debug!("Pattern '{}' matched PIDs {:?}", pattern, pids);
        Ok(!pids.is_empty())
    }
}

/// 命令行匹配器：优先正则，正则无效时退回字符串包含匹配
enum Matcher {
    Regex(Regex),
    Literal(String),
}

impl Matcher {
    fn new(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(r) => Matcher::Regex(r),
            Err(_) => Matcher::Literal(pattern.to_string()),
        }
    }

    fn is_match(&self, cmdline: &str) -> bool {
        match self {
            Matcher::Regex(r) => r.is_match(cmdline),
            Matcher::Literal(s) => cmdline.contains(s.as_str()),
        }
    }
}

fn cmdline(process: &Process) -> String {
    process
        .cmd()
        .iter()
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 获取所有匹配的进程 PIDs（排除自身）
pub fn get_all_matching_pids(pattern: &str) -> Result<Vec<u32>, ProbeError> {
    let mut sys = System::new_all();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    // 正常系统上至少能看到自己；空表说明 /proc 读不了
    if sys.processes().is_empty() {
        return Err(ProbeError::ProcessTableUnavailable);
    }

    let own_pid = sysinfo::get_current_pid().ok();
    let table = sys
        .processes()
        .iter()
        .filter(|(_, process)| process.thread_kind().is_none())
        .map(|(pid, process)| (*pid, cmdline(process)));

    Ok(matching_pids(pattern, table, own_pid))
}

fn matching_pids<I>(pattern: &str, table: I, own_pid: Option<Pid>) -> Vec<u32>
where
    I: IntoIterator<Item = (Pid, String)>,
{
    let matcher = Matcher::new(pattern);

    let mut pids: Vec<u32> = table
        .into_iter()
        .filter(|(pid, _)| Some(*pid) != own_pid)
        .filter(|(_, cmd)| matcher.is_match(cmd))
        .map(|(pid, _)| pid.as_u32())
        .collect();

    pids.sort();
    pids
}
