use std::fs;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use crate::error::RestartLaunchError;
use crate::models::LaunchSpec;

/// 后台启动进程，不等待
pub trait Launcher {
    fn start_background(&self, spec: &LaunchSpec) -> Result<u32, RestartLaunchError>;
}

/// `sh -c <command>`，输出追加到日志文件，放进独立进程组以便 watchdog 退出后继续运行
#[derive(Debug, Default)]
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    fn start_background(&self, spec: &LaunchSpec) -> Result<u32, RestartLaunchError> {
        let log_err = |source| RestartLaunchError::Log {
            path: spec.log.clone(),
            source,
        };

        if let Some(parent) = spec.log.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(log_err)?;
        }
        let stdout = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log)
            .map_err(log_err)?;
        let stderr = stdout.try_clone().map_err(log_err)?;

        let child = Command::new("sh")
            .arg("-c")
            .arg(&spec.command)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .process_group(0)
            .spawn()
            .map_err(|source| RestartLaunchError::Spawn {
                command: spec.command.clone(),
                source,
            })?;

        Ok(child.id())
    }
}
