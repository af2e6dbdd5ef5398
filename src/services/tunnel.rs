use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::TunnelConfig;
use crate::error::ReportError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `ssh -N -L` 端口转发，Drop 时关闭
pub struct SshTunnel {
    child: Child,
    local_port: u16,
}

impl SshTunnel {
    pub fn open(config: &TunnelConfig) -> Result<Self, ReportError> {
        let fail = |reason: String| ReportError::Tunnel {
            host: config.bastion_host.clone(),
            reason,
        };

        let local_port = free_local_port().map_err(|e| fail(format!("no free local port: {}", e)))?;

        let (program, fixed_args) = config
            .ssh_command
            .split_first()
            .ok_or_else(|| fail("ssh_command is empty".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(fixed_args)
            .arg("-N")
            .args(["-o", "BatchMode=yes"])
            .args(["-o", "ExitOnForwardFailure=yes"])
            .arg("-p")
            .arg(config.bastion_port.to_string())
            .arg("-L")
            .arg(format!(
                "{}:{}:{}",
                local_port, config.remote_host, config.remote_port
            ));
        if let Some(identity) = &config.identity_file {
            command.arg("-i").arg(identity);
        }
        command
            .arg(format!("{}@{}", config.user, config.bastion_host))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command
            .spawn()
            .map_err(|e| fail(format!("cannot run {}: {}", program, e)))?;

        // 先构造 guard，后面任何失败都会在 Drop 里杀掉 ssh
        let mut tunnel = SshTunnel { child, local_port };
        tunnel.wait_ready(Duration::from_secs(config.ready_timeout_secs), fail)?;

        log::debug!(
            "Tunnel 127.0.0.1:{} -> {}:{} via {} is up",
            local_port,
            config.remote_host,
            config.remote_port,
            config.bastion_host
        );
        Ok(tunnel)
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    fn wait_ready<F>(&mut self, timeout: Duration, fail: F) -> Result<(), ReportError>
    where
        F: Fn(String) -> ReportError,
    {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.local_port));
        let deadline = Instant::now() + timeout;

        loop {
            if let Ok(Some(status)) = self.child.try_wait() {
                return Err(fail(format!("ssh exited early with {}", status)));
            }
            if TcpStream::connect_timeout(&addr, POLL_INTERVAL).is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(fail(format!("port {} not ready after {:?}", self.local_port, timeout)));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("ssh tunnel already gone: {}", e);
        }
        let _ = self.child.wait();
    }
}

fn free_local_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}
