use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use crate::models::{Port, PowerAction, PowerState};

/// 进程表无法枚举（基础设施故障，不能当作 DOWN 处理）
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("process table is empty or unreadable")]
    ProcessTableUnavailable,
}

/// 状态上报失败：隧道、连接或写入
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("ssh tunnel to {host} failed: {reason}")]
    Tunnel { host: String, reason: String },

    #[error("could not connect to status database: {0}")]
    Connect(#[source] mysql::Error),

    #[error("status upsert failed: {0}")]
    Write(#[source] mysql::Error),

    #[error("status commit failed: {0}")]
    Commit(#[source] mysql::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RestartLaunchError {
    #[error("cannot open restart log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PowerCommandError {
    #[error("power switch request `{action}` on port {port} failed: {source}")]
    Http {
        action: PowerAction,
        port: Port,
        #[source]
        source: reqwest::Error,
    },

    #[error("power switch answered {status} to `{action}` on port {port}")]
    Rejected {
        action: PowerAction,
        port: Port,
        status: reqwest::StatusCode,
    },

    #[error("unreadable state for port {port}: {body:?}")]
    BadState { port: Port, body: String },

    #[error("could not run power script for `{action}` on port {port}: {source}")]
    Spawn {
        action: PowerAction,
        port: Port,
        #[source]
        source: io::Error,
    },

    #[error("power script `{action}` on port {port} exited with {status}")]
    Script {
        action: PowerAction,
        port: Port,
        status: ExitStatus,
    },

    #[error("port {port} did not reach {expected} (last seen {observed})")]
    NotConfirmed {
        port: Port,
        expected: PowerState,
        observed: PowerState,
    },

    #[error("cycle of port {port} aborted while switching {stage}: {source}")]
    CycleAborted {
        port: Port,
        stage: PowerState,
        #[source]
        source: Box<PowerCommandError>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
