use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Site Watchdog - 无人值守站点的进程巡检与电源控制
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// 配置文件路径
    #[arg(
        short,
        long,
        env = "WATCHDOG_CONFIG",
        default_value = "/etc/site-watchdog/watchdog.toml"
    )]
    pub config: PathBuf,

    /// 输出 debug 日志
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 执行一轮进程巡检
    Check {
        /// 写出 Prometheus textfile
        #[arg(long, env = "WATCHDOG_METRICS_FILE")]
        metrics_file: Option<PathBuf>,
    },

    /// 控制电源插座
    Power {
        #[arg(value_enum)]
        action: PowerCommand,

        /// 插座编号（从 1 开始）；不给则什么都不做
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..))]
        port: Option<u8>,
    },

    /// 校验配置并打印进程表
    Validate,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerCommand {
    On,
    Off,
    Cycle,
}
