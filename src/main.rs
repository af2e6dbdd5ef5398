use anyhow::Context;
use clap::Parser;

mod cli;
mod config;
mod error;
mod metrics;
mod models;
mod power;
mod services;

use cli::{CommandArgs, Commands, PowerCommand};
use config::Config;
use metrics::MetricsRegistry;
use models::Port;
use power::PowerSwitchController;
use services::{
    Almanac, LocalClock, LogStatusStore, MysqlStatusStore, ProcessTableProbe, ShellLauncher,
    SolarAlmanac, StatusStore, Supervisor,
};

fn main() -> anyhow::Result<()> {
    let args = CommandArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    match args.command {
        Commands::Check { metrics_file } => {
            let summary = match config.sun {
                Some(sun) => run_check(&config, SolarAlmanac::new(sun.latitude, sun.longitude)),
                None => run_check(&config, LocalClock),
            };

            if summary.failures() > 0 {
                log::warn!(
                    "Cycle finished with {} failure(s) across {} process(es)",
                    summary.failures(),
                    summary.processes.len()
                );
            }

            if let Some(path) = metrics_file {
                let metrics = MetricsRegistry::new().context("registering metrics")?;
                metrics.record(&summary);
                metrics
                    .write_textfile(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }

        Commands::Power { action, port } => {
            let power = config
                .power
                .as_ref()
                .context("no [power] section in config")?;
            let controller = PowerSwitchController::from_config(power)?;
            let port = port.and_then(Port::new);

            // 结果和错误都已在 controller 里记录
            let result = match action {
                PowerCommand::On => controller.turn_on(port),
                PowerCommand::Off => controller.turn_off(port),
                PowerCommand::Cycle => controller.cycle(port),
            };
            result?;
        }

        Commands::Validate => print_table(&config),
    }

    Ok(())
}

fn run_check<A: Almanac>(config: &Config, almanac: A) -> services::supervisor::CycleSummary {
    let store: Box<dyn StatusStore> = match &config.store {
        Some((tunnel, database)) => {
            Box::new(MysqlStatusStore::new(tunnel.clone(), database.clone()))
        }
        None => {
            log::warn!("No [database] configured, status is only logged");
            Box::new(LogStatusStore)
        }
    };

    let supervisor = Supervisor::new(
        config.site_id.clone(),
        &config.processes,
        ProcessTableProbe,
        store.as_ref(),
        ShellLauncher,
        almanac,
    );
    supervisor.run_cycle()
}

fn print_table(config: &Config) {
    println!("Site: {}", config.site_id);
    println!();
    println!("{:<28} {:<13} {:<14} LAUNCH", "PROCESS", "WINDOW", "RESTART");
    for process in &config.processes {
        let window = process
            .window
            .map(|w| w.to_string())
            .unwrap_or_else(|| "always".to_string());
        let restart = format!("{:?}", process.restart);
        let launch = process
            .launch
            .as_ref()
            .map(|l| format!("{} > {}", l.command, l.log.display()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<28} {:<13} {:<14} {}",
            process.identifier, window, restart, launch
        );
    }
    println!();
    match &config.store {
        Some((tunnel, database)) => println!(
            "Status store: {}@{} via {}@{}:{}",
            database.name, tunnel.remote_host, tunnel.user, tunnel.bastion_host, tunnel.bastion_port
        ),
        None => println!("Status store: log only"),
    }
    match &config.power {
        Some(power) if power.networked => println!(
            "Power: networked switch at {}",
            power.host.as_deref().unwrap_or("?")
        ),
        Some(power) => println!("Power: legacy script `{}`", power.script.join(" ")),
        None => println!("Power: not configured"),
    }
}
