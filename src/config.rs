use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::models::{LaunchSpec, MonitoredProcess, RestartRule, TimeWindow};

/// watchdog 配置文件（TOML）
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub site_id: String,
    pub sun: Option<SunConfig>,
    pub tunnel: Option<TunnelConfig>,
    pub database: Option<DatabaseConfig>,
    #[serde(default, rename = "process")]
    pub processes: Vec<ProcessEntry>,
    pub power: Option<PowerConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SunConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TunnelConfig {
    pub bastion_host: String,
    #[serde(default = "default_ssh_port")]
    pub bastion_port: u16,
    pub user: String,
    pub identity_file: Option<PathBuf>,
    #[serde(default = "default_remote_host")]
    pub remote_host: String,
    #[serde(default = "default_mysql_port")]
    pub remote_port: u16,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
    /// ssh 程序及固定参数，例如 ["sshpass", "-f", "/etc/watchdog/pw", "ssh"]
    #[serde(default = "default_ssh_command")]
    pub ssh_command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessEntry {
    pub identifier: String,
    pub window: Option<TimeWindow>,
    pub launch: Option<String>,
    pub log: Option<PathBuf>,
    #[serde(default)]
    pub restart: RestartRule,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerConfig {
    #[serde(default = "default_true")]
    pub networked: bool,
    pub host: Option<String>,
    #[serde(default = "default_power_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub script: Vec<String>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_remote_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_ready_timeout() -> u64 {
    10
}

fn default_ssh_command() -> Vec<String> {
    vec!["ssh".to_string()]
}

fn default_table() -> String {
    "process_status".to_string()
}

fn default_true() -> bool {
    true
}

fn default_power_user() -> String {
    "admin".to_string()
}

/// 校验后的配置，组件构造时显式传入
#[derive(Debug, Clone)]
pub struct Config {
    pub site_id: String,
    pub sun: Option<SunConfig>,
    pub store: Option<(TunnelConfig, DatabaseConfig)>,
    pub processes: Vec<MonitoredProcess>,
    pub power: Option<PowerConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::validate(raw)
    }

    pub fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if raw.site_id.trim().is_empty() {
            return invalid("site_id must not be empty".into());
        }

        let store = match (raw.tunnel, raw.database) {
            (Some(tunnel), Some(database)) => {
                if tunnel.ssh_command.is_empty() {
                    return invalid("[tunnel] ssh_command must not be empty".into());
                }
                if !is_identifier(&database.table) {
                    return invalid(format!("table name `{}` is not a plain identifier", database.table));
                }
                Some((tunnel, database))
            }
            (None, Some(_)) => return invalid("[database] needs a [tunnel] section".into()),
            (_, None) => None,
        };

        let mut seen = HashSet::new();
        let mut processes = Vec::with_capacity(raw.processes.len());
        for entry in raw.processes {
            if entry.identifier.trim().is_empty() {
                return invalid("process identifier must not be empty".into());
            }
            if !seen.insert(entry.identifier.clone()) {
                return invalid(format!("process `{}` is listed twice", entry.identifier));
            }
            if entry.restart == RestartRule::UntilSunrise && raw.sun.is_none() {
                return invalid(format!(
                    "process `{}` restarts until sunrise but no [sun] location is set",
                    entry.identifier
                ));
            }

            let launch = match (entry.launch, entry.log) {
                (Some(command), Some(log)) => Some(LaunchSpec { command, log }),
                (Some(_), None) => {
                    return invalid(format!("process `{}` has launch but no log", entry.identifier))
                }
                (None, Some(_)) => {
                    return invalid(format!("process `{}` has log but no launch", entry.identifier))
                }
                (None, None) => None,
            };

            processes.push(MonitoredProcess {
                identifier: entry.identifier,
                window: entry.window,
                launch,
                restart: entry.restart,
            });
        }

        if let Some(power) = &raw.power {
            if power.networked && power.host.is_none() {
                return invalid("networked [power] needs a host".into());
            }
            if !power.networked && power.script.is_empty() {
                return invalid("legacy [power] needs a script command".into());
            }
        }

        Ok(Config {
            site_id: raw.site_id,
            sun: raw.sun,
            store,
            processes,
            power: raw.power,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::io::Write;

    const SITE: &str = r#"
site_id = "low"

[sun]
latitude = 40.11
longitude = -88.21

[tunnel]
bastion_host = "airglowgroup.web.illinois.edu"
user = "airglowgroup"
identity_file = "/home/airglow/.ssh/id_rsa"

[database]
name = "airglowgroup_sitestatus"
user = "airglow"
password = "hunter2"

[[process]]
identifier = "main_scheduler.py"
window = { start = "16:00", stop = "06:00" }
launch = "python3 /home/airglow/airglow/main_scheduler.py"
log = "/home/airglow/logs/scheduler.log"
restart = "until-sunrise"

[[process]]
identifier = "skyalert-logger.py"

[power]
host = "192.168.1.100"
password = "ionosphere"
"#;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        Config::validate(toml::from_str(text).unwrap())
    }

    #[test]
    fn full_site_config() {
        let config = parse(SITE).unwrap();

        assert_eq!(config.site_id, "low");
        assert_eq!(config.processes.len(), 2);

        let scheduler = &config.processes[0];
        assert_eq!(scheduler.identifier, "main_scheduler.py");
        assert_eq!(scheduler.restart, RestartRule::UntilSunrise);
        assert_eq!(
            scheduler.window,
            Some(TimeWindow::new(
                NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(6, 0, 0).unwrap()
            ))
        );
        assert!(scheduler.launch.is_some());

        let logger = &config.processes[1];
        assert_eq!(logger.window, None);
        assert_eq!(logger.launch, None);
        assert_eq!(logger.restart, RestartRule::Always);

        let (tunnel, database) = config.store.unwrap();
        assert_eq!(tunnel.bastion_port, 22);
        assert_eq!(tunnel.remote_port, 3306);
        assert_eq!(tunnel.ssh_command, vec!["ssh"]);
        assert_eq!(database.table, "process_status");

        let power = config.power.unwrap();
        assert!(power.networked);
        assert_eq!(power.user, "admin");
    }

    #[test]
    fn process_order_is_preserved() {
        let text = r#"
site_id = "x"
[[process]]
identifier = "c"
[[process]]
identifier = "a"
[[process]]
identifier = "b"
"#;
        let ids: Vec<_> = parse(text)
            .unwrap()
            .processes
            .into_iter()
            .map(|p| p.identifier)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn rejects_duplicates() {
        let text = "site_id = \"x\"\n[[process]]\nidentifier = \"a\"\n[[process]]\nidentifier = \"a\"\n";
        assert!(matches!(parse(text), Err(ConfigError::Invalid(m)) if m.contains("twice")));
    }

    #[test]
    fn rejects_launch_without_log() {
        let text = "site_id = \"x\"\n[[process]]\nidentifier = \"a\"\nlaunch = \"run-a\"\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn sunrise_rule_needs_location() {
        let text = "site_id = \"x\"\n[[process]]\nidentifier = \"a\"\nrestart = \"until-sunrise\"\n";
        assert!(matches!(parse(text), Err(ConfigError::Invalid(m)) if m.contains("[sun]")));
    }

    #[test]
    fn database_needs_tunnel() {
        let text = "site_id = \"x\"\n[database]\nname = \"db\"\nuser = \"u\"\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn table_name_must_be_identifier() {
        let text = r#"
site_id = "x"
[tunnel]
bastion_host = "h"
user = "u"
[database]
name = "db"
user = "u"
table = "status; DROP TABLE x"
"#;
        assert!(parse(text).is_err());
    }

    #[test]
    fn ssh_command_must_not_be_empty() {
        let text = r#"
site_id = "x"
[tunnel]
bastion_host = "h"
user = "u"
ssh_command = []
[database]
name = "db"
user = "u"
"#;
        assert!(matches!(parse(text), Err(ConfigError::Invalid(m)) if m.contains("ssh_command")));
    }

    #[test]
    fn legacy_power_needs_script() {
        let text = "site_id = \"x\"\n[power]\nnetworked = false\n";
        assert!(parse(text).is_err());
        let text = "site_id = \"x\"\n[power]\nnetworked = false\nscript = [\"perl\", \"pdu.pl\"]\n";
        assert!(parse(text).is_ok());
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "site_id = ").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SITE.as_bytes()).unwrap();
        assert_eq!(Config::load(file.path()).unwrap().processes.len(), 2);
    }
}
