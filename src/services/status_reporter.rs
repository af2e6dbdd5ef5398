use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, TxOpts};
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::config::{DatabaseConfig, TunnelConfig};
use crate::error::ReportError;
use crate::models::StatusRecord;
use crate::services::tunnel::SshTunnel;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// 远程状态库：按 (process, site_id) upsert
pub trait StatusStore {
    fn upsert_status(&self, record: &StatusRecord) -> Result<(), ReportError>;
}

impl<T: StatusStore + ?Sized> StatusStore for &T {
    fn upsert_status(&self, record: &StatusRecord) -> Result<(), ReportError> {
        (**self).upsert_status(record)
    }
}

/// 经 SSH 隧道写 MySQL，每次调用独立建连、提交、释放
pub struct MysqlStatusStore {
    tunnel: TunnelConfig,
    database: DatabaseConfig,
}

impl MysqlStatusStore {
    pub fn new(tunnel: TunnelConfig, database: DatabaseConfig) -> Self {
        Self { tunnel, database }
    }
}

pub fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (process_name, site_id, status, last_checked) \
         VALUES (?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE status = VALUES(status), last_checked = VALUES(last_checked)",
        table
    )
}

impl StatusStore for MysqlStatusStore {
    fn upsert_status(&self, record: &StatusRecord) -> Result<(), ReportError> {
        // 声明顺序保证连接先于隧道释放
        let tunnel = SshTunnel::open(&self.tunnel)?;

        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(Ipv4Addr::LOCALHOST.to_string()))
            .tcp_port(tunnel.local_port())
            .user(Some(self.database.user.as_str()))
            .pass(self.database.password.as_deref())
            .db_name(Some(self.database.name.as_str()))
            .tcp_connect_timeout(Some(CONNECT_TIMEOUT));
        let mut conn = Conn::new(opts).map_err(ReportError::Connect)?;

        let mut tx = conn
            .start_transaction(TxOpts::default())
            .map_err(ReportError::Write)?;
        tx.exec_drop(
            upsert_sql(&self.database.table),
            (
                record.process.as_str(),
                record.site_id.as_str(),
                record.state.as_flag(),
                record.checked_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            ),
        )
        .map_err(ReportError::Write)?;
        tx.commit().map_err(ReportError::Commit)?;

        log::debug!(
            "Upserted {} = {} for site {}",
            record.process,
            record.state,
            record.site_id
        );
        Ok(())
    }
}

/// 没有配置数据库时只记日志
#[derive(Debug, Default)]
pub struct LogStatusStore;

impl StatusStore for LogStatusStore {
    fn upsert_status(&self, record: &StatusRecord) -> Result<(), ReportError> {
        log::info!(
            "{} {} ({}) at {}",
            record.process,
            record.state.as_flag(),
            record.site_id,
            record.checked_at.to_rfc3339()
        );
        Ok(())
    }
}
