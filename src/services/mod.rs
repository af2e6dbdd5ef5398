pub mod almanac;
pub mod launcher;
pub mod process_checker;
pub mod restart_policy;
pub mod status_reporter;
pub mod supervisor;
pub mod time_window;
pub mod tunnel;

pub use almanac::{Almanac, LocalClock, SolarAlmanac};
pub use launcher::ShellLauncher;
pub use process_checker::ProcessTableProbe;
pub use status_reporter::{LogStatusStore, MysqlStatusStore, StatusStore};
pub use supervisor::Supervisor;
