mod cli;

pub use cli::{CommandArgs, Commands, PowerCommand};
