//! 命令定义和实现

pub mod config;
pub mod goto;
pub mod monitor;
pub mod r#move;
pub mod ports;
pub mod query;
pub mod stop;
pub mod track;

pub use config::ConfigCommand;
pub use goto::GotoCommand;
pub use monitor::MonitorCommand;
pub use r#move::MoveCommand;
pub use query::QueryCommand;
pub use stop::StopCommand;
pub use track::TrackCommand;
