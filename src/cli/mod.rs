pub mod args;
pub mod chat;
pub mod config;
pub mod send;
pub mod train;

pub use args::{Cli, CliCommand};
pub use chat::handle_chat_command;
pub use config::handle_config_command;
pub use send::handle_send_command;
pub use train::handle_train_command;
