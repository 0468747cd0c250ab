pub mod commands;
pub mod logging;
pub mod message;
pub mod printer;
pub mod process_command;
pub mod version;
