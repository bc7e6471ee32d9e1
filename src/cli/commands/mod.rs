//! CLI command handlers

pub mod clean;
pub mod generate;
pub mod init;
pub mod sessions;
pub mod status;
