pub mod commands;
pub mod config;
pub mod package;
pub mod plugin;
pub mod runtime;
pub mod vcs;
