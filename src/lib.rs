pub mod clock;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod goals;
pub mod interfaces;
pub mod items;
pub mod lifecycle;
pub mod logging;
pub mod runtime_paths;
pub mod scheduler;
pub mod tasks;
pub mod theme;
pub mod timer;
pub mod views;
pub mod workspaces;

pub type Result<T> = std::result::Result<T, error::FidlyGridError>;
