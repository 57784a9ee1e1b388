pub mod cli;
pub mod load_config;
pub mod upload;

pub use cli::{execute, run, Cli};
