pub mod cli;
pub mod load_config;
pub mod present;

pub use cli::{run, Cli};
