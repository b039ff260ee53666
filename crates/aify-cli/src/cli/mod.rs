pub mod args;
pub mod commands;
pub mod output;
pub mod render;
pub mod repl;
pub mod setup;

pub use args::{Cli, Commands};
pub use commands::run;
pub use setup::resolve_config;
