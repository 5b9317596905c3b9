//! Scopevar - Command-line template resolution
//!
//! Builds a global variable scope from a settings file and `--variable`
//! options, then substitutes `${...}` references in the given templates.

pub mod cli;
pub mod error;
pub mod settings;

pub use cli::{Cli, Mode, run};
pub use error::{AppError, AppResult};
pub use settings::load_settings;
