use std::fs::OpenOptions;

use simplelog::{ColorChoice, Config, TermLogger, TerminalMode, WriteLogger};

use crate::config::{DisplayTarget, RendererConfig};
use crate::error::Result;

/// Install the global logger. The terminal surface owns stdout, so there the
/// log goes to `config.log_file` instead of the console.
pub fn init(config: &RendererConfig) -> Result<()> {
    let to_file = config.target == DisplayTarget::Terminal && config.snapshot.is_none();
    if to_file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)?;
        WriteLogger::init(config.log_level, Config::default(), log_file)?;
    } else {
        TermLogger::init(
            config.log_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )?;
    }
    Ok(())
}
