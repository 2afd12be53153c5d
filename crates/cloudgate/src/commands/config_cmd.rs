//! Config subcommand handlers.

use cloudgate_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::AppError;

pub fn handle(args: &ConfigArgs, config: &Config, global: &GlobalOpts) -> Result<(), AppError> {
    match args.command {
        ConfigCommand::Show => {
            print!("{}", config.redacted().to_toml()?);
        }
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(cloudgate_config::config_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
