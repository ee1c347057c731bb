//! `transitbox config`: read and edit `config.ini` one key at a time.

use clap::Subcommand;
use transitbox::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one value
    Get {
        /// Key as section.key, e.g. feed.interval_ms
        key: String,
    },

    /// Validate and store one value; an empty value clears optional keys
    Set {
        /// Key as section.key, e.g. feed.interval_ms
        key: String,
        value: String,
    },

    /// Print every setting
    List,

    /// Print the configuration file location
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let key = parse_key(&key)?;
            let config = ConfigFile::load().unwrap_or_default();
            println!("{}", display_value(&key.get(&config)));
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let key = parse_key(&key)?;
            let mut config = ConfigFile::load().unwrap_or_default();
            key.set(&mut config, &value)?;
            config.save()?;
            println!("{} = {}", key, display_value(&key.get(&config)));
            Ok(())
        }
        ConfigCommands::List => {
            list(&ConfigFile::load().unwrap_or_default());
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Run 'transitbox config list' for the valid keys.",
            key
        ))
    })
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn list(config: &ConfigFile) {
    let mut section = "";
    for key in ConfigKey::all() {
        if key.section() != section {
            if !section.is_empty() {
                println!();
            }
            section = key.section();
            println!("[{}]", section);
        }
        println!("  {} = {}", key.key_name(), display_value(&key.get(config)));
    }
}
