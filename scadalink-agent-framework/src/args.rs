//! Command line for agent binaries: a config path and a log level override.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::builder::PossibleValuesParser;
use clap::{CommandFactory, FromArgMatches, Parser};

use scadalink_common::LoggingConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Parser, Debug, Clone)]
#[command(about = "ScadaLink field data-collection agent")]
pub struct AgentArgs {
    /// Path to the agent's json5 configuration.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Log level, overriding `logging.level` from the config file.
    #[arg(long, value_parser = PossibleValuesParser::new(LOG_LEVELS))]
    pub log_level: Option<String>,
}

impl AgentArgs {
    /// Parse the process arguments for agent `name`, falling back to
    /// `default_config` when `--config` is absent. Exits on bad input.
    pub fn parse_for(name: &'static str, default_config: &'static str) -> Self {
        Self::try_parse_for(name, default_config, std::env::args_os())
            .unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_for<I, T>(
        name: &'static str,
        default_config: &'static str,
        argv: I,
    ) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command()
            .name(name)
            .version(env!("CARGO_PKG_VERSION"))
            .mut_arg("config", |arg| arg.default_value(default_config))
            .try_get_matches_from(argv)?;
        Self::from_arg_matches(&matches)
    }

    /// Logging settings from the config file with the CLI level applied.
    pub fn logging(&self, from_config: &LoggingConfig) -> LoggingConfig {
        match &self.log_level {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..from_config.clone()
            },
            None => from_config.clone(),
        }
    }
}
