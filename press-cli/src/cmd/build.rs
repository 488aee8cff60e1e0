use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use press_core::Builder;

use crate::config::{DEFAULT_CONFIG_FILE, PressConfig};

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory, overrides directories.output"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the site in the current directory")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = PressConfig::load(args)?;
    let output = config.site.directories.output.clone();

    let builder = Builder::new(config.site).context("failed to initialize")?;
    builder.build().context("build failed")?;

    log::info!(target: "press", "Site built in {}", output.display());

    Ok(())
}
