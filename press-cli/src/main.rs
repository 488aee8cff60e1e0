mod cmd;
mod config;
mod logging;

use anyhow::Result;
use clap::Command;

fn cli() -> Command {
    Command::new("press")
        .about("A static site generator for Markdown blogs")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::serve::make_subcommand())
        .subcommand(cmd::new::make_subcommand())
        .subcommand(Command::new("version").about("Print the press version"))
}

#[tokio::main]
async fn main() {
    logging::init_logging();

    if let Err(e) = run().await {
        log::error!(target: "press", "{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args),
        Some(("serve", args)) => cmd::serve::execute(args).await,
        Some(("new", args)) => cmd::new::execute(args),
        Some(("version", _)) => {
            println!("press v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        _ => unreachable!("subcommand_required is set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_serve_flags() {
        let matches = cli()
            .try_get_matches_from(["press", "serve", "--port", "8080", "--open"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();

        assert_eq!(name, "serve");
        assert_eq!(args.get_one::<u16>("port"), Some(&8080));
        assert!(args.get_flag("open"));
    }

    #[test]
    fn test_new_requires_a_directory() {
        assert!(cli().try_get_matches_from(["press", "new"]).is_err());
    }
}
