use colored::Colorize;
use env_logger::{Builder, Env};
use std::io::Write;

/// `HH:MM:SS target message`, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
    let logging_env = Env::default().filter_or("RUST_LOG", "info");
    Builder::from_env(logging_env)
        .format(|buf, record| {
            let target = record.target().to_ascii_lowercase();
            let target = match record.level() {
                log::Level::Error => target.bold().red(),
                log::Level::Warn => target.bold().yellow(),
                _ => target.bold().bright_yellow(),
            };

            writeln!(
                buf,
                "{} {} {}",
                chrono::Local::now().format("%H:%M:%S").to_string().dimmed(),
                target,
                record.args()
            )
        })
        .init();
}
