use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::Path;

/// The starter project, relative path → contents.
const SCAFFOLD: &[(&str, &str)] = &[
    ("config.toml", include_str!("../../scaffold/config.toml")),
    ("posts/hello-world.md", include_str!("../../scaffold/posts/hello-world.md")),
    ("posts/writing-posts.md", include_str!("../../scaffold/posts/writing-posts.md")),
    ("pages/about.md", include_str!("../../scaffold/pages/about.md")),
    ("pages/index.html", include_str!("../../scaffold/pages/index.html")),
    ("public/styles.css", include_str!("../../scaffold/public/styles.css")),
    ("templates/base.html", include_str!("../../scaffold/templates/base.html")),
    ("templates/page.html", include_str!("../../scaffold/templates/page.html")),
    ("templates/post.html", include_str!("../../scaffold/templates/post.html")),
    ("templates/pagination.html", include_str!("../../scaffold/templates/pagination.html")),
];

pub fn make_subcommand() -> Command {
    Command::new("new")
        .about("Create a new site in the given directory")
        .arg(
            Arg::new("directory")
                .value_name("DIR")
                .help("Directory to create")
                .required(true),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let dir = args
        .get_one::<String>("directory")
        .context("no directory given")?;
    create_site(Path::new(dir))
}

pub fn create_site(root: &Path) -> Result<()> {
    if root.exists() {
        anyhow::bail!("{} already exists", root.display());
    }

    log::info!(target: "press", "Creating new site in {:?}", root);

    for (rel, contents) in SCAFFOLD {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("could not create directory {}", parent.display()))?;
        }
        std::fs::write(&path, contents)
            .with_context(|| format!("could not write file {}", path.display()))?;
        log::info!(target: "press", "==> Creating {:?}", path);
    }

    log::info!(target: "press", "DONE");

    Ok(())
}
