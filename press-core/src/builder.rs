use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::assets::{AssetMap, publish_assets};
use crate::config::{Config, ConfigError};
use crate::frontmatter::FrontMatterError;
use crate::highlight::{Highlighter, UnknownTheme};
use crate::markdown::{MarkdownRenderer, RenderedMarkdown};
use crate::pages::walk_pages;
use crate::posts::{collect_posts, write_posts};
use crate::rss::emit_rss;
use crate::template::{TemplateError, TemplateRenderer};

#[derive(Debug)]
pub enum BuildError {
    Config(ConfigError),
    UnknownTheme(UnknownTheme),
    MissingDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    NotADirectory(PathBuf),
    InvalidPath(PathBuf),
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    FrontMatter {
        path: PathBuf,
        source: FrontMatterError,
    },
    MissingField {
        path: PathBuf,
        field: &'static str,
    },
    InvalidDate {
        path: PathBuf,
        value: String,
        source: chrono::ParseError,
    },
    InvalidFormat(PathBuf),
    Template {
        name: String,
        source: TemplateError,
    },
    DuplicateOutput {
        path: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
    Processing {
        path: PathBuf,
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Wraps the error with the source file being processed.
    pub fn processing(self, path: &Path) -> Self {
        BuildError::Processing {
            path: path.to_path_buf(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping `Processing` wrappers.
    pub fn root(&self) -> &BuildError {
        match self {
            BuildError::Processing { source, .. } => source.root(),
            other => other,
        }
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Config(_) => write!(f, "invalid configuration"),
            BuildError::UnknownTheme(_) => write!(f, "could not set up syntax highlighting"),
            BuildError::MissingDirectory { path, .. } => {
                write!(f, "directory {} does not exist", path.display())
            }
            BuildError::NotADirectory(path) => write!(f, "{} is not a directory", path.display()),
            BuildError::InvalidPath(path) => write!(f, "invalid path: {}", path.display()),
            BuildError::Io { action, path, .. } => write!(f, "{} {}", action, path.display()),
            BuildError::Walk { path, .. } => write!(f, "could not walk {}", path.display()),
            BuildError::FrontMatter { path, .. } => {
                write!(f, "invalid front matter in {}", path.display())
            }
            BuildError::MissingField { path, field } => {
                write!(f, "required field not found: {:?} in {}", field, path.display())
            }
            BuildError::InvalidDate { path, value, .. } => write!(
                f,
                "invalid date {:?} in {}, expected YYYY-MM-DD",
                value,
                path.display()
            ),
            BuildError::InvalidFormat(path) => write!(f, "invalid file format: {}", path.display()),
            BuildError::Template { name, .. } => write!(f, "could not render template {:?}", name),
            BuildError::DuplicateOutput { path, first, second } => write!(
                f,
                "{} and {} both write to {}",
                first.display(),
                second.display(),
                path.display()
            ),
            BuildError::Processing { path, .. } => write!(f, "error processing {}", path.display()),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Config(e) => Some(e),
            BuildError::UnknownTheme(e) => Some(e),
            BuildError::MissingDirectory { source, .. } => Some(source),
            BuildError::Io { source, .. } => Some(source),
            BuildError::Walk { source, .. } => Some(source),
            BuildError::FrontMatter { source, .. } => Some(source),
            BuildError::InvalidDate { source, .. } => Some(source),
            BuildError::Template { source, .. } => Some(source),
            BuildError::Processing { source, .. } => Some(source.as_ref()),
            BuildError::NotADirectory(_)
            | BuildError::InvalidPath(_)
            | BuildError::MissingField { .. }
            | BuildError::InvalidFormat(_)
            | BuildError::DuplicateOutput { .. } => None,
        }
    }
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        BuildError::Config(err)
    }
}

impl From<UnknownTheme> for BuildError {
    fn from(err: UnknownTheme) -> Self {
        BuildError::UnknownTheme(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub files: usize,
    pub elapsed: Duration,
}

/// State of a single build. A fresh context is created for every build, so
/// the template set and the file counter never leak between rebuilds.
pub struct BuildContext<'a> {
    pub config: &'a Config,
    pub output: PathBuf,
    pub templates: TemplateRenderer,
    markdown: &'a MarkdownRenderer,
    files: usize,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        config: &'a Config,
        markdown: &'a MarkdownRenderer,
        output: PathBuf,
    ) -> Result<Self, BuildError> {
        let dir = &config.directories.templates;
        let templates = TemplateRenderer::new(dir).map_err(|e| BuildError::Template {
            name: dir.display().to_string(),
            source: e,
        })?;

        Ok(Self {
            config,
            output,
            templates,
            markdown,
            files: 0,
        })
    }

    pub fn processing(&mut self, path: &Path) {
        self.files += 1;
        log::info!(target: "builder", "==> Processing {:?}", path);
    }

    pub fn files(&self) -> usize {
        self.files
    }

    pub fn render_markdown(
        &mut self,
        path: &Path,
        assets: &AssetMap,
    ) -> Result<RenderedMarkdown, BuildError> {
        self.markdown.render(path, assets, &mut self.templates)
    }
}

/// Builds a site from one validated configuration. Holds nothing mutable, so
/// it can be shared between the watcher and anything else that triggers
/// builds.
pub struct Builder {
    config: Config,
    markdown: MarkdownRenderer,
}

impl Builder {
    pub fn new(config: Config) -> Result<Self, BuildError> {
        let config = config.validate()?;
        let highlighter = Highlighter::new(
            config.highlight_theme(),
            config.build.line_numbers,
            config.build.highlight_classes,
        )?;

        Ok(Self {
            config,
            markdown: MarkdownRenderer::new(highlighter),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cleans the output directory and builds the whole site into it.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        self.build_into(&self.config.directories.output)
    }

    /// Builds into a staging directory next to the output and swaps it into
    /// place only once the build succeeded. The previous output stays
    /// untouched when the build fails.
    pub fn rebuild(&self) -> Result<BuildReport, BuildError> {
        let output = &self.config.directories.output;
        let staging = sibling(output, "staging")?;
        let old = sibling(output, "old")?;

        let result = self.build_into(&staging);
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                discard(&staging);
                return Err(e);
            }
        };

        remove_if_exists(&old)?;
        if output.exists() {
            rename(output, &old)?;
        }
        rename(&staging, output)?;
        remove_if_exists(&old)?;

        Ok(report)
    }

    fn build_into(&self, output: &Path) -> Result<BuildReport, BuildError> {
        let start = Instant::now();

        for dir in self.config.source_dirs() {
            check_dir(dir)?;
        }

        remove_if_exists(output)?;
        std::fs::create_dir_all(output).map_err(|e| BuildError::Io {
            action: "could not create directory",
            path: output.to_path_buf(),
            source: e,
        })?;

        log::info!(target: "builder", "Starting build...");

        let mut ctx = BuildContext::new(&self.config, &self.markdown, output.to_path_buf())?;
        let assets = publish_assets(&mut ctx)?;
        let posts = collect_posts(&mut ctx, &assets)?;
        write_posts(&mut ctx, &posts, &assets)?;
        walk_pages(&mut ctx, &assets, &posts)?;
        emit_rss(&mut ctx, &posts)?;

        let report = BuildReport {
            files: ctx.files(),
            elapsed: start.elapsed(),
        };
        log::info!(
            target: "builder",
            "Processed {} files in {:.2?}",
            report.files,
            report.elapsed
        );

        Ok(report)
    }
}

fn check_dir(path: &Path) -> Result<(), BuildError> {
    let meta = std::fs::metadata(path).map_err(|e| BuildError::MissingDirectory {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !meta.is_dir() {
        return Err(BuildError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// `build` → `.build.staging` in the same parent, so the final rename never
/// crosses filesystems.
fn sibling(output: &Path, suffix: &str) -> Result<PathBuf, BuildError> {
    let name = output
        .file_name()
        .ok_or_else(|| BuildError::InvalidPath(output.to_path_buf()))?;
    Ok(output.with_file_name(format!(".{}.{}", name.to_string_lossy(), suffix)))
}

fn remove_if_exists(path: &Path) -> Result<(), BuildError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::Io {
            action: "could not remove directory",
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Best-effort removal of a directory the caller no longer needs.
fn discard(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            target: "builder",
            "could not remove {}, it has to be deleted by hand: {}",
            path.display(),
            e
        ),
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), BuildError> {
    std::fs::rename(from, to).map_err(|e| BuildError::Io {
        action: "could not move directory",
        path: from.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use std::error::Error;

    #[test]
    fn test_processing_wraps_and_chains() {
        let inner = BuildError::MissingField {
            path: "posts/a.md".into(),
            field: "date",
        };
        let err = inner.processing(Path::new("posts/a.md"));

        assert_eq!(err.to_string(), "error processing posts/a.md");
        assert!(err.source().unwrap().to_string().contains("required field not found"));
        assert!(matches!(err.root(), BuildError::MissingField { field: "date", .. }));
    }

    #[test]
    fn test_sibling_names() {
        assert_eq!(
            sibling(Path::new("site/build"), "staging").unwrap(),
            PathBuf::from("site/.build.staging")
        );
        assert!(sibling(Path::new("/"), "old").is_err());
    }

    #[test]
    fn test_discard_removes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join(".build.staging");
        std::fs::create_dir_all(staging.join("posts")).unwrap();
        std::fs::write(staging.join("posts/a.html"), "a").unwrap();

        discard(&staging);
        assert!(!staging.exists());

        discard(&staging);
        assert!(!staging.exists());
    }

    #[test]
    fn test_unknown_theme_fails_early() {
        let mut config = test_config();
        config.build.highlight_theme = Some("no-such-theme".into());

        assert!(matches!(Builder::new(config), Err(BuildError::UnknownTheme(_))));
    }

    #[test]
    fn test_invalid_config_fails_early() {
        let mut config = test_config();
        config.site.url = String::new();

        assert!(matches!(
            Builder::new(config),
            Err(BuildError::Config(ConfigError::RequiredField("site.url")))
        ));
    }

    #[test]
    fn test_missing_source_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.directories.templates = dir.path().join("templates");
        config.directories.pages = dir.path().join("pages");
        config.directories.public = dir.path().join("public");
        config.directories.posts = Some(dir.path().join("posts"));
        config.directories.output = dir.path().join("build");

        let err = Builder::new(config).unwrap().build().unwrap_err();
        assert!(matches!(err, BuildError::MissingDirectory { .. }));
    }
}
