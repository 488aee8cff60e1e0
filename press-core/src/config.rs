use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub const DEFAULT_HIGHLIGHT_THEME: &str = "base16-ocean.dark";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parsing(toml::de::Error),
    RequiredField(&'static str),
    NotPositive(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parsing(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::RequiredField(field) => {
                write!(f, "required field not found in config: {:?}", field)
            }
            ConfigError::NotPositive(field) => {
                write!(f, "int value must be greater than 0: {:?}", field)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parsing(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parsing(value)
    }
}

/// Everything one build needs, as read from `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub directories: DirectoriesConfig,
    pub defaults: DefaultsConfig,
    pub build: BuildOptions,
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&data)?;

        config.validate()
    }

    /// Checks required fields and normalizes the posts-related ones.
    ///
    /// When no posts directory is configured the post template, posts index
    /// and page size are meaningless, so they are cleared.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        normalize(&mut self.directories.posts);
        normalize(&mut self.defaults.post_template);
        normalize(&mut self.build.posts_index);
        normalize(&mut self.build.highlight_theme);

        if self.directories.posts.is_some() {
            if self.defaults.post_template.is_none() {
                return Err(ConfigError::RequiredField("defaults.post_template"));
            }
            if self.build.posts_index.is_none() {
                return Err(ConfigError::RequiredField("build.posts_index"));
            }
            if self.build.posts_per_page == 0 {
                return Err(ConfigError::NotPositive("build.posts_per_page"));
            }
        } else {
            self.defaults.post_template = None;
            self.build.posts_index = None;
            self.build.posts_per_page = 0;
        }

        let required: [(&'static str, bool); 8] = [
            ("site.title", self.site.title.is_empty()),
            ("site.description", self.site.description.is_empty()),
            ("site.url", self.site.url.is_empty()),
            ("directories.templates", is_empty_path(&self.directories.templates)),
            ("directories.pages", is_empty_path(&self.directories.pages)),
            ("directories.public", is_empty_path(&self.directories.public)),
            ("directories.output", is_empty_path(&self.directories.output)),
            ("defaults.page_template", self.defaults.page_template.is_empty()),
        ];

        if let Some((field, _)) = required.into_iter().find(|(_, missing)| *missing) {
            return Err(ConfigError::RequiredField(field));
        }

        Ok(self)
    }

    pub fn highlight_theme(&self) -> &str {
        self.build
            .highlight_theme
            .as_deref()
            .unwrap_or(DEFAULT_HIGHLIGHT_THEME)
    }

    /// Directories that must exist before a build starts.
    pub fn source_dirs(&self) -> Vec<&Path> {
        let mut dirs = Vec::with_capacity(4);
        if let Some(posts) = &self.directories.posts {
            dirs.push(posts.as_path());
        }
        dirs.push(self.directories.pages.as_path());
        dirs.push(self.directories.public.as_path());
        dirs.push(self.directories.templates.as_path());
        dirs
    }
}

fn normalize<T: AsRef<Path>>(value: &mut Option<T>) {
    if value.as_ref().is_some_and(|v| is_empty_path(v.as_ref())) {
        *value = None;
    }
}

fn is_empty_path(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub url: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DirectoriesConfig {
    pub templates: PathBuf,
    pub pages: PathBuf,
    pub posts: Option<PathBuf>,
    pub public: PathBuf,
    pub output: PathBuf,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DefaultsConfig {
    pub page_template: String,
    pub post_template: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BuildOptions {
    pub posts_index: Option<String>,
    pub posts_per_page: usize,
    pub highlight_theme: Option<String>,
    pub line_numbers: bool,
    pub highlight_classes: bool,
    pub rss: bool,
    /// Extensions whose files get a content hash spliced into their name.
    pub hash: Vec<String>,
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        site: SiteConfig {
            title: "test".into(),
            description: "my description".into(),
            url: "http://localhost".into(),
        },
        directories: DirectoriesConfig {
            templates: "templates".into(),
            pages: "pages".into(),
            posts: Some("posts".into()),
            public: "public".into(),
            output: "build".into(),
        },
        defaults: DefaultsConfig {
            page_template: "page.html".into(),
            post_template: Some("post.html".into()),
        },
        build: BuildOptions {
            posts_index: Some("index.html".into()),
            posts_per_page: 3,
            highlight_theme: None,
            line_numbers: false,
            highlight_classes: false,
            rss: true,
            hash: vec![".js".into(), ".css".into()],
        },
    }
}
