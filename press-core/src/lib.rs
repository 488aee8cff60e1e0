pub mod assets;
pub mod builder;
pub mod config;
pub mod frontmatter;
pub mod highlight;
pub mod markdown;
pub mod minify;
pub mod pages;
pub mod posts;
pub mod rss;
pub mod template;
pub mod walk;

// Re-export main types
pub use assets::AssetMap;
pub use builder::{BuildError, BuildReport, Builder};
pub use config::{Config, ConfigError};
pub use posts::Post;
pub use template::{TemplateError, TemplateRenderer};
