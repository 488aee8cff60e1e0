use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::assets::AssetMap;
use crate::builder::{BuildContext, BuildError};
use crate::config::ConfigError;
use crate::frontmatter::FrontMatter;
use crate::template::RenderContext;
use crate::walk::{mkdir, url_path, walk_flat};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub content: String,
    /// Site-relative URL, `/posts/first.html`.
    pub path: String,
    /// `site.url` followed by `path`.
    pub url: String,
    #[serde(skip)]
    pub source: PathBuf,
    #[serde(skip)]
    pub output: PathBuf,
    pub front_matter: FrontMatter,
}

/// What a post template sees of its neighbours.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostLink {
    pub title: String,
    pub path: String,
    pub url: String,
    pub date: NaiveDate,
}

impl From<&Post> for PostLink {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            path: post.path.clone(),
            url: post.url.clone(),
            date: post.date,
        }
    }
}

/// Renders every Markdown file under the posts directory and returns the
/// posts newest first. Nothing is written yet.
pub fn collect_posts(ctx: &mut BuildContext<'_>, assets: &AssetMap) -> Result<Vec<Post>, BuildError> {
    let Some(root) = ctx.config.directories.posts.clone() else {
        return Ok(Vec::new());
    };
    if !root.exists() {
        log::info!(target: "builder", "No posts directory at {:?}", root);
        return Ok(Vec::new());
    }

    let out_name = posts_dir_name(&root)?;
    let mut posts = Vec::new();
    let mut outputs: HashMap<PathBuf, PathBuf> = HashMap::new();

    for entry in walk_flat(&root) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        ctx.processing(path);

        if path.extension().is_none_or(|ext| ext != "md") {
            log::info!(target: "builder", "SKIPPED {:?}", path);
            continue;
        }

        let post = read_post(ctx, path, &out_name, assets).map_err(|e| e.processing(path))?;
        if let Some(first) = outputs.insert(post.output.clone(), path.to_path_buf()) {
            return Err(BuildError::DuplicateOutput {
                path: post.output,
                first,
                second: path.to_path_buf(),
            });
        }
        posts.push(post);
    }

    sort_posts(&mut posts);
    Ok(posts)
}

/// Newest first; posts sharing a date keep their walk order.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
}

fn read_post(
    ctx: &mut BuildContext<'_>,
    path: &Path,
    out_name: &str,
    assets: &AssetMap,
) -> Result<Post, BuildError> {
    let rendered = ctx.render_markdown(path, assets)?;
    let front_matter = rendered.front_matter;

    let title = front_matter
        .title
        .clone()
        .ok_or_else(|| BuildError::MissingField {
            path: path.to_path_buf(),
            field: "title",
        })?;
    let raw_date = front_matter.date.as_deref().ok_or_else(|| BuildError::MissingField {
        path: path.to_path_buf(),
        field: "date",
    })?;
    let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|e| BuildError::InvalidDate {
        path: path.to_path_buf(),
        value: raw_date.to_string(),
        source: e,
    })?;
    let description = front_matter
        .description
        .clone()
        .unwrap_or_else(|| ctx.config.site.description.clone());

    let stem = path
        .file_stem()
        .ok_or_else(|| BuildError::InvalidPath(path.to_path_buf()))?
        .to_string_lossy();
    let rel = Path::new(out_name).join(format!("{}.html", stem));
    let site_path = url_path(&rel);

    Ok(Post {
        title,
        description,
        date,
        content: rendered.html,
        url: format!("{}{}", ctx.config.site.url.trim_end_matches('/'), site_path),
        path: site_path,
        source: path.to_path_buf(),
        output: ctx.output.join(rel),
        front_matter,
    })
}

/// Writes every post with its template. `prev` is the next older post and
/// `next` the next newer one.
pub fn write_posts(ctx: &mut BuildContext<'_>, posts: &[Post], assets: &AssetMap) -> Result<(), BuildError> {
    if posts.is_empty() {
        return Ok(());
    }

    let config = ctx.config;
    let Some(root) = config.directories.posts.as_deref() else {
        return Ok(());
    };
    mkdir(&ctx.output.join(posts_dir_name(root)?))?;

    let default = config
        .defaults
        .post_template
        .as_deref()
        .ok_or(BuildError::Config(ConfigError::RequiredField("defaults.post_template")))?;

    for (i, post) in posts.iter().enumerate() {
        let prev = posts.get(i + 1).map(PostLink::from);
        let next = i.checked_sub(1).and_then(|j| posts.get(j)).map(PostLink::from);

        let context = RenderContext::new()
            .with("site", &config.site)
            .with("assets", assets)
            .with("post", post)
            .with("title", &post.title)
            .with("page_title", &page_title(&config.site.title, Some(post.title.as_str())))
            .with("description", &post.description)
            .with("date", &post.date)
            .with("content", &post.content)
            .with("path", &post.path)
            .with("url", &post.url)
            .with("meta", &post.front_matter.extra)
            .with("prev", &prev)
            .with("next", &next);

        let template = ctx
            .templates
            .resolve_template(default, &post.front_matter)
            .map_err(|e| BuildError::Template {
                name: post.front_matter.template.clone().unwrap_or_else(|| default.to_string()),
                source: e,
            })
            .map_err(|e| e.processing(&post.source))?;

        ctx.templates
            .write_template(template, &post.output, context.as_tera())
            .map_err(|e| BuildError::Template {
                name: template.to_string(),
                source: e,
            })
            .map_err(|e| e.processing(&post.source))?;
    }

    Ok(())
}

/// `"{site} | {page}"` when the page has a title, else just the site title.
pub fn page_title(site_title: &str, title: Option<&str>) -> String {
    match title {
        Some(title) if !title.is_empty() => format!("{} | {}", site_title, title),
        _ => site_title.to_string(),
    }
}

fn posts_dir_name(root: &Path) -> Result<String, BuildError> {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BuildError::InvalidPath(root.to_path_buf()))
}
