use std::ffi::OsStr;
use std::path::Path;

use serde::Serialize;

use crate::assets::AssetMap;
use crate::builder::{BuildContext, BuildError};
use crate::config::ConfigError;
use crate::minify::write_minified;
use crate::posts::{Post, page_title};
use crate::template::RenderContext;
use crate::walk::{mirror_dir, relative, url_path, walk};

/// Prefix of the names HTML pages take in the template set, apart from the
/// files of the templates directory.
const PAGE_TEMPLATE_PREFIX: &str = "@pages";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub prev: String,
    pub next: String,
}

/// Walks the pages directory. HTML pages are rendered as templates, the
/// posts index once per page of posts, and Markdown pages through the page
/// template.
pub fn walk_pages(ctx: &mut BuildContext<'_>, assets: &AssetMap, posts: &[Post]) -> Result<(), BuildError> {
    let root = ctx.config.directories.pages.clone();
    let index_name = ctx
        .config
        .build
        .posts_index
        .as_deref()
        .and_then(|index| Path::new(index).file_name())
        .map(OsStr::to_os_string);

    for entry in walk(&root) {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            if entry.depth() > 0 {
                mirror_dir(path, &root, &ctx.output)?;
            }
            continue;
        }

        ctx.processing(path);
        let rel = relative(path, &root)?;

        let result = match path.extension().and_then(OsStr::to_str) {
            Some("html") if index_name.as_deref() == Some(entry.file_name()) => {
                paginate_index(ctx, path, rel, assets, posts)
            }
            Some("html") => render_html_page(ctx, path, rel, assets),
            Some("md") => render_markdown_page(ctx, path, rel, assets),
            _ => Err(BuildError::InvalidFormat(path.to_path_buf())),
        };
        result.map_err(|e| e.processing(path))?;
    }

    Ok(())
}

fn read_page(path: &Path) -> Result<String, BuildError> {
    std::fs::read_to_string(path).map_err(|e| BuildError::Io {
        action: "could not read file",
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_page(path: &Path, html: &str) -> Result<(), BuildError> {
    write_minified(path, html.as_bytes()).map_err(|e| BuildError::Io {
        action: "could not write file",
        path: path.to_path_buf(),
        source: e,
    })
}

/// Registers an HTML page with the template set under a `.html` name, so it
/// gets the same autoescaping as the templates it extends.
fn register_page(ctx: &mut BuildContext<'_>, path: &Path, rel: &Path) -> Result<String, BuildError> {
    let source = read_page(path)?;
    let name = format!("{}{}", PAGE_TEMPLATE_PREFIX, url_path(rel));
    ctx.templates
        .add_raw_template(&name, &source)
        .map_err(|e| BuildError::Template {
            name: path.display().to_string(),
            source: e,
        })?;
    Ok(name)
}

fn render_page(ctx: &BuildContext<'_>, name: &str, context: &RenderContext) -> Result<String, BuildError> {
    ctx.templates
        .render(name, context.as_tera())
        .map_err(|e| BuildError::Template {
            name: name.to_string(),
            source: e,
        })
}

fn render_html_page(
    ctx: &mut BuildContext<'_>,
    path: &Path,
    rel: &Path,
    assets: &AssetMap,
) -> Result<(), BuildError> {
    let name = register_page(ctx, path, rel)?;
    let context = RenderContext::new()
        .with("site", &ctx.config.site)
        .with("assets", assets);

    let html = render_page(ctx, &name, &context)?;
    write_page(&ctx.output.join(rel), &html)
}

fn render_markdown_page(
    ctx: &mut BuildContext<'_>,
    path: &Path,
    rel: &Path,
    assets: &AssetMap,
) -> Result<(), BuildError> {
    let config = ctx.config;
    let rendered = ctx.render_markdown(path, assets)?;
    let fm = &rendered.front_matter;

    let template = ctx
        .templates
        .resolve_template(&config.defaults.page_template, fm)
        .map_err(|e| BuildError::Template {
            name: fm
                .template
                .clone()
                .unwrap_or_else(|| config.defaults.page_template.clone()),
            source: e,
        })?;

    let description = fm.description.as_deref().unwrap_or(&config.site.description);
    let context = RenderContext::new()
        .with("site", &config.site)
        .with("assets", assets)
        .with("content", &rendered.html)
        .with("description", description)
        .with("title", &page_title(&config.site.title, fm.title.as_deref()))
        .with("meta", &fm.extra);

    let out = ctx.output.join(rel.with_extension("html"));
    ctx.templates
        .write_template(template, &out, context.as_tera())
        .map_err(|e| BuildError::Template {
            name: template.to_string(),
            source: e,
        })
}

/// Renders the posts index once per page of posts. Page 0 goes where the
/// index itself would, page `i` to `page{i+1}/index.html`.
fn paginate_index(
    ctx: &mut BuildContext<'_>,
    path: &Path,
    rel: &Path,
    assets: &AssetMap,
    posts: &[Post],
) -> Result<(), BuildError> {
    let name = register_page(ctx, path, rel)?;
    let pages = paginate(posts, ctx.config.build.posts_per_page)?;
    let index_path = url_path(rel);
    let total = pages.len();

    for (i, page) in pages.iter().enumerate() {
        let links = page_links(i, total, &index_path);
        let context = RenderContext::new()
            .with("posts", page)
            .with("assets", assets)
            .with("site", &ctx.config.site)
            .with("next", &links.next)
            .with("prev", &links.prev)
            .with("page", &(i + 1))
            .with("total_pages", &total);

        let html = render_page(ctx, &name, &context)?;
        let out = if i == 0 {
            ctx.output.join(rel)
        } else {
            ctx.output.join(format!("page{}", i + 1)).join("index.html")
        };
        write_page(&out, &html)?;
    }

    Ok(())
}

/// Splits the posts into pages of `size`. No posts still yields one empty
/// page, so the index is always written.
pub fn paginate(posts: &[Post], size: usize) -> Result<Vec<&[Post]>, BuildError> {
    if size == 0 {
        return Err(BuildError::Config(ConfigError::NotPositive("build.posts_per_page")));
    }
    if posts.is_empty() {
        return Ok(vec![posts]);
    }
    Ok(posts.chunks(size).collect())
}

pub fn page_links(i: usize, total: usize, index_path: &str) -> PageLinks {
    let next = if i + 1 < total {
        format!("/page{}", i + 2)
    } else {
        String::new()
    };
    let prev = match i {
        0 => String::new(),
        1 => index_path.to_string(),
        _ => format!("/page{}", i),
    };
    PageLinks { prev, next }
}
