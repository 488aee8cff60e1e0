use std::path::Path;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};

use crate::assets::AssetMap;
use crate::builder::BuildError;
use crate::frontmatter::FrontMatter;
use crate::highlight::Highlighter;
use crate::template::{RenderContext, TemplateRenderer};

#[derive(Debug, Clone)]
pub struct RenderedMarkdown {
    pub html: String,
    pub front_matter: FrontMatter,
}

pub struct MarkdownRenderer {
    highlighter: Highlighter,
}

impl MarkdownRenderer {
    pub fn new(highlighter: Highlighter) -> Self {
        Self { highlighter }
    }

    /// Reads a Markdown file, splits off its front matter and renders the
    /// body. The resulting HTML is then rendered once more as a template with
    /// the asset map bound as `assets`, which is how Markdown bodies refer to
    /// hashed asset paths.
    pub fn render(
        &self,
        path: &Path,
        assets: &AssetMap,
        templates: &mut TemplateRenderer,
    ) -> Result<RenderedMarkdown, BuildError> {
        let source = std::fs::read_to_string(path).map_err(|e| BuildError::Io {
            action: "could not read file",
            path: path.to_path_buf(),
            source: e,
        })?;

        let (body, yaml) = self.to_html(&source);
        let front_matter = FrontMatter::parse(&yaml).map_err(|e| BuildError::FrontMatter {
            path: path.to_path_buf(),
            source: e,
        })?;

        let context = RenderContext::new().with("assets", assets);
        let html = templates
            .render_str(&body, context.as_tera())
            .map_err(|e| BuildError::Template {
                name: path.display().to_string(),
                source: e,
            })?;

        Ok(RenderedMarkdown { html, front_matter })
    }

    /// Converts Markdown to HTML, returning the raw front-matter text
    /// alongside.
    pub fn to_html(&self, content: &str) -> (String, String) {
        let parser = Parser::new_ext(content, options());

        let mut front_matter = String::new();
        let mut in_front_matter = false;
        let mut code_block: Option<(String, String)> = None;
        let mut events = Vec::new();

        for event in parser {
            match event {
                Event::Start(Tag::MetadataBlock(_)) => in_front_matter = true,
                Event::End(TagEnd::MetadataBlock(_)) => in_front_matter = false,
                Event::Text(text) if in_front_matter => front_matter.push_str(&text),
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(lang) => fence_language(&lang).to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        events.push(Event::Html(self.highlighter.highlight(&lang, &code).into()));
                    }
                }
                other => events.push(other),
            }
        }

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());

        (out, front_matter)
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    options
}

// Info strings like `rust,ignore` name the language first.
fn fence_language(info: &str) -> &str {
    info.split([',', ' ', '{']).next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new(Highlighter::new("base16-ocean.dark", false, false).unwrap())
    }

    #[test]
    fn test_front_matter_is_split_off() {
        let (html, yaml) = renderer().to_html("---\ntitle: Hi\ndate: 2020-01-01\n---\n\n# Heading\n\nBody text.\n");

        assert!(yaml.contains("title: Hi"));
        assert!(yaml.contains("date: 2020-01-01"));
        assert!(!html.contains("title: Hi"));
        assert!(html.contains("<h1>Heading</h1>"));
        assert!(html.contains("<p>Body text.</p>"));
    }

    #[test]
    fn test_no_front_matter() {
        let (html, yaml) = renderer().to_html("Just text\n");
        assert!(yaml.is_empty());
        assert_eq!(html, "<p>Just text</p>\n");
    }

    #[test]
    fn test_code_blocks_are_highlighted() {
        let (html, _) = renderer().to_html("```rust,ignore\nfn main() {}\n```\n\n    indented\n");

        assert!(html.contains("<pre class=\"highlight\""));
        assert!(html.contains("<pre><code>indented\n</code></pre>"));
    }

    #[test]
    fn test_quotes_survive_for_template_pass() {
        let (html, _) = renderer().to_html("Link: {{ assets | key(name=\"style.css\") }}\n");
        assert!(html.contains("key(name=\"style.css\")"));
    }

    #[test]
    fn test_render_resolves_assets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post.md");
        std::fs::write(
            &path,
            "---\ntitle: Styled\n---\n<link rel=\"stylesheet\" href=\"{{ assets | key(name='style.css') }}\">\n\nSee {{ assets[\"style.css\"] }}\n",
        )
        .unwrap();

        let mut assets = AssetMap::new();
        assets.insert("style.css".into(), "/style.1234abcd.css".into());
        let mut templates = TemplateRenderer::empty();

        let rendered = renderer().render(&path, &assets, &mut templates).unwrap();
        assert_eq!(rendered.front_matter.title.as_deref(), Some("Styled"));
        assert!(rendered.html.contains("href=\"/style.1234abcd.css\""));
        assert!(rendered.html.contains("See /style.1234abcd.css"));
    }

    #[test]
    fn test_render_rejects_non_string_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.md");
        std::fs::write(&path, "---\ntitle: x\ndraft: true\n---\nbody\n").unwrap();

        let err = renderer()
            .render(&path, &AssetMap::new(), &mut TemplateRenderer::empty())
            .unwrap_err();
        assert!(matches!(err, BuildError::FrontMatter { .. }));
        assert!(err.to_string().contains("bad.md"));
    }
}
