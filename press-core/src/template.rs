use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera, Value};

use crate::frontmatter::FrontMatter;
use crate::minify::write_minified;

#[derive(Debug)]
pub enum TemplateError {
    TeraError(tera::Error),
    IoError(std::io::Error),
    NotFound(String),
}

impl From<tera::Error> for TemplateError {
    fn from(err: tera::Error) -> Self {
        TemplateError::TeraError(err)
    }
}

impl From<std::io::Error> for TemplateError {
    fn from(err: std::io::Error) -> Self {
        TemplateError::IoError(err)
    }
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::TeraError(e) => write!(f, "Template error: {}", e),
            TemplateError::IoError(e) => write!(f, "IO error: {}", e),
            TemplateError::NotFound(name) => write!(f, "template {:?} not found", name),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TemplateError::TeraError(e) => std::error::Error::source(e),
            TemplateError::IoError(e) => Some(e),
            TemplateError::NotFound(_) => None,
        }
    }
}

/// The template set of one build: every file under the templates directory,
/// addressed by its path relative to that directory.
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    pub fn new(templates_dir: &Path) -> Result<Self, TemplateError> {
        let glob = templates_dir.join("**").join("*");
        let mut tera = Tera::new(&glob.to_string_lossy())?;
        tera.register_filter("key", key_filter);

        Ok(Self { tera })
    }

    /// A renderer with no files behind it, for one-off strings.
    pub fn empty() -> Self {
        let mut tera = Tera::default();
        tera.register_filter("key", key_filter);
        Self { tera }
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Picks the front-matter `template` override if there is one, else the
    /// supplied default. Fails if the set has no such template.
    pub fn resolve_template<'a>(
        &self,
        default: &'a str,
        front_matter: &'a FrontMatter,
    ) -> Result<&'a str, TemplateError> {
        let name = front_matter.template.as_deref().unwrap_or(default);
        if !self.has_template(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        Ok(name)
    }

    pub fn add_raw_template(&mut self, name: &str, content: &str) -> Result<(), TemplateError> {
        Ok(self.tera.add_raw_template(name, content)?)
    }

    /// Render a template from the set with the given context
    pub fn render(&self, template: &str, context: &Context) -> Result<String, TemplateError> {
        if !self.has_template(template) {
            return Err(TemplateError::NotFound(template.to_string()));
        }
        Ok(self.tera.render(template, context)?)
    }

    /// Render a string as a template. It may extend or include templates from
    /// the set.
    pub fn render_str(&mut self, source: &str, context: &Context) -> Result<String, TemplateError> {
        Ok(self.tera.render_str(source, context)?)
    }

    /// Render a template and write it through the minifying sink
    pub fn write_template(
        &self,
        template: &str,
        output_path: &Path,
        context: &Context,
    ) -> Result<(), TemplateError> {
        let rendered = self.render(template, context)?;
        write_minified(output_path, rendered.as_bytes())?;
        Ok(())
    }
}

/// Context builder in the shape the pipeline stages use.
#[derive(Default)]
pub struct RenderContext {
    context: Context,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_to_context<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.context.insert(key, value);
    }

    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        self.add_to_context(key, value);
        self
    }

    pub fn as_tera(&self) -> &Context {
        &self.context
    }
}

/// `{{ assets | key(name="style.css") }}` looks a key up in a map and yields
/// an empty string when it is missing.
fn key_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let name = match args.get("name") {
        Some(Value::String(name)) => name,
        Some(other) => {
            return Err(tera::Error::msg(format!(
                "filter `key` expects a string `name`, got {}",
                other
            )));
        }
        None => return Err(tera::Error::msg("filter `key` expects a `name` argument")),
    };

    match value {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or_else(|| Value::String(String::new()))),
        other => Err(tera::Error::msg(format!(
            "filter `key` can only be applied to a map, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn renderer_with(files: &[(&str, &str)]) -> (tempfile::TempDir, TemplateRenderer) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let renderer = TemplateRenderer::new(dir.path()).unwrap();
        (dir, renderer)
    }

    #[test]
    fn test_resolve_default_and_override() {
        let (_dir, renderer) = renderer_with(&[("page.html", "p"), ("special.html", "s")]);

        let plain = FrontMatter::default();
        assert_eq!(renderer.resolve_template("page.html", &plain).unwrap(), "page.html");

        let overridden = FrontMatter {
            template: Some("special.html".into()),
            ..Default::default()
        };
        assert_eq!(
            renderer.resolve_template("page.html", &overridden).unwrap(),
            "special.html"
        );
    }

    #[test]
    fn test_resolve_missing_template() {
        let (_dir, renderer) = renderer_with(&[("page.html", "p")]);
        let fm = FrontMatter {
            template: Some("nope.html".into()),
            ..Default::default()
        };

        assert!(matches!(
            renderer.resolve_template("page.html", &fm),
            Err(TemplateError::NotFound(name)) if name == "nope.html"
        ));
    }

    #[test]
    fn test_nested_template_names() {
        let (_dir, renderer) = renderer_with(&[("layouts/wide.html", "{{ x }}")]);
        let ctx = RenderContext::new().with("x", "wide");

        assert_eq!(renderer.render("layouts/wide.html", ctx.as_tera()).unwrap(), "wide");
    }

    #[test]
    fn test_key_filter() {
        let mut renderer = TemplateRenderer::empty();
        let mut assets = BTreeMap::new();
        assets.insert("style.css".to_string(), "/style.0badc0de.css".to_string());
        let ctx = RenderContext::new().with("assets", &assets);

        let out = renderer
            .render_str(r#"{{ assets | key(name="style.css") }}|{{ assets | key(name="x") }}"#, ctx.as_tera())
            .unwrap();
        assert_eq!(out, "/style.0badc0de.css|");
    }

    #[test]
    fn test_render_str_extends_the_set() {
        let (_dir, mut renderer) = renderer_with(&[(
            "base.html",
            "<main>{% block body %}{% endblock %}</main>",
        )]);

        let out = renderer
            .render_str(
                r#"{% extends "base.html" %}{% block body %}hi{% endblock %}"#,
                &Context::new(),
            )
            .unwrap();
        assert_eq!(out, "<main>hi</main>");
    }

    #[test]
    fn test_write_template_minifies_html() {
        let (dir, renderer) = renderer_with(&[(
            "page.html",
            "<html>\n  <body>\n    <p>{{ x }}</p>\n  </body>\n</html>\n",
        )]);
        let out = dir.path().join("out/nested/page.html");
        let ctx = RenderContext::new().with("x", "hello");

        renderer.write_template("page.html", &out, ctx.as_tera()).unwrap();

        let written = std::fs::read_to_string(out).unwrap();
        assert!(written.contains("<p>hello</p>"));
        assert!(!written.contains("\n  "));
    }
}
