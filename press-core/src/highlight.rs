use std::fmt::Write as _;
use std::sync::LazyLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{
    ClassStyle, ClassedHTMLGenerator, IncludeBackground, styled_line_to_highlighted_html,
};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

#[derive(Debug)]
pub struct UnknownTheme(pub String);

impl std::fmt::Display for UnknownTheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown highlight theme {:?}", self.0)
    }
}

impl std::error::Error for UnknownTheme {}

/// Turns fenced code blocks into highlighted HTML.
#[derive(Debug, Clone)]
pub struct Highlighter {
    theme: &'static Theme,
    line_numbers: bool,
    classes: bool,
}

impl Highlighter {
    pub fn new(theme: &str, line_numbers: bool, classes: bool) -> Result<Self, UnknownTheme> {
        let theme = THEME_SET
            .themes
            .get(theme)
            .ok_or_else(|| UnknownTheme(theme.to_string()))?;

        Ok(Self {
            theme,
            line_numbers,
            classes,
        })
    }

    pub fn highlight(&self, lang: &str, code: &str) -> String {
        let Some(syntax) = find_syntax(lang) else {
            return plain(lang, code);
        };

        let body = if self.classes {
            self.classed(syntax, code)
        } else {
            self.styled(syntax, code)
        };

        match body {
            Ok(body) => body,
            Err(e) => {
                log::warn!(target: "builder", "could not highlight {} block: {}", lang, e);
                plain(lang, code)
            }
        }
    }

    fn styled(&self, syntax: &SyntaxReference, code: &str) -> Result<String, syntect::Error> {
        let mut h = HighlightLines::new(syntax, self.theme);
        let background = self
            .theme
            .settings
            .background
            .map(|c| format!(" style=\"background-color:#{:02x}{:02x}{:02x};\"", c.r, c.g, c.b))
            .unwrap_or_default();

        let mut out = format!("<pre class=\"highlight\"{}><code>", background);
        for (n, line) in LinesWithEndings::from(code).enumerate() {
            let regions = h.highlight_line(line, &SYNTAX_SET)?;
            self.push_line_number(&mut out, n);
            out.push_str(&styled_line_to_highlighted_html(&regions, IncludeBackground::No)?);
        }
        out.push_str("</code></pre>\n");

        Ok(out)
    }

    fn classed(&self, syntax: &SyntaxReference, code: &str) -> Result<String, syntect::Error> {
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        let html = generator.finalize();

        // Spans may cross line ends, so numbers are spliced in afterwards.
        let mut out = String::from("<pre class=\"highlight\"><code>");
        for (n, line) in html.split_inclusive('\n').enumerate() {
            self.push_line_number(&mut out, n);
            out.push_str(line);
        }
        out.push_str("</code></pre>\n");

        Ok(out)
    }

    fn push_line_number(&self, out: &mut String, n: usize) {
        if self.line_numbers {
            let _ = write!(out, "<span class=\"ln\">{}</span>", n + 1);
        }
    }
}

fn find_syntax(lang: &str) -> Option<&'static SyntaxReference> {
    if lang.is_empty() {
        return None;
    }

    SYNTAX_SET
        .find_syntax_by_token(lang)
        .or_else(|| SYNTAX_SET.find_syntax_by_extension(lang))
        .or_else(|| match lang {
            "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
            _ => None,
        })
}

fn plain(lang: &str, code: &str) -> String {
    if lang.is_empty() {
        format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(code))
    } else {
        format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            html_escape::encode_double_quoted_attribute(lang),
            html_escape::encode_text(code)
        )
    }
}
