//! Minify-on-write file sink.
//!
//! Output files are minified according to their extension as they are
//! written. Unrecognized extensions are written unchanged.

use std::borrow::Cow;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinifyKind {
    Html,
    Css,
    Js,
    Svg,
    Json,
    Xml,
}

impl MinifyKind {
    pub fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "html" => Some(MinifyKind::Html),
            "css" => Some(MinifyKind::Css),
            "js" | "jsx" => Some(MinifyKind::Js),
            "svg" => Some(MinifyKind::Svg),
            _ if ext.ends_with("json") => Some(MinifyKind::Json),
            _ if ext.ends_with("xml") => Some(MinifyKind::Xml),
            _ => None,
        }
    }
}

/// Writes `content` to `path`, creating parent directories, minified by the
/// path's extension.
pub fn write_minified(path: &Path, content: &[u8]) -> io::Result<()> {
    let output = match MinifyKind::for_path(path) {
        Some(kind) => minify(kind, content)?,
        None => Cow::Borrowed(content),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, output)
}

pub fn minify(kind: MinifyKind, content: &[u8]) -> io::Result<Cow<'_, [u8]>> {
    let out = match kind {
        MinifyKind::Html => minify_html::minify(content, &html_cfg()),
        MinifyKind::Css => minify_embedded(content, b"<style>", b"</style>"),
        MinifyKind::Js => minify_embedded(content, b"<script>", b"</script>"),
        MinifyKind::Svg | MinifyKind::Xml => minify_xml(content),
        MinifyKind::Json => minify_json(content)?,
    };
    Ok(Cow::Owned(out))
}

fn html_cfg() -> minify_html::Cfg {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg
}

/// Stylesheets and scripts go through the HTML minifier wrapped in their
/// element, which is then peeled off again.
fn minify_embedded(content: &[u8], open: &[u8], close: &[u8]) -> Vec<u8> {
    let mut wrapped = Vec::with_capacity(content.len() + open.len() + close.len());
    wrapped.extend_from_slice(open);
    wrapped.extend_from_slice(content);
    wrapped.extend_from_slice(close);

    let minified = minify_html::minify(&wrapped, &html_cfg());
    match minified
        .strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
    {
        Some(inner) => inner.to_vec(),
        None => content.to_vec(),
    }
}

/// Collapses indentation and blank lines. A line break next to a tag is
/// dropped, one between two runs of text becomes a single space.
fn minify_xml(content: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(content);
    let mut out = String::with_capacity(text.len());

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if !out.is_empty() && !out.ends_with('>') && !line.starts_with('<') {
            out.push(' ');
        }
        out.push_str(line);
    }

    out.into_bytes()
}

fn minify_json(content: &[u8]) -> io::Result<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_slice(content)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    serde_json::to_vec(&value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_for_path() {
        assert_eq!(MinifyKind::for_path(Path::new("a/index.html")), Some(MinifyKind::Html));
        assert_eq!(MinifyKind::for_path(Path::new("app.jsx")), Some(MinifyKind::Js));
        assert_eq!(MinifyKind::for_path(Path::new("rss.xml")), Some(MinifyKind::Xml));
        assert_eq!(MinifyKind::for_path(Path::new("m.geojson")), Some(MinifyKind::Json));
        assert_eq!(MinifyKind::for_path(Path::new("logo.svg")), Some(MinifyKind::Svg));
        assert_eq!(MinifyKind::for_path(Path::new("favicon.ico")), None);
        assert_eq!(MinifyKind::for_path(Path::new("README")), None);
    }

    #[test]
    fn test_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/dir/notes.txt");
        write_minified(&path, b"  keep\n\n  me  ").unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"  keep\n\n  me  ");
    }

    #[test]
    fn test_xml_collapse() {
        let out = minify(MinifyKind::Xml, b"<rss>\n  <channel>\n\n    <title>t</title>\n  </channel>\n</rss>\n").unwrap();
        assert_eq!(&*out, b"<rss><channel><title>t</title></channel></rss>");
    }

    #[test]
    fn test_xml_keeps_words_apart() {
        let out = minify(
            MinifyKind::Xml,
            b"<item>\n  <description>line one\n  line two\n</description>\n</item>\n",
        )
        .unwrap();
        assert_eq!(&*out, b"<item><description>line one line two</description></item>");
    }

    #[test]
    fn test_json_compact_and_invalid() {
        let out = minify(MinifyKind::Json, b"{ \"a\" : [1, 2] }").unwrap();
        assert_eq!(&*out, b"{\"a\":[1,2]}");

        let err = minify(MinifyKind::Json, b"{ nope").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_css_is_shrunk() {
        let css = b"body {\n    color: red;\n}\n";
        let out = minify(MinifyKind::Css, css).unwrap();

        assert!(out.len() < css.len());
        assert!(String::from_utf8_lossy(&out).contains("color:red"));
    }
}
