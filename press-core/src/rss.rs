use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Serialize;

use crate::builder::{BuildContext, BuildError};
use crate::minify::write_minified;
use crate::posts::Post;
use crate::template::RenderContext;

pub const RSS_FILE: &str = "rss.xml";
const RSS_TEMPLATE_NAME: &str = "rss";
const EMPTY_TEASER: &str = "Nothing here.";

const RSS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{{ site.title | escape_xml }}</title>
    <link>{{ site.url | escape_xml }}</link>
    <description>{{ site.description | escape_xml }}</description>
    <language>en-us</language>
    <pubDate>{{ pub_date }}</pubDate>
    <lastBuildDate>{{ pub_date }}</lastBuildDate>
    {% for item in items %}
    <item>
      <title>{{ item.title | escape_xml }}</title>
      <link>{{ item.url | escape_xml }}</link>
      <guid>{{ item.url | escape_xml }}</guid>
      <pubDate>{{ item.pub_date }}</pubDate>
      <description>{{ item.description | escape_xml }}</description>
    </item>
    {% endfor %}
  </channel>
</rss>
"#;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RssItem {
    pub title: String,
    pub url: String,
    pub pub_date: String,
    pub description: String,
}

/// Writes `rss.xml` for the newest `posts_per_page` posts.
pub fn emit_rss(ctx: &mut BuildContext<'_>, posts: &[Post]) -> Result<(), BuildError> {
    if !ctx.config.build.rss || posts.is_empty() {
        return Ok(());
    }

    let out = ctx.output.join(RSS_FILE);
    ctx.processing(&out);

    let site = &ctx.config.site;
    let items: Vec<RssItem> = posts
        .iter()
        .take(ctx.config.build.posts_per_page)
        .map(|post| RssItem {
            title: post.title.clone(),
            url: post.url.clone(),
            pub_date: rfc2822(post.date),
            description: teaser(post, &site.description),
        })
        .collect();

    let context = RenderContext::new()
        .with("site", site)
        .with("pub_date", &rfc2822(posts[0].date))
        .with("items", &items);

    let template_error = |e| BuildError::Template {
        name: RSS_TEMPLATE_NAME.to_string(),
        source: e,
    };
    ctx.templates
        .add_raw_template(RSS_TEMPLATE_NAME, RSS_TEMPLATE)
        .map_err(template_error)?;
    let xml = ctx
        .templates
        .render(RSS_TEMPLATE_NAME, context.as_tera())
        .map_err(template_error)?;

    write_minified(&out, xml.as_bytes()).map_err(|e| BuildError::Io {
        action: "could not write file",
        path: out.clone(),
        source: e,
    })
}

/// The post's own description, or else the first line of text in its body.
pub fn teaser(post: &Post, site_description: &str) -> String {
    if post.description != site_description {
        return post.description.clone();
    }

    let text = TAG.replace_all(&post.content, "");
    match text.lines().map(str::trim).find(|line| !line.is_empty()) {
        Some(line) => html_escape::decode_html_entities(line).into_owned(),
        None => EMPTY_TEASER.to_string(),
    }
}

pub fn rfc2822(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN).and_utc().to_rfc2822()
}
