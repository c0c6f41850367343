//! Shared page fragments (head, header, footer) and active-nav marking.

use crate::error::{LabsiteError, OptionExt, Result};
use crate::source::SiteSource;
use regex::{Captures, Regex};
use std::ops::Range;
use tracing::debug;

pub const HEAD_PATH: &str = "partials/head.html";
pub const HEADER_PATH: &str = "partials/header.html";
pub const FOOTER_PATH: &str = "partials/footer.html";

pub const HEADER_ID: &str = "site-header";
pub const FOOTER_ID: &str = "site-footer";
pub const NAV_ID: &str = "site-nav";

/// Fragments shared by every page. Missing fragments are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partials {
    pub head: Option<String>,
    pub header: Option<String>,
    pub footer: Option<String>,
}

async fn fetch_optional<S: SiteSource>(source: &S, path: &str) -> Option<String> {
    match source.fetch_text(path).await {
        Ok(text) => Some(text),
        Err(e) => {
            debug!(path = path, error = %e, "Partial not available");
            None
        }
    }
}

pub async fn load_partials<S: SiteSource>(source: &S) -> Partials {
    Partials {
        head: fetch_optional(source, HEAD_PATH).await,
        header: fetch_optional(source, HEADER_PATH).await,
        footer: fetch_optional(source, FOOTER_PATH).await,
    }
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| LabsiteError::Parse(e.to_string()))
}

/// Byte range of the inner HTML of the element with the given id. Nested
/// elements of the same tag are balanced.
pub fn element_inner_span(html: &str, id: &str) -> Result<Option<Range<usize>>> {
    let open = regex(&format!(
        r#"(?i)<([a-z][a-z0-9-]*)\b[^>]*\bid\s*=\s*["']{}["'][^>]*>"#,
        regex::escape(id)
    ))?;
    let Some(caps) = open.captures(html) else {
        return Ok(None);
    };
    let whole = caps.get(0).ok_or_parse("element match without span")?;
    let tag = caps.get(1).ok_or_parse("element match without tag name")?;
    if whole.as_str().ends_with("/>") {
        return Ok(Some(whole.end()..whole.end()));
    }

    let start = whole.end();
    let tags = regex(&format!(r"(?i)<(/?){}\b[^>]*>", regex::escape(tag.as_str())))?;
    let mut depth = 1usize;
    for m in tags.captures_iter(&html[start..]) {
        let (Some(all), Some(slash)) = (m.get(0), m.get(1)) else {
            continue;
        };
        if !slash.as_str().is_empty() {
            depth -= 1;
            if depth == 0 {
                return Ok(Some(start..start + all.start()));
            }
        } else if !all.as_str().ends_with("/>") {
            depth += 1;
        }
    }
    Ok(None)
}

/// Replace the inner HTML of the element with the given id. Pages without
/// the element are returned unchanged.
pub fn replace_inner(html: &str, id: &str, content: &str) -> Result<String> {
    Ok(match element_inner_span(html, id)? {
        Some(span) => format!("{}{}{}", &html[..span.start], content, &html[span.end..]),
        None => html.to_string(),
    })
}

/// File name of a page path, `index.html` for the site root.
pub fn page_name(path: &str) -> &str {
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "index.html",
    }
}

fn set_active(tag: &str, active: bool) -> Result<String> {
    let class_attr = regex(r#"\s+class\s*=\s*"([^"]*)""#)?;
    if let Some(caps) = class_attr.captures(tag) {
        let mut classes: Vec<&str> = caps
            .get(1)
            .map_or("", |c| c.as_str())
            .split_whitespace()
            .filter(|c| *c != "active")
            .collect();
        if active {
            classes.push("active");
        }
        // The attribute goes away with its leading whitespace when no class is left.
        let replacement = if classes.is_empty() {
            String::new()
        } else {
            format!(r#" class="{}""#, classes.join(" "))
        };
        return Ok(class_attr.replace(tag, replacement.as_str()).into_owned());
    }

    if !active {
        return Ok(tag.to_string());
    }
    let body = tag.trim_end_matches('>');
    Ok(format!(r#"{} class="active">"#, body))
}

/// Mark the nav links pointing at `current_page` with class `active` and
/// clear it from every other link. Links are looked up inside `#site-nav`
/// when present, otherwise in the whole fragment.
pub fn mark_active_nav(header: &str, current_page: &str) -> Result<String> {
    let target = page_name(current_page);
    let span = element_inner_span(header, NAV_ID)?.unwrap_or(0..header.len());
    let anchor = regex(r#"(?i)<a\b[^>]*\bhref\s*=\s*"([^"]*)"[^>]*>"#)?;

    let mut failure = None;
    let nav = anchor.replace_all(&header[span.clone()], |caps: &Captures| {
        let tag = caps.get(0).map_or("", |m| m.as_str());
        let href = caps.get(1).map_or("", |m| m.as_str());
        let normalized = if href.is_empty() || href == "/" { "index.html" } else { href };
        match set_active(tag, normalized == target) {
            Ok(updated) => updated,
            Err(e) => {
                failure = Some(e);
                tag.to_string()
            }
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    Ok(format!("{}{}{}", &header[..span.start], nav, &header[span.end..]))
}

/// Inject the shared fragments into a page: the head fragment before
/// `</head>`, header and footer into their placeholder elements.
pub fn inject_partials(page: &str, partials: &Partials, current_page: &str) -> Result<String> {
    let mut html = page.to_string();

    if let Some(head) = &partials.head {
        if let Some(pos) = html.to_ascii_lowercase().find("</head>") {
            html.insert_str(pos, head);
        }
    }
    if let Some(header) = &partials.header {
        let header = mark_active_nav(header, current_page)?;
        html = replace_inner(&html, HEADER_ID, &header)?;
    }
    if let Some(footer) = &partials.footer {
        html = replace_inner(&html, FOOTER_ID, footer)?;
    }

    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FsSource;
    use tempfile::TempDir;

    const HEADER: &str = r#"<nav id="site-nav"><a href="/">Home</a><a class="link active" href="people.html">People</a><a href="publications.html">Publications</a></nav>"#;

    #[test]
    fn test_element_span_balances_nesting() -> Result<()> {
        let html = r#"<div id="site-header"><div>inner</div><div></div></div><p>after</p>"#;
        let span = element_inner_span(html, HEADER_ID)?.expect("span");
        assert_eq!(&html[span], "<div>inner</div><div></div>");
        assert!(element_inner_span(html, "missing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_mark_active_nav() -> Result<()> {
        let html = mark_active_nav(HEADER, "/lab/publications.html")?;
        assert!(html.contains(r#"<a href="/">Home</a>"#));
        assert!(html.contains(r#"<a class="link" href="people.html">"#));
        assert!(html.contains(r#"<a href="publications.html" class="active">"#));

        let home = mark_active_nav(HEADER, "")?;
        assert!(home.contains(r#"<a href="/" class="active">Home</a>"#));
        Ok(())
    }

    #[test]
    fn test_set_active_leaves_other_attributes() -> Result<()> {
        let cleared = set_active(r#"<a class="active" title="a  b" href="x.html">"#, false)?;
        assert_eq!(cleared, r#"<a title="a  b" href="x.html">"#);

        let marked = set_active(r#"<a href="x.html"  title="a  b" class="nav">"#, true)?;
        assert_eq!(marked, r#"<a href="x.html"  title="a  b" class="nav active">"#);
        Ok(())
    }

    #[test]
    fn test_page_name() {
        assert_eq!(page_name("/"), "index.html");
        assert_eq!(page_name(""), "index.html");
        assert_eq!(page_name("/a/b/openings.html"), "openings.html");
    }

    #[test]
    fn test_inject_partials() -> Result<()> {
        let page = concat!(
            "<html><head><title>People</title></head><body>",
            r#"<header id="site-header"></header><main></main>"#,
            r#"<footer id="site-footer">loading</footer></body></html>"#
        );
        let partials = Partials {
            head: Some(r#"<link rel="stylesheet" href="style.css">"#.into()),
            header: Some(HEADER.into()),
            footer: Some("<p>© Lab</p>".into()),
        };
        let html = inject_partials(page, &partials, "people.html")?;
        assert!(html.contains(r#"<title>People</title><link rel="stylesheet" href="style.css"></head>"#));
        assert!(html.contains(r#"<a class="link active" href="people.html">"#));
        assert!(html.contains(r#"<footer id="site-footer"><p>© Lab</p></footer>"#));

        assert_eq!(inject_partials(page, &Partials::default(), "people.html")?, page);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_partials_skips_missing() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("partials"))?;
        std::fs::write(dir.path().join(FOOTER_PATH), "<p>footer</p>")?;
        let partials = load_partials(&FsSource::new(dir.path())).await;
        assert!(partials.head.is_none());
        assert!(partials.header.is_none());
        assert_eq!(partials.footer.as_deref(), Some("<p>footer</p>"));
        Ok(())
    }
}
