//! Open positions listing from `data/openings.json`.

use crate::error::Result;
use crate::source::{fetch_json, SiteSource};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const OPENINGS_PATH: &str = "data/openings.json";

pub const EMPTY_MESSAGE: &str =
    r#"<div class="open-empty"><p>There are no open positions right now. Check back soon.</p></div>"#;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Opening {
    pub title: Option<String>,
    pub track: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub responsibilities: Vec<String>,
    pub requirements: Vec<String>,
    pub start: Option<String>,
    pub deadline: Option<String>,
    pub how_to_apply: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpeningsDocument {
    #[serde(default)]
    openings: Vec<Opening>,
}

/// Sort by track, then title.
pub fn sort_openings(openings: &mut [Opening]) {
    openings.sort_by(|a, b| {
        let key = |o: &Opening| (o.track.clone().unwrap_or_default(), o.title.clone().unwrap_or_default());
        key(a).cmp(&key(b))
    });
}

pub async fn load_openings<S: SiteSource>(source: &S) -> Result<Vec<Opening>> {
    let doc: OpeningsDocument = fetch_json(source, OPENINGS_PATH).await?;
    let mut openings = doc.openings;
    sort_openings(&mut openings);
    Ok(openings)
}

/// `mailto:` link with the application subject line.
pub fn apply_link(contact: &str, title: Option<&str>) -> String {
    let subject = format!("Application – {}", title.unwrap_or("Position"));
    format!("mailto:{}?subject={}", contact, urlencoding::encode(&subject))
}

fn bullets(title: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let list: String = items.iter().map(|i| format!("<li>{}</li>", text(i))).collect();
    format!(r#"<div><h4>{}</h4><ul class="bullets">{}</ul></div>"#, title, list)
}

pub fn opening_card(opening: &Opening) -> String {
    let meta: String = [&opening.track, &opening.kind, &opening.location]
        .into_iter()
        .flatten()
        .map(|m| format!(r#"<span class="meta-item">{}</span>"#, text(m)))
        .collect();

    let tags = if opening.tags.is_empty() {
        String::new()
    } else {
        let pills: String = opening
            .tags
            .iter()
            .map(|t| format!(r#"<span class="pill">{}</span>"#, text(t)))
            .collect();
        format!(r#"<div class="tags">{}</div>"#, pills)
    };

    let summary = opening
        .summary
        .as_ref()
        .map(|s| format!(r#"<p class="summary">{}</p>"#, text(s)))
        .unwrap_or_default();

    let mut dates = String::new();
    if let Some(start) = &opening.start {
        dates.push_str(&format!("<span><strong>Start:</strong> {}</span>", text(start)));
    }
    if let Some(deadline) = &opening.deadline {
        dates.push_str(&format!("<span><strong>Deadline:</strong> {}</span>", text(deadline)));
    }

    let mut actions = String::new();
    if let Some(how) = &opening.how_to_apply {
        actions.push_str(&format!(r#"<span class="how">{}</span>"#, text(how)));
    }
    if let Some(contact) = &opening.contact {
        actions.push_str(&format!(
            r#"<a class="btn" href="{}">Apply via Email</a>"#,
            attr(&apply_link(contact, opening.title.as_deref()))
        ));
    }

    format!(
        concat!(
            r#"<article class="open-card"><header class="open-card__head"><h3>{}</h3><div class="meta">{}</div></header>"#,
            r#"{}{}<div class="open-card__cols">{}{}</div>"#,
            r#"<footer class="open-card__foot"><div class="dates">{}</div><div class="actions">{}</div></footer></article>"#
        ),
        text(opening.title.as_deref().unwrap_or("Open Position")),
        meta,
        tags,
        summary,
        bullets("Responsibilities", &opening.responsibilities),
        bullets("Requirements", &opening.requirements),
        dates,
        actions
    )
}

/// Cards for every opening, or the empty state.
pub fn render_openings(openings: &[Opening]) -> String {
    if openings.is_empty() {
        return EMPTY_MESSAGE.to_string();
    }
    openings.iter().map(opening_card).collect()
}

/// Load and render; a missing or malformed document shows the empty state.
pub async fn openings_section<S: SiteSource>(source: &S) -> String {
    match load_openings(source).await {
        Ok(openings) => render_openings(&openings),
        Err(e) => {
            warn!(error = %e, "Openings unavailable");
            EMPTY_MESSAGE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FsSource;
    use tempfile::TempDir;

    #[test]
    fn test_apply_link_encodes_subject() {
        assert_eq!(
            apply_link("pi@lab.edu", Some("PhD Student")),
            "mailto:pi@lab.edu?subject=Application%20%E2%80%93%20PhD%20Student"
        );
        assert!(apply_link("pi@lab.edu", None).ends_with("Position"));
    }

    #[tokio::test]
    async fn test_openings_sorted_and_rendered() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("data"))?;
        std::fs::write(
            dir.path().join(OPENINGS_PATH),
            r#"{"openings": [
                {"title": "Postdoc", "track": "Research", "contact": "pi@lab.edu", "requirements": ["PhD"]},
                {"title": "Intern", "track": "Research"},
                {"title": "Admin", "track": "Operations", "tags": ["Part-time"]}
            ]}"#,
        )?;
        let source = FsSource::new(dir.path());
        let openings = load_openings(&source).await?;
        let titles: Vec<_> = openings.iter().filter_map(|o| o.title.as_deref()).collect();
        assert_eq!(titles, vec!["Admin", "Intern", "Postdoc"]);

        let html = render_openings(&openings);
        assert!(html.contains(r#"<span class="pill">Part-time</span>"#));
        assert!(html.contains("<h4>Requirements</h4>"));
        assert!(html.contains("Apply via Email"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_document_shows_empty_state() {
        let dir = TempDir::new().expect("tempdir");
        let html = openings_section(&FsSource::new(dir.path())).await;
        assert_eq!(html, EMPTY_MESSAGE);
        assert_eq!(render_openings(&[]), EMPTY_MESSAGE);
    }
}
