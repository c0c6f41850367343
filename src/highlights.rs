//! Home-page highlights of the current year.
//!
//! Two documents feed the carousel: a curated `data/highlights.manual.json`
//! and a generated `data/highlights.auto.json`. Manual items always come
//! first; auto items fill the remaining slots in random order.

use crate::carousel::Carousel;
use crate::model::RawPublication;
use crate::source::{fetch_json, SiteSource};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

pub const MANUAL_PATH: &str = "data/highlights.manual.json";
pub const AUTO_PATH: &str = "data/highlights.auto.json";

/// Image used when a highlight has none
pub const PLACEHOLDER_IMAGE: &str = "assets/img/pubs/paper-generic.jpg";

/// Maximum number of highlights shown
pub const MAX_HIGHLIGHTS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightItem {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl HighlightItem {
    /// Identity used to drop auto items already curated by hand.
    fn identity(&self) -> String {
        if self.url.is_empty() {
            self.title.to_lowercase()
        } else {
            self.url.to_lowercase()
        }
    }

    fn in_year(&self, year: i32) -> bool {
        self.year.unwrap_or(year) == year
    }
}

/// `{ "items": [...] }` plus the bookkeeping fields written by
/// [`build_auto_highlights`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HighlightsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub items: Vec<HighlightItem>,
}

/// Load one highlights document, keeping only items of `year`. A missing or
/// malformed document yields nothing.
pub async fn load_items<S: SiteSource>(source: &S, path: &str, year: i32) -> Vec<HighlightItem> {
    match fetch_json::<S, HighlightsDocument>(source, path).await {
        Ok(doc) => doc.items.into_iter().filter(|i| i.in_year(year)).collect(),
        Err(e) => {
            debug!(path = path, error = %e, "No highlights");
            Vec::new()
        }
    }
}

/// Manual items in order, then shuffled auto items not already curated, up
/// to [`MAX_HIGHLIGHTS`] in total.
pub fn pick_highlights<R: Rng + ?Sized>(
    manual: Vec<HighlightItem>,
    mut auto: Vec<HighlightItem>,
    rng: &mut R,
) -> Vec<HighlightItem> {
    let curated: HashSet<String> = manual.iter().map(HighlightItem::identity).collect();
    auto.retain(|item| !curated.contains(&item.identity()));
    auto.shuffle(rng);

    let fill = MAX_HIGHLIGHTS.saturating_sub(manual.len());
    let mut picks = manual;
    picks.extend(auto.into_iter().take(fill));
    picks
}

/// Load both documents and pick the highlights of `year`.
pub async fn load_highlights<S: SiteSource, R: Rng + ?Sized>(
    source: &S,
    year: i32,
    rng: &mut R,
) -> Vec<HighlightItem> {
    let manual = load_items(source, MANUAL_PATH, year).await;
    let auto = load_items(source, AUTO_PATH, year).await;
    pick_highlights(manual, auto, rng)
}

/// Build the auto highlights document from member publication lists: every
/// publication of `year`, deduplicated by DOI, URL or title.
pub fn build_auto_highlights<'a>(
    publications: impl IntoIterator<Item = &'a RawPublication>,
    year: i32,
    updated_at: i64,
) -> HighlightsDocument {
    let mut seen = HashSet::new();
    let items = publications
        .into_iter()
        .filter(|p| p.year == Some(year))
        .filter(|p| {
            let key = p
                .doi_str()
                .or(p.url.as_deref())
                .unwrap_or(p.title_str())
                .trim()
                .to_lowercase();
            !key.is_empty() && seen.insert(key)
        })
        .map(|p| HighlightItem {
            kind: Some("publication".to_string()),
            title: p.title_str().to_string(),
            year: Some(year),
            url: match p.doi_str() {
                Some(doi) => format!("https://doi.org/{}", doi),
                None => p.url_str().to_string(),
            },
            image: Some(PLACEHOLDER_IMAGE.to_string()),
            tags: vec!["Publication".to_string()],
        })
        .collect();

    HighlightsDocument {
        source: Some("auto_from_publications".to_string()),
        year: Some(year),
        updated_at: Some(updated_at),
        items,
    }
}

pub fn highlight_card(item: &HighlightItem) -> String {
    let image = item.image.as_deref().filter(|i| !i.is_empty()).unwrap_or(PLACEHOLDER_IMAGE);
    let url = if item.url.is_empty() { "#" } else { item.url.as_str() };
    format!(
        concat!(
            r#"<figure class="yp-card"><a href="{}" target="_blank" rel="noopener" title="{}">"#,
            r#"<img src="{}" alt=""><figcaption>{}</figcaption></a></figure>"#
        ),
        attr(url),
        attr(&item.title),
        attr(image),
        text(&item.title)
    )
}

/// Carousel track and dots, or the empty-year message.
pub fn highlights_section(items: &[HighlightItem], year: i32, carousel: &Carousel) -> String {
    if items.is_empty() {
        return format!(r#"<p class="muted">No highlights found for {}.</p>"#, year);
    }

    let cards: String = items.iter().map(highlight_card).collect();
    let dots: String = carousel
        .dots()
        .into_iter()
        .enumerate()
        .map(|(i, active)| {
            let class = if active { r#" class="active""# } else { "" };
            format!(r#"<button type="button" data-page="{}"{}></button>"#, i, class)
        })
        .collect();
    format!(
        r#"<div id="yp-track" data-offset="{}">{}</div><div id="yp-dots">{}</div>"#,
        carousel.offset(),
        cards,
        dots
    )
}
