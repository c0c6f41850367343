//! HTML fragments for the publications page.
//!
//! Everything coming from site data is escaped with `html-escape` before it
//! lands in markup.

use crate::browse::{FilterOptions, PublicationBrowser};
use crate::model::{GroupAuthor, MergedPublication};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

/// Number of plain author names shown when no group member is credited.
const AUTHOR_PREVIEW: usize = 3;

/// Up to two initials: first letter of the first and last name parts.
pub fn initials(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    let first = parts.first().and_then(|p| p.chars().next());
    let last = if parts.len() > 1 {
        parts.last().and_then(|p| p.chars().next())
    } else {
        None
    };
    first
        .into_iter()
        .chain(last)
        .flat_map(char::to_uppercase)
        .collect()
}

fn avatar(author: &GroupAuthor) -> String {
    let name = attr(&author.name);
    match &author.photo {
        Some(photo) => format!(
            r#"<img class="avatar" src="{}" alt="{}" title="{}">"#,
            attr(photo),
            name,
            name
        ),
        None => format!(
            concat!(
                r#"<svg class="avatar" viewBox="0 0 40 40" role="img" aria-label="{name}" title="{name}">"#,
                r##"<circle cx="20" cy="20" r="19" fill="#e9edf5" stroke="#fff"/>"##,
                r##"<text x="50%" y="54%" text-anchor="middle" font-size="16" fill="#4a5b7a" "##,
                r#"font-family="Inter, system-ui" dominant-baseline="middle">{initials}</text></svg>"#
            ),
            name = name,
            initials = text(&initials(&author.name)),
        ),
    }
}

fn authors_block(publication: &MergedPublication) -> String {
    if !publication.group_authors.is_empty() {
        let avatars: String = publication.group_authors.iter().map(avatar).collect();
        return format!(
            r#"<div class="authors"><div class="author-avatars">{}</div></div>"#,
            avatars
        );
    }

    if publication.authors.is_empty() {
        return String::new();
    }

    let names = publication
        .authors
        .iter()
        .take(AUTHOR_PREVIEW)
        .map(|a| text(a).into_owned())
        .collect::<Vec<_>>()
        .join(", ");
    let more = if publication.authors.len() > AUTHOR_PREVIEW {
        r#" <span class="sep">…</span>"#
    } else {
        ""
    };
    format!(
        r#"<div class="authors"><span class="author-names">{}{}</span></div>"#,
        names, more
    )
}

/// One publication card.
pub fn publication_card(publication: &MergedPublication) -> String {
    let href = if publication.url.trim().is_empty() {
        "#"
    } else {
        publication.url.as_str()
    };

    let mut meta = String::new();
    if !publication.venue.is_empty() {
        meta.push_str(&format!("<em>{}</em>", text(&publication.venue)));
    }
    if let Some(year) = publication.year {
        if !publication.venue.is_empty() {
            meta.push_str(" • ");
        }
        meta.push_str(&year.to_string());
    }

    format!(
        concat!(
            r#"<article class="pub-card">"#,
            r#"<h3 class="pub-title"><a href="{}" target="_blank" rel="noopener">{}</a></h3>"#,
            r#"<div class="pub-meta">{}</div>{}</article>"#
        ),
        attr(href),
        text(&publication.title),
        meta,
        authors_block(publication)
    )
}

/// `<option>` list with a leading "all" entry whose value is empty.
pub fn select_options<'a>(all_label: &str, items: impl IntoIterator<Item = (String, &'a str)>) -> String {
    let mut html = format!(r#"<option value="">{}</option>"#, text(all_label));
    for (value, label) in items {
        html.push_str(&format!(
            r#"<option value="{}">{}</option>"#,
            attr(&value),
            text(label)
        ));
    }
    html
}

pub fn year_options(options: &FilterOptions) -> String {
    let years: Vec<String> = options.years.iter().map(i32::to_string).collect();
    select_options("All years", years.iter().map(|y| (y.clone(), y.as_str())))
}

pub fn author_options(options: &FilterOptions) -> String {
    select_options(
        "All authors (group)",
        options.authors.iter().map(|a| (a.id.clone(), a.name.as_str())),
    )
}

pub fn category_options(options: &FilterOptions) -> String {
    select_options(
        "All categories",
        options.categories.iter().map(|c| (c.clone(), c.as_str())),
    )
}

/// Cards of the currently visible slice.
pub fn result_cards(browser: &PublicationBrowser) -> String {
    browser.visible().map(publication_card).collect()
}

/// The full results region: filter controls, cards, and the "load more"
/// wrapper, hidden when every match is already visible.
pub fn publications_section(browser: &PublicationBrowser) -> String {
    let options = browser.options();
    let hidden = if browser.has_more() { "" } else { " hidden" };
    format!(
        concat!(
            r#"<div class="pub-filters">"#,
            r#"<input id="q" type="search" placeholder="Search title, venue or author">"#,
            r#"<select id="year">{}</select>"#,
            r#"<select id="author">{}</select>"#,
            r#"<select id="category">{}</select>"#,
            r#"<button id="clear" type="button">Clear</button></div>"#,
            r#"<div id="pub-results">{}</div>"#,
            r#"<div id="load-more-wrap" class="load-more{}"><button id="load-more" type="button">Load more</button></div>"#
        ),
        year_options(options),
        author_options(options),
        category_options(options),
        result_cards(browser),
        hidden
    )
}

/// Message shown when no profile could be loaded; no filter controls.
pub fn failure_message(detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!(
            r#"<div id="pub-results"><p>Failed to load publications.<br>{}</p></div>"#,
            text(detail)
        ),
        None => r#"<div id="pub-results"><p>No valid profiles found.</p></div>"#.to_string(),
    }
}
