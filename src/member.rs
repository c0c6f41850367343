//! Member profile page.
//!
//! Combines `profile.json`, the hand-written sections of `page.html`, the
//! member's local publications, an optional CV and an optional
//! `slides.json` into one page.

use crate::carousel::Carousel;
use crate::documents::{load_local_publications, load_profile, member_file};
use crate::error::{LabsiteError, Result};
use crate::model::{MemberProfile, RawPublication};
use crate::source::{fetch_json, SiteSource};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Publications listed on a member page
pub const RECENT_LIMIT: usize = 6;

pub const PHOTO_PLACEHOLDER: &str = "assets/img/person-placeholder.svg";

/// Hand-written sections of `members/<id>/page.html`, kept as HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSections {
    pub about: String,
    pub interests: Vec<String>,
    pub patents: Vec<String>,
}

pub fn parse_page_sections(html: &str) -> Result<PageSections> {
    let document = Html::parse_document(html);
    let about_selector = Selector::parse("#about").map_err(|e| LabsiteError::Parse(e.to_string()))?;
    let interest_selector =
        Selector::parse("#ri-list li").map_err(|e| LabsiteError::Parse(e.to_string()))?;
    let patent_selector =
        Selector::parse("#patents-list li").map_err(|e| LabsiteError::Parse(e.to_string()))?;

    Ok(PageSections {
        about: document
            .select(&about_selector)
            .next()
            .map(|e| e.inner_html().trim().to_string())
            .unwrap_or_default(),
        interests: document
            .select(&interest_selector)
            .map(|e| e.inner_html().trim().to_string())
            .collect(),
        patents: document
            .select(&patent_selector)
            .map(|e| e.inner_html().trim().to_string())
            .collect(),
    })
}

/// A research interest written as `Title — description`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub title: String,
    pub description: Option<String>,
}

pub fn split_interest(item: &str) -> Interest {
    match item.split_once('—') {
        Some((title, rest)) => Interest {
            title: title.trim().to_string(),
            description: Some(rest.trim().to_string()).filter(|d| !d.is_empty()),
        },
        None => Interest {
            title: item.trim().to_string(),
            description: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentPublication {
    pub title: String,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub href: String,
}

/// Titled publications, newest first, at most `limit`. Links go to the DOI
/// resolver when a DOI exists.
pub fn recent_publications(publications: &[RawPublication], limit: usize) -> Vec<RecentPublication> {
    let mut titled: Vec<&RawPublication> = publications
        .iter()
        .filter(|p| !p.title_str().trim().is_empty())
        .collect();
    titled.sort_by_key(|p| std::cmp::Reverse(p.year.unwrap_or(0)));

    titled
        .into_iter()
        .take(limit)
        .map(|p| RecentPublication {
            title: p.title_str().to_string(),
            year: p.year,
            venue: p.venue.clone().filter(|v| !v.trim().is_empty()),
            href: match p.doi_str() {
                Some(doi) => format!("https://doi.org/{}", doi),
                None if !p.url_str().trim().is_empty() => p.url_str().to_string(),
                None => "#".to_string(),
            },
        })
        .collect()
}

/// CV locations tried in order.
pub fn cv_candidates(id: &str) -> [String; 4] {
    [
        member_file(id, "cv.pdf"),
        member_file(id, "resume.pdf"),
        member_file(id, &format!("{}-cv.pdf", id)),
        member_file(id, &format!("{}-resume.pdf", id)),
    ]
}

pub async fn find_cv<S: SiteSource>(source: &S, id: &str) -> Option<String> {
    for candidate in cv_candidates(id) {
        if source.exists(&candidate).await {
            return Some(candidate);
        }
    }
    None
}

/// One entry of `members/<id>/slides.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

pub async fn load_slides<S: SiteSource>(source: &S, id: &str) -> Vec<Slide> {
    match fetch_json::<S, Vec<Slide>>(source, &member_file(id, "slides.json")).await {
        Ok(slides) => slides.into_iter().filter(|s| !s.image.is_empty()).collect(),
        Err(LabsiteError::NotFound(_)) => Vec::new(),
        Err(e) => {
            warn!(member = id, error = %e, "Ignoring slides.json");
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialLink {
    pub label: &'static str,
    pub href: String,
}

/// Social links present on a profile, in display order.
pub fn social_links(profile: &MemberProfile) -> Vec<SocialLink> {
    let orcid = profile.orcid.as_ref().map(|id| format!("https://orcid.org/{}", id));
    [
        ("LinkedIn", profile.linkedin.clone()),
        ("Google Scholar", profile.scholar.clone()),
        ("GitHub", profile.github.clone()),
        ("ORCID", orcid),
        ("Website", profile.website.clone()),
    ]
    .into_iter()
    .filter_map(|(label, href)| href.map(|href| SocialLink { label, href }))
    .collect()
}

/// Everything shown on a member page.
#[derive(Debug, Clone, Default)]
pub struct MemberPage {
    pub profile: MemberProfile,
    pub sections: PageSections,
    pub publications: Vec<RecentPublication>,
    pub cv: Option<String>,
    pub slides: Vec<Slide>,
}

/// Load a member page. Every part is optional: a missing profile shows the
/// id as the name.
pub async fn load_member_page<S: SiteSource>(source: &S, id: &str) -> MemberPage {
    let profile = match load_profile(source, id).await {
        Ok(profile) => profile,
        Err(e) => {
            debug!(member = id, error = %e, "No profile, using id as name");
            MemberProfile {
                id: id.to_string(),
                name: id.to_string(),
                ..Default::default()
            }
        }
    };

    let sections = match source.fetch_text(&member_file(id, "page.html")).await {
        Ok(html) => parse_page_sections(&html).unwrap_or_else(|e| {
            warn!(member = id, error = %e, "Failed to parse page.html");
            PageSections::default()
        }),
        Err(_) => PageSections::default(),
    };

    let publications = recent_publications(&load_local_publications(source, id).await, RECENT_LIMIT);

    MemberPage {
        profile,
        sections,
        publications,
        cv: find_cv(source, id).await,
        slides: load_slides(source, id).await,
    }
}

fn section(title: &str, body: &str) -> String {
    format!(
        r#"<section class="card section"><h3 class="section__title">{}</h3>{}</section>"#,
        text(title),
        body
    )
}

fn publications_html(publications: &[RecentPublication]) -> String {
    if publications.is_empty() {
        return section("Recent Publications", r#"<p class="muted">No publications found.</p>"#);
    }
    let items: String = publications
        .iter()
        .map(|p| {
            let year = p.year.map(|y| format!(" ({})", y)).unwrap_or_default();
            let venue = p
                .venue
                .as_ref()
                .map(|v| format!(" — <em>{}</em>", text(v)))
                .unwrap_or_default();
            format!(
                r#"<li><div class="pub-title"><a href="{}" target="_blank" rel="noopener">{}</a>{}{}</div></li>"#,
                attr(&p.href),
                text(&p.title),
                year,
                venue
            )
        })
        .collect();
    section("Recent Publications", &format!(r#"<ul class="pubs">{}</ul>"#, items))
}

fn slides_html(slides: &[Slide]) -> String {
    if slides.is_empty() {
        return String::new();
    }
    let carousel = Carousel::new(slides.len(), 1);
    let track: String = slides
        .iter()
        .map(|s| {
            let image = format!(
                r#"<img class="slide__img" src="{}" alt="{}">"#,
                attr(&s.image),
                attr(s.title.as_deref().unwrap_or(""))
            );
            let image = match &s.link {
                Some(link) => format!(r#"<a href="{}" target="_blank" rel="noopener">{}</a>"#, attr(link), image),
                None => image,
            };
            let title = s.title.as_ref().map(|t| format!("<h4>{}</h4>", text(t))).unwrap_or_default();
            let caption = s.caption.as_ref().map(|c| format!("<p>{}</p>", text(c))).unwrap_or_default();
            format!(r#"<div class="slide">{}<div class="slide__body">{}{}</div></div>"#, image, title, caption)
        })
        .collect();
    let dots: String = carousel
        .dots()
        .into_iter()
        .enumerate()
        .map(|(i, active)| {
            format!(
                r#"<button class="slider__dot" type="button" aria-label="Go to slide {}" aria-current="{}"></button>"#,
                i + 1,
                active
            )
        })
        .collect();
    format!(
        r#"<section class="card card--highlight"><div class="slider"><div class="slider__track">{}</div><div class="slider__dots">{}</div></div></section>"#,
        track, dots
    )
}

pub fn render_member_page(page: &MemberPage) -> String {
    let profile = &page.profile;
    let photo = profile.photo.as_deref().unwrap_or(PHOTO_PLACEHOLDER);

    let mut contact = String::new();
    if let Some(email) = &profile.email {
        contact.push_str(&format!(
            r#"<a class="contact-link" href="mailto:{}">{}</a>"#,
            attr(email),
            text(email)
        ));
    }
    if let Some(phone) = &profile.phone {
        let dial: String = phone.chars().filter(|c| *c == '+' || c.is_ascii_digit()).collect();
        contact.push_str(&format!(
            r#"<span class="dot">•</span><a class="contact-link" href="tel:{}">{}</a>"#,
            dial,
            text(phone)
        ));
    }

    let cv = page
        .cv
        .as_ref()
        .map(|path| format!(r#"<a class="btn btn-ghost" href="{}" target="_blank" rel="noopener">Download CV</a>"#, attr(path)))
        .unwrap_or_default();

    let icons: String = social_links(profile)
        .iter()
        .map(|link| {
            format!(
                r#"<a class="icon-btn" href="{}" target="_blank" rel="noopener" aria-label="{}" title="{}">{}</a>"#,
                attr(&link.href),
                link.label,
                link.label,
                text(link.label)
            )
        })
        .collect();

    let about = if page.sections.about.is_empty() {
        String::new()
    } else {
        format!(r#"<section class="card section about">{}</section>"#, page.sections.about)
    };

    let interests = if page.sections.interests.is_empty() {
        String::new()
    } else {
        let cards: String = page
            .sections
            .interests
            .iter()
            .map(|item| {
                let interest = split_interest(item);
                let description = interest.description.map(|d| format!("<p>{}</p>", d)).unwrap_or_default();
                format!(r#"<div class="ri-card"><h4>{}</h4>{}</div>"#, interest.title, description)
            })
            .collect();
        section("Research Interests", &format!(r#"<div class="ri-grid">{}</div>"#, cards))
    };

    let patents = if page.sections.patents.is_empty() {
        String::new()
    } else {
        let items: String = page.sections.patents.iter().map(|p| format!("<li>{}</li>", p)).collect();
        section("Patents", &format!(r#"<ul class="patents">{}</ul>"#, items))
    };

    format!(
        concat!(
            r#"<header class="profile-hero"><div class="hero-inner">"#,
            r#"<img class="avatar" src="{photo}" alt="{name_attr}">"#,
            r#"<div class="meta"><h1 class="title">{name}</h1><p class="subtitle">{role}</p>"#,
            r#"<div class="contact">{contact}</div>"#,
            r#"<div class="actions">{cv}<div class="icon-bar">{icons}</div></div></div></div></header>"#,
            r#"{slides}<div class="profile-sections">{about}{interests}{publications}{patents}</div>"#
        ),
        photo = attr(photo),
        name_attr = attr(&profile.name),
        name = text(&profile.name),
        role = text(profile.role.as_deref().unwrap_or("")),
        contact = contact,
        cv = cv,
        icons = icons,
        slides = slides_html(&page.slides),
        about = about,
        interests = interests,
        publications = publications_html(&page.publications),
        patents = patents,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FsSource;
    use tempfile::TempDir;

    #[test]
    fn test_parse_page_sections() -> Result<()> {
        let html = r#"<html><body>
            <div id="about"><p>Works on <b>optics</b>.</p></div>
            <ul id="ri-list"><li>Photonics — integrated circuits</li><li>Sensing</li></ul>
            <ul id="patents-list"><li>US 1,234</li></ul>
        </body></html>"#;
        let sections = parse_page_sections(html)?;
        assert_eq!(sections.about, "<p>Works on <b>optics</b>.</p>");
        assert_eq!(sections.interests.len(), 2);
        assert_eq!(sections.patents, vec!["US 1,234"]);

        let interest = split_interest(&sections.interests[0]);
        assert_eq!(interest.title, "Photonics");
        assert_eq!(interest.description.as_deref(), Some("integrated circuits"));
        assert_eq!(split_interest("Sensing").description, None);
        Ok(())
    }

    #[test]
    fn test_recent_publications() {
        let pubs: Vec<RawPublication> = (2015..2024)
            .map(|year| RawPublication {
                title: Some(format!("Paper {}", year)),
                year: Some(year),
                url: (year % 2 == 0).then(|| format!("https://x/{}", year)),
                doi: (year == 2023).then(|| "10.1/z".to_string()),
                ..Default::default()
            })
            .chain(std::iter::once(RawPublication {
                year: Some(2030),
                ..Default::default()
            }))
            .collect();
        let recent = recent_publications(&pubs, RECENT_LIMIT);
        assert_eq!(recent.len(), 6);
        assert_eq!(recent[0].title, "Paper 2023");
        assert_eq!(recent[0].href, "https://doi.org/10.1/z");
        assert_eq!(recent[1].href, "https://x/2022");
        assert_eq!(recent[2].href, "#");
    }

    #[test]
    fn test_social_links_order() {
        let profile = MemberProfile {
            orcid: Some("0000-0001".into()),
            github: Some("https://github.com/x".into()),
            ..Default::default()
        };
        let links = social_links(&profile);
        assert_eq!(links[0].label, "GitHub");
        assert_eq!(links[1].href, "https://orcid.org/0000-0001");
    }

    #[tokio::test]
    async fn test_load_member_page() -> Result<()> {
        let dir = TempDir::new()?;
        let member = dir.path().join("members/jdoe");
        std::fs::create_dir_all(&member)?;
        std::fs::write(member.join("profile.json"), r#"{"name": ["Jane Doe"], "phone": "+1 (555) 010"}"#)?;
        std::fs::write(member.join("jdoe-resume.pdf"), b"%PDF")?;
        std::fs::write(member.join("slides.json"), r#"[{"image": "a.jpg", "title": "Lab"}, {"title": "no image"}]"#)?;
        let source = FsSource::new(dir.path());

        let page = load_member_page(&source, "jdoe").await;
        assert_eq!(page.profile.name, "Jane Doe");
        assert_eq!(page.cv.as_deref(), Some("members/jdoe/jdoe-resume.pdf"));
        assert_eq!(page.slides.len(), 1);

        let html = render_member_page(&page);
        assert!(html.contains(r#"href="tel:+1555010""#));
        assert!(html.contains("No publications found."));
        assert!(html.contains(PHOTO_PLACEHOLDER));

        let missing = load_member_page(&source, "nobody").await;
        assert_eq!(missing.profile.name, "nobody");
        assert!(missing.cv.is_none());
        Ok(())
    }
}
