//! Group-author detection.
//!
//! Deciding whether "J. Doe" on a paper is the roster member "Jane Doe" is a
//! heuristic, so the comparison sits behind [`NameMatcher`]. Two strategies
//! are provided: exact alias matching and a fuzzy matcher that ignores case,
//! diacritics and punctuation and accepts last name + first initial.

use crate::model::{GroupAuthor, MemberProfile, MergedPublication};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Similarity above which two folded full names are considered the same person.
const DEFAULT_SIMILARITY: f64 = 0.96;

/// Decides whether an author string on a paper names a roster member.
pub trait NameMatcher: Send + Sync {
    fn matches(&self, member: &MemberProfile, author: &str) -> bool;
}

/// Case-insensitive equality with the display name or an alias.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactAliasMatcher;

impl NameMatcher for ExactAliasMatcher {
    fn matches(&self, member: &MemberProfile, author: &str) -> bool {
        let author = author.trim().to_lowercase();
        !author.is_empty()
            && member
                .name_variants()
                .any(|variant| variant.trim().to_lowercase() == author)
    }
}

/// Diacritic-insensitive matching with initials and near-identical spellings.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyNameMatcher {
    /// Jaro-Winkler threshold for whole-name comparison
    pub similarity: f64,
}

impl Default for FuzzyNameMatcher {
    fn default() -> Self {
        Self {
            similarity: DEFAULT_SIMILARITY,
        }
    }
}

impl NameMatcher for FuzzyNameMatcher {
    fn matches(&self, member: &MemberProfile, author: &str) -> bool {
        let author = fold_name(author);
        if author.is_empty() {
            return false;
        }
        member.name_variants().any(|variant| {
            let variant = fold_name(variant);
            !variant.is_empty()
                && (variant == author
                    || initial_and_last_name_match(&variant, &author)
                    || strsim::jaro_winkler(&variant, &author) >= self.similarity)
        })
    }
}

/// Lowercase, strip diacritics, turn punctuation into spaces and collapse
/// whitespace: `"Müller-Lüdenscheidt, J."` becomes `"muller ludenscheidt j"`.
pub fn fold_name(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Same last name and same first initial, with at least two tokens on each side.
fn initial_and_last_name_match(a: &str, b: &str) -> bool {
    let a: Vec<&str> = a.split(' ').collect();
    let b: Vec<&str> = b.split(' ').collect();
    if a.len() < 2 || b.len() < 2 {
        return false;
    }
    let same_last = a.last() == b.last();
    let same_initial = a[0].chars().next() == b[0].chars().next();
    same_last && same_initial
}

/// Selectable matching strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Exact,
    #[default]
    Fuzzy,
}

impl MatchStrategy {
    pub fn matcher(self) -> Box<dyn NameMatcher> {
        match self {
            MatchStrategy::Exact => Box::new(ExactAliasMatcher),
            MatchStrategy::Fuzzy => Box::new(FuzzyNameMatcher::default()),
        }
    }
}

impl std::str::FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchStrategy::Exact),
            "fuzzy" => Ok(MatchStrategy::Fuzzy),
            other => Err(format!("unknown match strategy: {}", other)),
        }
    }
}

/// Credit roster members on a publication and inherit their categories.
///
/// Group authors follow roster order; categories are the sorted union of the
/// matched members' tags.
pub fn assign_group_authors(
    publication: &mut MergedPublication,
    roster: &[MemberProfile],
    matcher: &dyn NameMatcher,
) {
    let matched: Vec<&MemberProfile> = roster
        .iter()
        .filter(|member| {
            publication
                .authors
                .iter()
                .any(|author| matcher.matches(member, author))
        })
        .collect();

    let categories: BTreeSet<&str> = matched
        .iter()
        .flat_map(|member| member.categories.iter().map(String::as_str))
        .collect();

    publication.group_authors = matched.iter().map(|m| GroupAuthor::from(*m)).collect();
    publication.categories = categories.into_iter().map(str::to_string).collect();
}
