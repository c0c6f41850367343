//! Keyword topic classification of member publication files.
//!
//! Every record found in `members/*/publications.json` gets a list of topic
//! labels from its Semantic Scholar fields of study and from keyword rules
//! over title, venue and abstract. The result is written to
//! `data/publication_categories.json`, keyed by paper identity. It is a
//! standalone data file: member category tags on merged publications are not
//! touched.

use crate::error::{LabsiteError, Result};
use crate::sync::write_json_atomic;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const OVERRIDES_PATH: &str = "data/categories.overrides.json";
pub const CATEGORIES_PATH: &str = "data/publication_categories.json";

/// Label given when nothing else matches
pub const DEFAULT_CATEGORY: &str = "Other";

const TITLE_KEY_LEN: usize = 120;

/// Semantic Scholar field of study to site label
const FIELD_MAP: &[(&str, &str)] = &[
    ("Quantum computing", "Quantum Computing"),
    ("Quantum information", "Quantum Information"),
    ("Quantum communication", "Quantum Communication"),
    ("Optics", "Photonics"),
    ("Photonics", "Photonics"),
    ("Machine learning", "Machine Learning"),
    ("Computer science", "Machine Learning"),
    ("Electrical engineering", "Photonics"),
    ("Physics", "Quantum Information"),
];

/// Keyword patterns over the lowercased title, venue and abstract
const KEYWORD_RULES: &[(&str, &str)] = &[
    (
        r"\bkey distribution|qkd|bb84|decoy|quantum network|satellite\b",
        "Quantum Communication",
    ),
    (
        r"\bnonlinear|non-linear|second-harmonic|four[- ]wave|chi\(2\)|chi\(3\)\b",
        "Quantum Nonlinear Optics",
    ),
    (
        r"\blight[-– ]?matter|atom(s)?|ion(s)?|cavity|rydberg|emitter\b",
        "Quantum Light–Matter Interaction",
    ),
    (
        r"\bquantum simulation|simulator|hubbard|ising|lattice\b",
        "Quantum Simulation",
    ),
    (
        r"\bphotonic(s)?|waveguide|ring resonator|integrated optics|optical circuit\b",
        "Photonic QIP",
    ),
    (
        r"\bultrafast|femtosecond|picosecond|attosecond|pump[- ]probe\b",
        "Ultrafast Quantum Photonics",
    ),
    (
        r"\bkernel|gaussian process|graph neural|neural network|machine learning|reinforcement\b",
        "Machine Learning",
    ),
];

/// Keys under which a publications file may wrap its list
const WRAPPED_KEYS: &[&str] = &["publications", "papers", "items", "results"];

fn str_field<'a>(record: &'a Map<String, Value>, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).map_or("", str::trim)
}

fn normalize_doi(doi: &str) -> String {
    let doi = doi.trim().to_lowercase();
    let doi = doi.strip_prefix("https://doi.org/").unwrap_or(&doi);
    doi.strip_prefix("doi:").unwrap_or(doi).to_string()
}

/// Identity of a record in the output file: `S2:<paperId>`, `DOI:<doi>`, the
/// URL, then `TITLE:<lowercased title prefix>`.
pub fn classification_key(record: &Map<String, Value>) -> Option<String> {
    let paper_id = str_field(record, "paperId");
    if !paper_id.is_empty() {
        return Some(format!("S2:{}", paper_id));
    }
    let doi = normalize_doi(str_field(record, "doi"));
    if !doi.is_empty() {
        return Some(format!("DOI:{}", doi));
    }
    let url = str_field(record, "url");
    if !url.is_empty() {
        return Some(url.to_string());
    }
    let title: String = str_field(record, "title")
        .to_lowercase()
        .chars()
        .take(TITLE_KEY_LEN)
        .collect();
    (!title.is_empty()).then(|| format!("TITLE:{}", title))
}

/// Records of a publications file. Bare strings become `{"url": ...}`; a
/// single object with an identity field is one record.
pub fn records_from_value(value: Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                Value::String(url) => {
                    let mut record = Map::new();
                    record.insert("url".to_string(), Value::String(url));
                    Some(record)
                }
                _ => None,
            })
            .collect(),
        Value::Object(mut record) => {
            if ["paperId", "doi", "url", "title"].iter().any(|k| record.contains_key(*k)) {
                return vec![record];
            }
            WRAPPED_KEYS
                .iter()
                .find_map(|key| match record.remove(*key) {
                    Some(list @ Value::Array(_)) => Some(records_from_value(list)),
                    _ => None,
                })
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Compiled keyword rules.
pub struct TopicClassifier {
    rules: Vec<(Regex, &'static str)>,
}

impl TopicClassifier {
    pub fn new() -> Result<Self> {
        let rules = KEYWORD_RULES
            .iter()
            .map(|(pattern, label)| {
                Regex::new(pattern)
                    .map(|re| (re, *label))
                    .map_err(|e| LabsiteError::Parse(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Sorted labels for one record, `Other` when nothing matches.
    pub fn categories(&self, record: &Map<String, Value>) -> Vec<String> {
        let mut labels = BTreeSet::new();

        let fields = record.get("fieldsOfStudy").and_then(Value::as_array);
        for field in fields.into_iter().flatten().filter_map(Value::as_str) {
            if let Some((_, label)) = FIELD_MAP.iter().find(|(name, _)| *name == field) {
                labels.insert(label.to_string());
            }
        }

        let haystack = ["title", "venue", "abstract"]
            .iter()
            .map(|key| str_field(record, key).to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        for (pattern, label) in &self.rules {
            if pattern.is_match(&haystack) {
                labels.insert(label.to_string());
            }
        }

        if labels.is_empty() {
            labels.insert(DEFAULT_CATEGORY.to_string());
        }
        labels.into_iter().collect()
    }
}

/// Manual label overrides. A missing, empty or malformed file means none.
pub fn load_overrides(path: &Path) -> BTreeMap<String, Vec<String>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => return BTreeMap::new(),
    };
    if text.trim().is_empty() {
        warn!(path = %path.display(), "Overrides file is empty");
        return BTreeMap::new();
    }
    match serde_json::from_str(&text) {
        Ok(overrides) => overrides,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not parse overrides");
            BTreeMap::new()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassifyReport {
    pub entries: usize,
    /// Files that could not be read or parsed
    pub skipped_files: Vec<PathBuf>,
    /// Records without any identity
    pub malformed: usize,
    pub output: PathBuf,
}

/// Every `members/<id>/publications.json` under `root`, sorted.
fn publication_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(root.join("members"))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("publications.json"))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Classify every member publication file under a local site root and write
/// the label map.
pub fn classify_site(root: &Path) -> Result<ClassifyReport> {
    let classifier = TopicClassifier::new()?;
    let overrides = load_overrides(&root.join(OVERRIDES_PATH));
    let mut report = ClassifyReport {
        output: root.join(CATEGORIES_PATH),
        ..Default::default()
    };
    let mut labels: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for path in publication_files(root)? {
        let value = std::fs::read_to_string(&path)
            .map_err(LabsiteError::from)
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(LabsiteError::from));
        let value = match value {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping publications file");
                report.skipped_files.push(path);
                continue;
            }
        };

        for record in records_from_value(value) {
            let Some(key) = classification_key(&record) else {
                report.malformed += 1;
                continue;
            };
            let categories: Vec<String> = match overrides.get(&key) {
                Some(manual) => manual.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect(),
                None => classifier.categories(&record),
            };
            labels.insert(key, categories);
        }
    }

    write_json_atomic(&report.output, &labels)?;
    report.entries = labels.len();
    info!(
        entries = report.entries,
        malformed = report.malformed,
        path = %report.output.display(),
        "Wrote publication categories"
    );
    Ok(report)
}
