use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ArchiveFiles, file_name_of};
use crate::document::read_document;
use crate::error::IntegrityError;

pub const NORMALIZED_NAME_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentMatch {
    Matched(String),
    Unresolved,
}

/// Archive-wide mapping from in-page attachment references to file names,
/// together with the set of files already claimed by a reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentIndex {
    entries: Vec<(String, AttachmentMatch)>,
    lookup: HashMap<String, usize>,
    claimed: BTreeSet<String>,
}

impl AttachmentIndex {
    #[must_use]
    pub fn get(&self, reference: &str) -> Option<&AttachmentMatch> {
        self.lookup
            .get(reference)
            .map(|position| &self.entries[*position].1)
    }

    /// File name to search for: the matched file, or the reference itself
    /// when the archive-wide pass found nothing.
    #[must_use]
    pub fn candidate_name<'a>(&'a self, reference: &'a str) -> &'a str {
        match self.get(reference) {
            Some(AttachmentMatch::Matched(file_name)) => file_name,
            _ => reference,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, matched)| *matched == AttachmentMatch::Unresolved)
            .count()
    }

    #[must_use]
    pub fn is_claimed(&self, file_name: &str) -> bool {
        self.claimed.contains(file_name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &AttachmentMatch)> {
        self.entries
            .iter()
            .map(|(reference, matched)| (reference.as_str(), matched))
    }

    /// Reference → file name (`null` when unresolved), for diagnostics.
    #[must_use]
    pub fn to_report(&self) -> BTreeMap<String, Option<String>> {
        self.entries
            .iter()
            .map(|(reference, matched)| {
                let file_name = match matched {
                    AttachmentMatch::Matched(name) => Some(name.clone()),
                    AttachmentMatch::Unresolved => None,
                };
                (reference.clone(), file_name)
            })
            .collect()
    }

    fn insert(&mut self, reference: String, matched: AttachmentMatch) -> Result<()> {
        if self.lookup.contains_key(&reference) {
            return Err(IntegrityError::DuplicateReference { reference }.into());
        }
        self.lookup.insert(reference.clone(), self.entries.len());
        self.entries.push((reference, matched));
        Ok(())
    }
}

/// Scans every HTML page and attachment file under the archive root.
pub fn build_index(files: &ArchiveFiles) -> Result<AttachmentIndex> {
    let mut references = Vec::new();
    for path in files.html_documents() {
        let document = read_document(path)?;
        references.extend(document.references);
    }

    let file_names = files
        .attachments()
        .map(|(path, _)| file_name_of(path))
        .collect();

    build_index_from(references, file_names)
}

/// Claims, for each reference in order, the first unclaimed file whose
/// normalized name occurs in the reference string.
pub fn build_index_from(
    references: impl IntoIterator<Item = String>,
    mut file_names: Vec<String>,
) -> Result<AttachmentIndex> {
    file_names.sort_by_cached_key(|name| filename_sort_key(name));
    let normalized = file_names
        .iter()
        .map(|name| normalize_filename(name))
        .collect::<Vec<_>>();

    let mut index = AttachmentIndex::default();
    for reference in references {
        let assigned = file_names
            .iter()
            .zip(&normalized)
            .find(|(name, normalized)| {
                reference.contains(normalized.as_str()) && !index.claimed.contains(*name)
            })
            .map(|(name, _)| name.clone());

        let matched = match assigned {
            Some(name) => {
                debug!(reference = %reference, file = %name, "claimed attachment file");
                index.claimed.insert(name.clone());
                AttachmentMatch::Matched(name)
            }
            None => {
                warn!(reference = %reference, "no archive-wide attachment match; deferring to document search");
                AttachmentMatch::Unresolved
            }
        };
        index.insert(reference, matched)?;
    }

    Ok(index)
}

/// Strips the extension and a trailing `(N)` disambiguator, then truncates to
/// the prefix the exporter preserves in reference strings.
#[must_use]
pub fn normalize_filename(file_name: &str) -> String {
    normalize_regex()
        .replace(file_name, "")
        .chars()
        .take(NORMALIZED_NAME_MAX_CHARS)
        .collect()
}

/// Sort key placing `name.jpg` before `name(1).jpg` before `name(2).jpg`.
#[must_use]
pub fn filename_sort_key(file_name: &str) -> (String, Option<u64>, String) {
    match sort_key_regex().captures(file_name) {
        Some(captures) => {
            let base = captures.get(1).map_or("", |m| m.as_str()).to_string();
            let number = captures
                .get(2)
                .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX));
            let extension = captures.get(3).map_or("", |m| m.as_str()).to_string();
            (base, number, extension)
        }
        None => (file_name.to_string(), Some(u64::MAX), String::new()),
    }
}

fn normalize_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)(?:\(\d+\))?\.(?:jpg|jpeg|gif|png|vcf)$")
            .expect("filename normalize regex should compile")
    })
}

fn sort_key_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^(.*?)(?:\((\d+)\))?(\.\w+)?$").expect("filename sort regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use super::{AttachmentMatch, build_index_from, filename_sort_key, normalize_filename};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[test]
    fn normalizes_extension_and_suffix() {
        assert_eq!(normalize_filename("photo(2).jpg"), "photo");
        assert_eq!(normalize_filename("photo.JPEG"), "photo");
        assert_eq!(normalize_filename("card.vcf"), "card");
        assert_eq!(normalize_filename("notes.txt"), "notes.txt");
        let long = format!("{}(1).gif", "x".repeat(80));
        assert_eq!(normalize_filename(&long).chars().count(), 50);
    }

    #[test]
    fn bare_name_sorts_before_suffixed_variants() {
        let mut files = names(&["photo(2).jpg", "photo(10).jpg", "photo.jpg", "photo(1).jpg"]);
        files.sort_by_key(|name| filename_sort_key(name));
        assert_eq!(
            files,
            names(&["photo.jpg", "photo(1).jpg", "photo(2).jpg", "photo(10).jpg"])
        );
    }

    #[test]
    fn oversized_suffix_sorts_after_every_numbered_copy() {
        let huge = "photo(99999999999999999999999).jpg";
        assert_eq!(
            filename_sort_key(huge),
            ("photo".to_string(), Some(u64::MAX), ".jpg".to_string())
        );

        let mut files = names(&[huge, "photo(2).jpg", "photo.jpg"]);
        files.sort_by_key(|name| filename_sort_key(name));
        assert_eq!(files, names(&["photo.jpg", "photo(2).jpg", huge]));
    }

    #[test]
    fn duplicate_reference_is_an_integrity_error() {
        let err = build_index_from(names(&["a-photo", "a-photo"]), names(&["photo.jpg"]))
            .expect_err("duplicate reference must fail");
        assert!(err.to_string().contains("not unique"));
    }

    #[test]
    fn unmatched_reference_is_unresolved() {
        let index =
            build_index_from(names(&["nothing here"]), names(&["photo.jpg"])).expect("index");
        assert_eq!(index.get("nothing here"), Some(&AttachmentMatch::Unresolved));
        assert_eq!(index.candidate_name("nothing here"), "nothing here");
        assert_eq!(index.unresolved_count(), 1);
        assert!(!index.is_claimed("photo.jpg"));
    }
}
