//! Document-local attachment search.
//!
//! The export's reference strings and saved file names drift apart in a few
//! recurring ways; each strategy below covers one of them. Strategies are
//! tried in order and the first one yielding exactly one file wins.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use super::{ArchiveFiles, AttachmentIndex, AttachmentKind, AttachmentMatch, file_name_of};
use crate::error::IntegrityError;

const TOKEN_SEPARATOR: &str = " - ";

/// One lookup: which reference, on which page, for which kind of file.
#[derive(Debug, Clone, Copy)]
pub struct LocateRequest<'a> {
    pub reference: &'a str,
    /// Matched file name from the index, or the reference itself.
    pub candidate: &'a str,
    pub kind: AttachmentKind,
    pub document: &'a Path,
}

impl LocateRequest<'_> {
    fn candidate_stem(&self) -> String {
        Path::new(self.candidate)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| self.candidate.to_string())
    }

    fn document_stem(&self) -> String {
        self.document
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Files already handed to a reference during this run. Starts out with
/// every file the archive-wide index claimed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimedFiles(BTreeSet<PathBuf>);

impl ClaimedFiles {
    #[must_use]
    pub fn seeded(index: &AttachmentIndex, files: &ArchiveFiles) -> Self {
        Self(
            files
                .attachments()
                .filter(|(path, _)| index.is_claimed(&file_name_of(path)))
                .map(|(path, _)| path.to_path_buf())
                .collect(),
        )
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    pub fn claim(&mut self, path: &Path) {
        self.0.insert(path.to_path_buf());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub type Strategy = fn(&LocateRequest<'_>, &[&Path]) -> Vec<PathBuf>;

pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("exact_name", exact_name),
    ("same_stem", same_stem),
    ("without_leading_token", without_leading_token),
    ("document_name", document_name),
];

/// Resolves `reference` on `document` to exactly one attachment file and
/// claims it. Files claimed by other references are not candidates.
pub fn locate(
    index: &AttachmentIndex,
    files: &ArchiveFiles,
    claimed: &mut ClaimedFiles,
    document: &Path,
    reference: &str,
    kind: AttachmentKind,
) -> Result<PathBuf> {
    let request = LocateRequest {
        reference,
        candidate: index.candidate_name(reference),
        kind,
        document,
    };
    let directory = document.parent().unwrap_or_else(|| Path::new("."));
    let own_match = match index.get(reference) {
        Some(AttachmentMatch::Matched(file_name)) => Some(file_name.as_str()),
        _ => None,
    };
    let pool = files
        .under(directory)
        .filter(|path| kind.matches(path))
        .filter(|path| {
            !claimed.contains(path) || own_match.is_some_and(|name| file_name_of(path) == name)
        })
        .collect::<Vec<_>>();

    let found = run_strategies(&request, &pool)?;
    claimed.claim(&found);
    Ok(found)
}

/// Runs [`STRATEGIES`] against a prepared pool of same-kind files.
pub fn run_strategies(request: &LocateRequest<'_>, pool: &[&Path]) -> Result<PathBuf> {
    let mut ambiguous = None;
    for (name, strategy) in STRATEGIES {
        let mut found = strategy(request, pool);
        debug!(
            strategy = name,
            reference = request.reference,
            matches = found.len(),
            "attachment search"
        );
        match found.len() {
            0 => {}
            1 => return Ok(found.remove(0)),
            _ => {
                ambiguous.get_or_insert(found);
            }
        }
    }

    let document = file_name_of(request.document);
    match ambiguous {
        Some(candidates) => Err(IntegrityError::AmbiguousAttachment {
            kind: request.kind.as_str(),
            reference: request.reference.to_string(),
            document,
            candidates: candidates.iter().map(|path| file_name_of(path)).collect(),
        }
        .into()),
        None => Err(IntegrityError::AttachmentNotFound {
            kind: request.kind.as_str(),
            reference: request.reference.to_string(),
            document,
        }
        .into()),
    }
}

/// The candidate name exactly.
#[must_use]
pub fn exact_name(request: &LocateRequest<'_>, pool: &[&Path]) -> Vec<PathBuf> {
    let candidate = Path::new(request.candidate);
    pool.iter()
        .filter(|path| path.ends_with(candidate))
        .map(|path| path.to_path_buf())
        .collect()
}

/// Same stem with whatever extension is on disk.
#[must_use]
pub fn same_stem(request: &LocateRequest<'_>, pool: &[&Path]) -> Vec<PathBuf> {
    let prefix = format!("{}.", request.candidate_stem());
    pool.iter()
        .filter(|path| file_name_of(path).starts_with(&prefix))
        .map(|path| path.to_path_buf())
        .collect()
}

/// Drops the leading ` - ` token, which is sometimes a contact name in one
/// place and a phone number in the other.
#[must_use]
pub fn without_leading_token(request: &LocateRequest<'_>, pool: &[&Path]) -> Vec<PathBuf> {
    let stem = request.candidate_stem();
    let Some((_, rest)) = stem.split_once(TOKEN_SEPARATOR) else {
        return Vec::new();
    };
    let needle = format!("{TOKEN_SEPARATOR}{rest}");
    pool.iter()
        .filter(|path| file_name_of(path).contains(&needle))
        .map(|path| path.to_path_buf())
        .collect()
}

/// Falls back to the page's own file name, with and without a trailing
/// `(N)` page disambiguator, trying each extension of the kind in turn.
#[must_use]
pub fn document_name(request: &LocateRequest<'_>, pool: &[&Path]) -> Vec<PathBuf> {
    let stem = request.document_stem();
    let mut bases = vec![stem.clone()];
    if let Some((base, _)) = stem.split_once('(') {
        bases.push(base.to_string());
    }

    let mut first_ambiguous = Vec::new();
    for base in &bases {
        for extension in request.kind.extensions() {
            let suffix = format!(".{extension}");
            let mut found = pool
                .iter()
                .filter(|path| {
                    let name = file_name_of(path);
                    name.starts_with(base.as_str())
                        && name.len() >= base.len() + suffix.len()
                        && name.to_ascii_lowercase().ends_with(&suffix)
                })
                .map(|path| path.to_path_buf())
                .collect::<Vec<_>>();

            if found.len() > 1
                && let Some(narrowed) = found
                    .iter()
                    .find(|path| stem_of(path).is_some_and(|s| request.candidate.contains(&s)))
            {
                found = vec![narrowed.clone()];
            }

            match found.len() {
                1 => return found,
                0 => {}
                _ => {
                    if first_ambiguous.is_empty() {
                        first_ambiguous = found;
                    }
                }
            }
        }
    }
    first_ambiguous
}

fn stem_of(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
}
