//! Attachment files of an export archive and how HTML references map to them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

pub mod index;
pub mod locator;

pub use index::{AttachmentIndex, AttachmentMatch, build_index};
pub use locator::{ClaimedFiles, locate};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
pub const CONTACT_CARD_EXTENSIONS: &[&str] = &["vcf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Image,
    ContactCard,
}

impl AttachmentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::ContactCard => "contact card",
        }
    }

    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Image => IMAGE_EXTENSIONS,
            Self::ContactCard => CONTACT_CARD_EXTENSIONS,
        }
    }

    #[must_use]
    pub fn matches(self, path: &Path) -> bool {
        lowercase_extension(path)
            .is_some_and(|extension| self.extensions().contains(&extension.as_str()))
    }
}

#[must_use]
pub fn classify(path: &Path) -> Option<AttachmentKind> {
    [AttachmentKind::Image, AttachmentKind::ContactCard]
        .into_iter()
        .find(|kind| kind.matches(path))
}

#[must_use]
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

/// Sorted listing of every regular file below an archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFiles {
    files: Vec<PathBuf>,
}

impl ArchiveFiles {
    pub fn scan(root: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry
                .with_context(|| format!("failed to walk archive directory: {}", root.display()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(Self::from_paths(files))
    }

    #[must_use]
    pub fn from_paths(mut files: Vec<PathBuf>) -> Self {
        files.sort();
        files.dedup();
        Self { files }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Files at or below `dir`.
    pub fn under<'a>(&'a self, dir: &'a Path) -> impl Iterator<Item = &'a Path> + 'a {
        self.iter().filter(move |path| path.starts_with(dir))
    }

    pub fn attachments(&self) -> impl Iterator<Item = (&Path, AttachmentKind)> {
        self.iter()
            .filter_map(|path| classify(path).map(|kind| (path, kind)))
    }

    #[must_use]
    pub fn count_of(&self, kind: AttachmentKind) -> usize {
        self.attachments()
            .filter(|(_, candidate)| *candidate == kind)
            .count()
    }

    pub fn html_documents(&self) -> impl Iterator<Item = &Path> {
        self.iter().filter(|path| {
            path.extension()
                .and_then(std::ffi::OsStr::to_str)
                .is_some_and(|extension| extension == "html")
        })
    }
}

#[must_use]
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{ArchiveFiles, AttachmentKind, classify};

    #[test]
    fn classifies_extensions_case_insensitively() {
        assert_eq!(classify(Path::new("a.JPG")), Some(AttachmentKind::Image));
        assert_eq!(classify(Path::new("a.jpeg")), Some(AttachmentKind::Image));
        assert_eq!(classify(Path::new("a.vcf")), Some(AttachmentKind::ContactCard));
        assert_eq!(classify(Path::new("a.html")), None);
        assert_eq!(classify(Path::new("noext")), None);
    }

    #[test]
    fn counts_attachments_by_kind() {
        let files = ArchiveFiles::from_paths(vec![
            PathBuf::from("/a/x.jpg"),
            PathBuf::from("/a/y.gif"),
            PathBuf::from("/a/z.vcf"),
            PathBuf::from("/a/page.html"),
        ]);
        assert_eq!(files.count_of(AttachmentKind::Image), 2);
        assert_eq!(files.count_of(AttachmentKind::ContactCard), 1);
        assert_eq!(files.html_documents().count(), 1);
    }
}
