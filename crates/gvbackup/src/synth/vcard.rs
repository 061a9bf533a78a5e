use std::path::Path;

use anyhow::{Context, Result};

const LOCATION_CARD_NAME: &str = "Current Location";
const NAME_FIELD: &str = "FN:";
const PREFERRED_URL_FIELD: &str = "URL;type=pref:";

/// A contact card the exporter produced for a shared location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPin {
    pub url: Option<String>,
}

pub fn read_location_pin(path: &Path) -> Result<Option<LocationPin>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read contact card: {}", path.display()))?;
    Ok(parse_location_pin(&String::from_utf8_lossy(&bytes)))
}

/// Recognizes a location card by its `FN:` line and takes the first
/// preferred URL that follows it, with vCard backslash escapes removed.
#[must_use]
pub fn parse_location_pin(card: &str) -> Option<LocationPin> {
    let mut lines = card.lines();
    lines.find(|line| line.starts_with(NAME_FIELD) && line.contains(LOCATION_CARD_NAME))?;

    let url = lines
        .find_map(|line| line.strip_prefix(PREFERRED_URL_FIELD))
        .map(|url| url.trim().replace('\\', ""));
    Some(LocationPin { url })
}

/// Text body that replaces a location card.
#[must_use]
pub fn dropped_pin_text(url: &str) -> String {
    format!("Dropped pin\n{url}")
}
