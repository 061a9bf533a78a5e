//! Phone number normalization and conversation-number inference.

use std::fmt;
use std::sync::OnceLock;

use anyhow::{Result, anyhow};
use phonenumber::Mode;
use regex::Regex;
use tracing::warn;

use crate::document::RawMessage;

pub mod inference;

pub use inference::infer_conversation_number;

/// Address written when no number could be recovered for a conversation.
pub const UNKNOWN_ADDRESS: &str = "0";

const MIN_FILENAME_NUMBER_DIGITS: usize = 7;

/// A canonical E.164 number, or the raw text when it could not be parsed.
#[derive(Debug, Clone, Eq)]
pub enum PhoneNumber {
    Canonical(String),
    Raw(String),
}

impl PhoneNumber {
    #[must_use]
    pub fn unknown() -> Self {
        Self::Raw(UNKNOWN_ADDRESS.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Canonical(value) | Self::Raw(value) => value,
        }
    }
}

impl PartialEq for PhoneNumber {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats an international number (leading `+`) as E.164.
pub fn format_e164(raw: &str) -> Result<String> {
    let parsed = phonenumber::parse(None, raw.trim())
        .map_err(|error| anyhow!("failed to parse phone number `{raw}`: {error}"))?;
    Ok(parsed.format().mode(Mode::E164).to_string())
}

/// Normalizes `raw`, passing it through unchanged when it does not parse.
#[must_use]
pub fn resolve(raw: &str) -> PhoneNumber {
    match format_e164(raw) {
        Ok(formatted) => PhoneNumber::Canonical(formatted),
        Err(error) => {
            warn!(raw, %error, "keeping unparseable phone number as-is");
            PhoneNumber::Raw(raw.to_string())
        }
    }
}

/// First sender in `messages` that has a number and is not the owner.
#[must_use]
pub fn first_sender_number(messages: &[RawMessage]) -> Option<PhoneNumber> {
    messages
        .iter()
        .filter(|message| !message.self_authored)
        .filter_map(|message| message.sender.as_ref())
        .filter(|sender| !sender.is_owner_label())
        .find(|sender| !sender.number.is_empty())
        .map(|sender| resolve(&sender.number))
}

/// Number prefix of an export file name such as `+15551234567 - Text - ...`.
#[must_use]
pub fn number_from_file_stem(stem: &str) -> Option<PhoneNumber> {
    let found = filename_number_regex().find(stem)?.as_str();
    acceptable_fallback(found)
}

/// Accepts `raw` as a fallback number when it carries enough digits.
#[must_use]
pub fn acceptable_fallback(raw: &str) -> Option<PhoneNumber> {
    let digits = raw.chars().filter(char::is_ascii_digit).count();
    (digits >= MIN_FILENAME_NUMBER_DIGITS).then(|| resolve(raw))
}

fn filename_number_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^\+[0-9]+").expect("filename number regex should compile"))
}
