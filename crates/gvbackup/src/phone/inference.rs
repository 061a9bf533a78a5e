//! Recovering the other party's number for a single-recipient conversation.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use super::{PhoneNumber, acceptable_fallback, first_sender_number, number_from_file_stem};
use crate::attachments::{ArchiveFiles, file_name_of};
use crate::document::{ConversationDocument, read_document};

const CALL_LOG_SEPARATOR: &str = " - ";

/// Searches progressively wider for the conversation's number: the page's
/// own senders, its file name, sibling pages sharing a name prefix, and
/// finally call-log pages for the same contact.
pub fn infer_conversation_number(
    document: &ConversationDocument,
    files: &ArchiveFiles,
) -> Result<Option<PhoneNumber>> {
    if let Some(number) = first_sender_number(&document.messages) {
        return Ok(Some(number));
    }

    let stem = document.file_stem();
    if let Some(number) = number_from_file_stem(&stem) {
        debug!(document = %document.file_name(), "conversation number taken from file name");
        return Ok(Some(number));
    }

    let sibling_prefix = stem.split('-').next().unwrap_or_default();
    for sibling in related_pages(document, files, sibling_prefix) {
        let sibling_document = read_document(sibling)?;
        if let Some(number) = first_sender_number(&sibling_document.messages) {
            debug!(
                document = %document.file_name(),
                sibling = %file_name_of(sibling),
                "conversation number taken from sibling page"
            );
            return Ok(Some(number));
        }
    }

    let contact_prefix = format!(
        "{}{CALL_LOG_SEPARATOR}",
        stem.split(CALL_LOG_SEPARATOR).next().unwrap_or_default()
    );
    for call_log in related_pages(document, files, &contact_prefix) {
        let call_log_document = read_document(call_log)?;
        let Some(contributor) = call_log_document.contributors.last() else {
            continue;
        };
        if let Some(number) = acceptable_fallback(contributor) {
            debug!(
                document = %document.file_name(),
                call_log = %file_name_of(call_log),
                "conversation number taken from call log"
            );
            return Ok(Some(number));
        }
    }

    warn!(document = %document.file_name(), "could not determine conversation number");
    Ok(None)
}

fn related_pages<'a>(
    document: &'a ConversationDocument,
    files: &'a ArchiveFiles,
    prefix: &'a str,
) -> impl Iterator<Item = &'a Path> + 'a {
    files
        .under(document.directory())
        .filter(move |path| {
            let name = file_name_of(path);
            name.starts_with(prefix) && name.ends_with(".html")
        })
        .filter(move |path| *path != document.path.as_path())
}
