//! Turns parsed conversation pages into backup records.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

pub mod vcard;

use crate::attachments::{
    ArchiveFiles, AttachmentIndex, AttachmentKind, ClaimedFiles, locate, lowercase_extension,
};
use crate::backup::record::is_placeholder_text;
use crate::backup::{
    AddrRole, Direction, MmsAddr, MmsPart, MmsRecord, OutputRecord, RecordSink, SmsRecord,
};
use crate::document::{ConversationDocument, ConversationKind, RawMessage};
use crate::error::IntegrityError;
use crate::phone::{self, PhoneNumber, infer_conversation_number};
use crate::utils::time::parse_timestamp_ms;

use vcard::{dropped_pin_text, read_location_pin};

/// Run-wide state shared by every document: the attachment mapping, the
/// archive listing, the files handed out so far, and the owner's number once
/// seen.
#[derive(Debug, Clone)]
pub struct ConversionContext {
    pub index: AttachmentIndex,
    pub files: ArchiveFiles,
    pub claimed: ClaimedFiles,
    pub owner: Option<PhoneNumber>,
}

impl ConversionContext {
    #[must_use]
    pub fn new(index: AttachmentIndex, files: ArchiveFiles) -> Self {
        let claimed = ClaimedFiles::seeded(&index, &files);
        Self {
            index,
            files,
            claimed,
            owner: None,
        }
    }

    /// Adopts the owner number advertised by `document`, if any.
    pub fn learn_owner(&mut self, document: &ConversationDocument) {
        if let Some(hint) = &document.owner_hint {
            self.owner = Some(phone::resolve(hint));
        }
    }

    fn is_owner(&self, number: &PhoneNumber) -> bool {
        self.owner.as_ref().is_some_and(|owner| owner == number)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSummary {
    pub messages: usize,
    pub sms_records: usize,
    pub mms_records: usize,
    pub suppressed: usize,
}

/// Emits every record for `document` into `sink`. Pages without messages
/// produce nothing.
pub fn synthesize_document(
    context: &mut ConversionContext,
    document: &ConversationDocument,
    sink: &mut impl RecordSink,
) -> Result<DocumentSummary> {
    if document.messages.is_empty() {
        return Ok(DocumentSummary::default());
    }

    let summary = match document.kind {
        ConversationKind::Single => synthesize_single(context, document, sink)?,
        ConversationKind::Group => synthesize_group(context, document, sink)?,
    };
    debug!(
        document = %document.file_name(),
        messages = summary.messages,
        sms = summary.sms_records,
        mms = summary.mms_records,
        suppressed = summary.suppressed,
        "document synthesized"
    );
    Ok(summary)
}

fn synthesize_single(
    context: &mut ConversionContext,
    document: &ConversationDocument,
    sink: &mut impl RecordSink,
) -> Result<DocumentSummary> {
    let number = infer_conversation_number(document, &context.files)?
        .unwrap_or_else(PhoneNumber::unknown);
    let participants = [number];
    let mut summary = DocumentSummary {
        messages: document.messages.len(),
        ..DocumentSummary::default()
    };

    for message in &document.messages {
        if message.has_attachments() {
            let record = build_mms(context, document, message, &participants)?;
            sink.append(OutputRecord::Mms(record))?;
            summary.mms_records += 1;
            continue;
        }
        if is_placeholder_text(&message.body) {
            summary.suppressed += 1;
            continue;
        }

        let sent = message.self_authored
            || message
                .sender
                .as_ref()
                .filter(|sender| !sender.number.is_empty())
                .is_some_and(|sender| context.is_owner(&phone::resolve(&sender.number)));
        let record = SmsRecord {
            address: participants[0].to_string(),
            date_ms: message_timestamp(document, message)?,
            direction: Direction::from_sent(sent),
            body: message.body.clone(),
        };
        sink.append(OutputRecord::Sms(record))?;
        summary.sms_records += 1;
    }

    Ok(summary)
}

fn synthesize_group(
    context: &mut ConversionContext,
    document: &ConversationDocument,
    sink: &mut impl RecordSink,
) -> Result<DocumentSummary> {
    let participants = group_participants(document)?;
    let mut summary = DocumentSummary {
        messages: document.messages.len(),
        ..DocumentSummary::default()
    };

    for message in &document.messages {
        let record = build_mms(context, document, message, &participants)?;
        sink.append(OutputRecord::Mms(record))?;
        summary.mms_records += 1;
    }

    Ok(summary)
}

/// Participant numbers of a group page, in page order.
pub fn group_participants(document: &ConversationDocument) -> Result<Vec<PhoneNumber>> {
    document
        .participants
        .iter()
        .map(|raw| {
            if raw.is_empty() || raw == phone::UNKNOWN_ADDRESS {
                return Err(IntegrityError::MissingParticipantNumber {
                    document: document.file_name(),
                }
                .into());
            }
            Ok(phone::resolve(raw))
        })
        .collect()
}

/// The message's sender, or the sole participant when the export left the
/// sender blank.
pub fn resolve_sender(message: &RawMessage, participants: &[PhoneNumber]) -> Result<PhoneNumber> {
    if let Some(sender) = message
        .sender
        .as_ref()
        .filter(|sender| !sender.number.is_empty())
    {
        return Ok(phone::resolve(&sender.number));
    }

    match participants {
        [only] => Ok(only.clone()),
        _ => Err(IntegrityError::UnattributableSender {
            participants: participants.iter().map(ToString::to_string).collect(),
        }
        .into()),
    }
}

/// Builds one `<mms>` record carrying every participant in its `addrs`.
pub fn build_mms(
    context: &mut ConversionContext,
    document: &ConversationDocument,
    message: &RawMessage,
    participants: &[PhoneNumber],
) -> Result<MmsRecord> {
    let sender = resolve_sender(message, participants)?;
    let direction = Direction::from_sent(context.is_owner(&sender));

    let mut members = participants.to_vec();
    if let Some(owner) = &context.owner
        && !members.contains(owner)
    {
        members.push(owner.clone());
    }
    let addrs = members
        .iter()
        .map(|member| MmsAddr {
            address: member.to_string(),
            role: if *member == sender {
                AddrRole::Originator
            } else {
                AddrRole::Recipient
            },
        })
        .collect();

    let mut attachment_parts = Vec::new();
    let mut pin_url = None;
    for reference in &message.images {
        let path = locate(
            &context.index,
            &context.files,
            &mut context.claimed,
            &document.path,
            reference,
            AttachmentKind::Image,
        )?;
        attachment_parts.push(binary_part(document, &path, AttachmentKind::Image)?);
    }
    for reference in &message.contact_cards {
        let path = locate(
            &context.index,
            &context.files,
            &mut context.claimed,
            &document.path,
            reference,
            AttachmentKind::ContactCard,
        )?;
        match read_location_pin(&path)? {
            Some(pin) => {
                if let Some(url) = pin.url {
                    pin_url = Some(url);
                }
            }
            None => {
                attachment_parts.push(binary_part(document, &path, AttachmentKind::ContactCard)?);
            }
        }
    }

    let text = match pin_url.as_deref() {
        Some(url) if !url.is_empty() => dropped_pin_text(url),
        _ => message.body.clone(),
    };
    let mut parts = Vec::with_capacity(attachment_parts.len() + 1);
    if !is_placeholder_text(&text) {
        parts.push(MmsPart::Text(text));
    }
    parts.extend(attachment_parts);

    Ok(MmsRecord {
        addresses: participants.iter().map(ToString::to_string).collect(),
        date_ms: message_timestamp(document, message)?,
        direction,
        parts,
        addrs,
    })
}

/// Base64 part for an attachment file, named by its path relative to the
/// page's directory.
pub fn binary_part(
    document: &ConversationDocument,
    path: &Path,
    kind: AttachmentKind,
) -> Result<MmsPart> {
    let content_type = content_type_for(path, kind)?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read attachment: {}", path.display()))?;
    let name = path
        .strip_prefix(document.directory())
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();

    Ok(MmsPart::Binary {
        content_type,
        name,
        data_base64: STANDARD.encode(bytes),
    })
}

pub fn content_type_for(path: &Path, kind: AttachmentKind) -> Result<String> {
    let extension = lowercase_extension(path);
    let content_type = match (kind, extension.as_deref()) {
        (AttachmentKind::Image, Some("jpg" | "jpeg")) => "image/jpeg",
        (AttachmentKind::Image, Some("png")) => "image/png",
        (AttachmentKind::Image, Some("gif")) => "image/gif",
        (AttachmentKind::ContactCard, Some("vcf")) => "text/x-vCard",
        _ => {
            return Err(IntegrityError::UnsupportedAttachment {
                kind: kind.as_str(),
                path: path.to_path_buf(),
            }
            .into());
        }
    };
    Ok(content_type.to_string())
}

fn message_timestamp(document: &ConversationDocument, message: &RawMessage) -> Result<i64> {
    let raw = message
        .timestamp
        .as_deref()
        .ok_or_else(|| anyhow!("message without timestamp in `{}`", document.file_name()))?;
    parse_timestamp_ms(raw)
        .with_context(|| format!("invalid message timestamp in `{}`", document.file_name()))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{ConversionContext, content_type_for, resolve_sender};
    use crate::attachments::{ArchiveFiles, AttachmentIndex, AttachmentKind};
    use crate::document::{RawMessage, Sender};
    use crate::phone::PhoneNumber;

    fn blank_sender_message() -> RawMessage {
        RawMessage {
            sender: Some(Sender {
                number: String::new(),
                name: None,
            }),
            body: "hello".to_string(),
            timestamp: Some("2021-06-01T10:15:30.250-04:00".to_string()),
            images: Vec::new(),
            contact_cards: Vec::new(),
            self_authored: false,
        }
    }

    fn number(value: &str) -> PhoneNumber {
        PhoneNumber::Canonical(value.to_string())
    }

    #[test]
    fn blank_sender_goes_to_sole_participant() {
        let sender = resolve_sender(&blank_sender_message(), &[number("+15551230001")])
            .expect("sole participant should be attributed");
        assert_eq!(sender.as_str(), "+15551230001");
    }

    #[test]
    fn blank_sender_with_several_participants_is_an_error() {
        let err = resolve_sender(
            &blank_sender_message(),
            &[number("+15551230001"), number("+15551230002")],
        )
        .expect_err("ambiguous sender must fail");
        assert!(err.to_string().contains("unable to determine sender"));
    }

    #[test]
    fn maps_content_types() {
        assert_eq!(
            content_type_for(Path::new("a.JPG"), AttachmentKind::Image).expect("jpg"),
            "image/jpeg"
        );
        assert_eq!(
            content_type_for(Path::new("a.vcf"), AttachmentKind::ContactCard).expect("vcf"),
            "text/x-vCard"
        );
        assert!(content_type_for(Path::new("a.vcf"), AttachmentKind::Image).is_err());
    }

    #[test]
    fn owner_is_learned_from_documents() {
        let mut context = ConversionContext::new(
            AttachmentIndex::default(),
            ArchiveFiles::from_paths(Vec::<PathBuf>::new()),
        );
        assert!(context.owner.is_none());

        let document = crate::document::parse_document(
            Path::new("/a/Bob - Text.html"),
            r#"<cite class="sender vcard"><a class="tel" href="tel:+16502530000"><abbr class="fn" title="">Me</abbr></a></cite>"#,
        );
        context.learn_owner(&document);
        assert_eq!(
            context.owner.as_ref().map(PhoneNumber::as_str),
            Some("+16502530000")
        );
    }
}
