//! Typed view of one exported conversation page.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod markup;

use markup::{Markup, Node};

pub const GROUP_CONVERSATION_PREFIX: &str = "Group Conversation";
pub const ARCHIVE_BROWSER_FILE: &str = "archive_browser.html";
pub const OWNER_DISPLAY_NAME: &str = "Me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    Single,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Text after `tel:`; empty when the export left the field blank.
    pub number: String,
    pub name: Option<String>,
}

impl Sender {
    #[must_use]
    pub fn is_owner_label(&self) -> bool {
        self.name.as_deref() == Some(OWNER_DISPLAY_NAME)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub sender: Option<Sender>,
    pub body: String,
    pub timestamp: Option<String>,
    pub images: Vec<String>,
    pub contact_cards: Vec<String>,
    pub self_authored: bool,
}

impl RawMessage {
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.images.is_empty() || !self.contact_cards.is_empty()
    }

    /// References in the order the index builder enumerates them.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.images
            .iter()
            .chain(self.contact_cards.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationDocument {
    pub path: PathBuf,
    pub kind: ConversationKind,
    pub messages: Vec<RawMessage>,
    /// Raw `tel:` numbers from the participants block, in page order.
    pub participants: Vec<String>,
    /// Raw `tel:` numbers of `contributor vcard` entries (call log pages).
    pub contributors: Vec<String>,
    pub owner_hint: Option<String>,
    /// Every image and contact-card reference on the page, messages or not.
    pub references: Vec<String>,
}

impl ConversationDocument {
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

pub fn read_document(path: &Path) -> Result<ConversationDocument> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read conversation document: {}", path.display()))?;
    let html = String::from_utf8_lossy(&bytes);
    Ok(parse_document(path, &html))
}

#[must_use]
pub fn parse_document(path: &Path, html: &str) -> ConversationDocument {
    let markup = Markup::parse(html);
    let root = markup.root();

    let kind = if path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(GROUP_CONVERSATION_PREFIX))
    {
        ConversationKind::Group
    } else {
        ConversationKind::Single
    };

    let messages = root
        .find_all(|node| node.has_class("message"))
        .iter()
        .map(parse_message)
        .collect();

    ConversationDocument {
        path: path.to_path_buf(),
        kind,
        messages,
        participants: parse_participants(&root),
        contributors: parse_contributors(&root),
        owner_hint: find_owner_hint(&root),
        references: collect_references(&root),
    }
}

fn parse_message(node: &Node) -> RawMessage {
    let cite = node.find_tag("cite");
    let sender = cite.as_ref().map(parse_sender);
    let self_authored = cite
        .as_ref()
        .is_some_and(|cite| cite.find_tag("span").is_none());

    let body = node
        .find_tag("q")
        .map(|q| q.text_with_breaks())
        .unwrap_or_default();
    let timestamp = node
        .find_first(|child| child.has_class("dt"))
        .and_then(|dt| dt.attr("title"));

    RawMessage {
        sender,
        body,
        timestamp,
        images: image_sources(node),
        contact_cards: contact_card_targets(node),
        self_authored,
    }
}

fn parse_sender(cite: &Node) -> Sender {
    let number = cite
        .find_tag("a")
        .and_then(|link| link.attr("href"))
        .map(|href| tel_number(&href).to_string())
        .unwrap_or_default();
    let name = cite
        .find_first(|node| node.has_class("fn"))
        .map(|node| node.text().trim().to_string())
        .or_else(|| {
            let text = cite.text().trim().to_string();
            (!text.is_empty()).then_some(text)
        });

    Sender { number, name }
}

fn parse_participants(root: &Node) -> Vec<String> {
    let mut participants = Vec::new();
    for block in root.find_all(|node| node.has_class("participants")) {
        for participant in block.children() {
            let link = if participant.is_tag("a") {
                Some(participant.clone())
            } else {
                participant.find_tag("a")
            };
            if let Some(href) = link.and_then(|link| link.attr("href")) {
                participants.push(tel_number(&href).to_string());
            }
        }
    }
    participants
}

fn parse_contributors(root: &Node) -> Vec<String> {
    root.find_all(|node| node.has_class("contributor") && node.has_class("vcard"))
        .iter()
        .filter_map(|node| node.find_tag("a"))
        .filter_map(|link| link.attr("href"))
        .map(|href| tel_number(&href).to_string())
        .collect()
}

/// Number of the `a.tel` link closest before an `abbr.fn` reading `Me`.
fn find_owner_hint(root: &Node) -> Option<String> {
    let mut last_tel = None;
    for node in root.descendants() {
        if node.is_tag("a") && node.has_class("tel") {
            last_tel = node.attr("href");
        } else if node.is_tag("abbr")
            && node.has_class("fn")
            && node.text().trim() == OWNER_DISPLAY_NAME
        {
            if let Some(href) = &last_tel {
                let number = tel_number(href);
                if !number.is_empty() {
                    return Some(number.to_string());
                }
            }
        }
    }
    None
}

fn collect_references(root: &Node) -> Vec<String> {
    let mut references = image_sources(root);
    references.extend(contact_card_targets(root));
    references
}

fn image_sources(node: &Node) -> Vec<String> {
    node.find_all(|child| child.is_tag("img"))
        .iter()
        .filter_map(|img| img.attr("src"))
        .collect()
}

fn contact_card_targets(node: &Node) -> Vec<String> {
    node.find_all(|child| child.is_tag("a") && child.has_class("vcard"))
        .iter()
        .filter_map(|link| link.attr("href"))
        .collect()
}

/// Strips the `tel:` scheme from a link target.
#[must_use]
pub fn tel_number(href: &str) -> &str {
    href.strip_prefix("tel:").unwrap_or(href).trim()
}

#[must_use]
pub fn is_conversation_file(path: &Path) -> bool {
    let is_html = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .is_some_and(|extension| extension == "html");
    let is_browser = path
        .file_name()
        .is_some_and(|name| name == ARCHIVE_BROWSER_FILE);
    is_html && !is_browser
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{ConversationKind, is_conversation_file, parse_document, tel_number};

    const SINGLE_PAGE: &str = r#"<html><body>
<div class="hChatLog hfeed">
  <div class="message"><abbr class="dt" title="2021-06-01T10:15:30.250-04:00">Jun 1</abbr>:
    <cite class="sender vcard"><a class="tel" href="tel:+15551234567"><span class="fn">Alice</span></a></cite>:
    <q>Hello &amp; welcome<br>second line</q>
  </div>
  <div class="message"><abbr class="dt" title="2021-06-01T10:16:00.000-04:00">Jun 1</abbr>:
    <cite class="sender vcard"><a class="tel" href="tel:+15550001111"><abbr class="fn" title="">Me</abbr></a></cite>:
    <q>MMS Sent</q>
    <div><img src="Alice - Text - 2021-06-01T10_16_00Z-1-1" alt="Image MMS Attachment"></div>
    <div><a class="vcard" href="Alice - Text - 2021-06-01T10_16_00Z-2-1.vcf">Contact card</a></div>
  </div>
</div></body></html>"#;

    #[test]
    fn parses_messages_senders_and_attachments() {
        let document = parse_document(
            Path::new("/archive/Alice - Text - 2021-06-01T10_15_30Z.html"),
            SINGLE_PAGE,
        );

        assert_eq!(document.kind, ConversationKind::Single);
        assert_eq!(document.messages.len(), 2);

        let first = &document.messages[0];
        let sender = first.sender.as_ref().expect("first sender should parse");
        assert_eq!(sender.number, "+15551234567");
        assert_eq!(sender.name.as_deref(), Some("Alice"));
        assert!(!first.self_authored);
        assert_eq!(first.body, "Hello & welcome\nsecond line");
        assert_eq!(
            first.timestamp.as_deref(),
            Some("2021-06-01T10:15:30.250-04:00")
        );
        assert!(!first.has_attachments());

        let second = &document.messages[1];
        assert!(second.self_authored);
        assert!(second.sender.as_ref().is_some_and(|s| s.is_owner_label()));
        assert_eq!(second.images, vec!["Alice - Text - 2021-06-01T10_16_00Z-1-1"]);
        assert_eq!(
            second.contact_cards,
            vec!["Alice - Text - 2021-06-01T10_16_00Z-2-1.vcf"]
        );
        assert_eq!(document.owner_hint.as_deref(), Some("+15550001111"));
        assert_eq!(document.references.len(), 2);
    }

    #[test]
    fn detects_group_conversations_and_participants() {
        let html = r#"<div class="participants">Group conversation with:
<cite class="sender vcard"><a class="tel" href="tel:+15551230001"><span class="fn">Bob</span></a></cite>,
<cite class="sender vcard"><a class="tel" href="tel:+15551230002"><span class="fn">Carol</span></a></cite>
</div>"#;
        let document = parse_document(
            Path::new("/archive/Group Conversation - 2021-06-01T10_15_30Z.html"),
            html,
        );
        assert_eq!(document.kind, ConversationKind::Group);
        assert_eq!(document.participants, vec!["+15551230001", "+15551230002"]);
        assert!(document.messages.is_empty());
    }

    #[test]
    fn reads_contributor_numbers_from_call_logs() {
        let html = r#"<div class="haudio"><span class="fn">Placed call to</span>
<div class="contributor vcard"><a class="tel" href="tel:+15559876543"><span class="fn">Dan</span></a></div></div>"#;
        let document = parse_document(Path::new("/archive/Dan - Placed - 2021.html"), html);
        assert_eq!(document.contributors, vec!["+15559876543"]);
    }

    #[test]
    fn message_without_cite_has_no_sender() {
        let html = r#"<div class="message"><q>orphan</q></div>"#;
        let document = parse_document(Path::new("/archive/x.html"), html);
        let message = &document.messages[0];
        assert!(message.sender.is_none());
        assert!(!message.self_authored);
        assert!(message.timestamp.is_none());
    }

    #[test]
    fn keeps_message_body_whitespace() {
        let html = r#"<div class="message"><q>  indented
  text </q></div>"#;
        let document = parse_document(Path::new("/archive/x.html"), html);
        assert_eq!(document.messages[0].body, "  indented\n  text ");
    }

    #[test]
    fn strips_tel_scheme() {
        assert_eq!(tel_number("tel:+15551234567"), "+15551234567");
        assert_eq!(tel_number("tel:"), "");
        assert_eq!(tel_number("+1555"), "+1555");
    }

    #[test]
    fn filters_conversation_files() {
        assert!(is_conversation_file(Path::new("/a/Bob - Text - 1.html")));
        assert!(!is_conversation_file(Path::new("/a/archive_browser.html")));
        assert!(!is_conversation_file(Path::new("/a/photo.jpg")));
    }
}
