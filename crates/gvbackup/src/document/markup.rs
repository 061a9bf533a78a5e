//! Thin query layer over an html5ever `RcDom`.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

pub struct Markup {
    dom: RcDom,
}

impl Markup {
    #[must_use]
    pub fn parse(html: &str) -> Self {
        Self {
            dom: parse_document(RcDom::default(), Default::default()).one(html),
        }
    }

    #[must_use]
    pub fn root(&self) -> Node {
        Node(self.dom.document.clone())
    }
}

#[derive(Clone)]
pub struct Node(Handle);

impl Node {
    /// Lowercase local tag name, `None` for non-element nodes.
    #[must_use]
    pub fn tag(&self) -> Option<String> {
        match &self.0.data {
            NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag().is_some_and(|name| name == tag)
    }

    #[must_use]
    pub fn attr(&self, attr_name: &str) -> Option<String> {
        match &self.0.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|attr| (*attr.name.local).eq_ignore_ascii_case(attr_name))
                .map(|attr| attr.value.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|value| value.split_whitespace().any(|item| item == class))
    }

    /// Direct element children.
    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.0
            .children
            .borrow()
            .iter()
            .filter(|child| matches!(child.data, NodeData::Element { .. }))
            .cloned()
            .map(Node)
            .collect()
    }

    /// Element descendants in document order, excluding `self`.
    #[must_use]
    pub fn descendants(&self) -> Vec<Node> {
        let mut out = Vec::new();
        collect_elements(&self.0, &mut out);
        out
    }

    #[must_use]
    pub fn find_all(&self, predicate: impl Fn(&Node) -> bool) -> Vec<Node> {
        self.descendants()
            .into_iter()
            .filter(|node| predicate(node))
            .collect()
    }

    #[must_use]
    pub fn find_first(&self, predicate: impl Fn(&Node) -> bool) -> Option<Node> {
        self.descendants().into_iter().find(|node| predicate(node))
    }

    #[must_use]
    pub fn find_tag(&self, tag: &str) -> Option<Node> {
        self.find_first(|node| node.is_tag(tag))
    }

    /// Concatenated text content.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.0, false, &mut out);
        out
    }

    /// Text content with every `<br>` rendered as `\n`.
    #[must_use]
    pub fn text_with_breaks(&self) -> String {
        let mut out = String::new();
        collect_text(&self.0, true, &mut out);
        out
    }
}

fn collect_elements(handle: &Handle, out: &mut Vec<Node>) {
    for child in handle.children.borrow().iter() {
        if matches!(child.data, NodeData::Element { .. }) {
            out.push(Node(child.clone()));
        }
        collect_elements(child, out);
    }
}

fn collect_text(handle: &Handle, breaks: bool, out: &mut String) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { name, .. } => {
                if breaks && (*name.local).eq_ignore_ascii_case("br") {
                    out.push('\n');
                } else {
                    collect_text(child, breaks, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Markup;

    #[test]
    fn queries_by_tag_and_class() {
        let markup = Markup::parse(
            r#"<div class="message first"><q>hi</q></div><div class="message"></div><p class="messages"></p>"#,
        );
        let messages = markup.root().find_all(|node| node.has_class("message"));
        assert_eq!(messages.len(), 2);
        assert!(messages[0].find_tag("q").is_some());
        assert!(messages[1].find_tag("q").is_none());
    }

    #[test]
    fn renders_breaks_and_decodes_entities() {
        let markup = Markup::parse("<q>one &amp; two<br>three <b>bold</b></q>");
        let q = markup.root().find_tag("q").expect("q should exist");
        assert_eq!(q.text_with_breaks(), "one & two\nthree bold");
        assert_eq!(q.text(), "one & twothree bold");
    }

    #[test]
    fn reads_attributes() {
        let markup = Markup::parse(r#"<a class="tel" href="tel:+15551234567">x</a>"#);
        let link = markup.root().find_tag("a").expect("link should exist");
        assert_eq!(link.attr("href").as_deref(), Some("tel:+15551234567"));
        assert!(link.attr("title").is_none());
    }

    #[test]
    fn attribute_and_break_names_ignore_case() {
        let markup = Markup::parse(r#"<A HREF="Photo-1-1">x</A><Q>top<BR/>bottom</Q>"#);
        let link = markup.root().find_tag("a").expect("link should exist");
        assert_eq!(link.attr("HREF").as_deref(), Some("Photo-1-1"));
        assert_eq!(link.attr("Href").as_deref(), Some("Photo-1-1"));

        let q = markup.root().find_tag("q").expect("q should exist");
        assert_eq!(q.text_with_breaks(), "top\nbottom");
    }
}
