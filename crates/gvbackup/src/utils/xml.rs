/// Escapes a text value for use inside a double-quoted XML attribute.
///
/// Line breaks become the `&#10;` character reference so multi-line bodies
/// survive attribute normalization on import.
#[must_use]
pub fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => {}
            _ => escaped.push(ch),
        }
    }
    escaped
}
