use std::borrow::Cow;

const RESERVED: [char; 5] = ['&', '<', '>', '"', '\''];

/// Replace the five HTML-significant characters with entities.
///
/// Single left-to-right pass, so an `&` produced by one replacement is never
/// escaped again. Text without reserved characters (including `""`) comes
/// back borrowed and unchanged.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(RESERVED) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Absent input stays absent.
pub fn escape_html_opt(text: Option<&str>) -> Option<Cow<'_, str>> {
    text.map(escape_html)
}
