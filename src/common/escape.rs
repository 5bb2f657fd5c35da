//! HTML escaping for dynamic values embedded in responses.
//!
//! Escape exactly once, at the point of embedding. Escaping an
//! already-escaped string escapes it again.

/// Escape text for HTML text content or a quoted attribute value.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

#[test]
fn escape_script_tag() {
    assert_eq!(escape_html("<script>"), "&lt;script&gt;");
    assert_eq!(
        escape_html(r#"Tom & "Jerry's" <b>"#),
        "Tom &amp; &quot;Jerry&#x27;s&quot; &lt;b&gt;"
    );
    assert_eq!(escape_html("plain text, ünïcode"), "plain text, ünïcode");
}

#[test]
fn escape_twice_double_escapes() {
    let once = escape_html("a<b");
    assert_eq!(once, "a&lt;b");
    assert_eq!(escape_html(&once), "a&amp;lt;b");
}
