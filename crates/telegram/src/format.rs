//! Notification to Telegram HTML.

use courier_common::Notification;

/// Telegram message size limit.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Render a notification as a Telegram HTML message:
/// the app name in bold, a blank line, the optional title in bold, then the
/// message body. All user text is escaped, and text past the size limit is
/// dropped whole characters at a time so no entity is ever split.
#[must_use]
pub fn render_notification(app_name: &str, notification: &Notification) -> String {
    const TITLE_CLOSE: &str = "</b>\n";

    let mut out = format!("<b>{}</b>\n\n", escape_html(app_name));
    if let Some(title) = notification.title() {
        out.push_str("<b>");
        push_escaped(
            &mut out,
            title,
            TELEGRAM_MAX_MESSAGE_LEN.saturating_sub(TITLE_CLOSE.len()),
        );
        out.push_str(TITLE_CLOSE);
    }
    push_escaped(&mut out, &notification.message, TELEGRAM_MAX_MESSAGE_LEN);
    out
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text, usize::MAX);
    out
}

/// Append `text` escaped, stopping before `out` would exceed `limit` bytes.
fn push_escaped(out: &mut String, text: &str, limit: usize) {
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let piece = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            _ => c.encode_utf8(&mut buf),
        };
        if out.len() + piece.len() > limit {
            break;
        }
        out.push_str(piece);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_app_title_and_message() {
        let n = Notification::new("disk at 91%").with_title("Storage");
        assert_eq!(
            render_notification("nas", &n),
            "<b>nas</b>\n\n<b>Storage</b>\ndisk at 91%"
        );
    }

    #[test]
    fn omits_missing_title() {
        let n = Notification::new("done");
        assert_eq!(render_notification("backup", &n), "<b>backup</b>\n\ndone");
    }

    #[test]
    fn escapes_markup() {
        let n = Notification::new("a < b && c > d").with_title("<script>");
        let html = render_notification("x&y", &n);
        assert!(html.starts_with("<b>x&amp;y</b>"));
        assert!(html.contains("<b>&lt;script&gt;</b>"));
        assert!(html.ends_with("a &lt; b &amp;&amp; c &gt; d"));
    }

    #[test]
    fn truncation_never_splits_an_entity() {
        // "<b>app</b>\n\n" is 12 bytes, so the first "&amp;" would end at 4099.
        let message = format!("{}&&&&", "a".repeat(4082));
        let html = render_notification("app", &Notification::new(message));
        assert_eq!(html, format!("<b>app</b>\n\n{}", "a".repeat(4082)));

        let message = format!("{}&&&&", "a".repeat(4079));
        let html = render_notification("app", &Notification::new(message));
        assert_eq!(html.len(), TELEGRAM_MAX_MESSAGE_LEN);
        assert!(html.ends_with("a&amp;"));
    }

    #[test]
    fn long_title_keeps_its_closing_tag() {
        let n = Notification::new("body").with_title("<".repeat(TELEGRAM_MAX_MESSAGE_LEN));
        let html = render_notification("app", &n);
        assert!(html.len() <= TELEGRAM_MAX_MESSAGE_LEN);
        assert!(html.ends_with("&lt;</b>\n"));
    }

    #[test]
    fn truncates_on_char_boundary() {
        let n = Notification::new("é".repeat(TELEGRAM_MAX_MESSAGE_LEN));
        let html = render_notification("app", &n);
        assert!(html.len() <= TELEGRAM_MAX_MESSAGE_LEN);
        assert!(html.ends_with('é'));
    }
}
