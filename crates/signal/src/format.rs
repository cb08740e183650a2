use courier_common::Notification;

/// Plain-text group message: the title (if any), a blank line, the body.
pub fn render_notification(notification: &Notification) -> String {
    match notification.title() {
        Some(title) => format!("{title}\n\n{}", notification.message),
        None => notification.message.clone(),
    }
}

/// Human-readable phone number for logs and status output.
///
/// North American numbers become `+1 (555) 123-4567`; other E.164 numbers
/// are grouped after the country code. Anything else is returned unchanged.
pub fn format_phone_number(number: &str) -> String {
    if number.len() == 12
        && let Some(rest) = number.strip_prefix("+1")
        && rest.bytes().all(|b| b.is_ascii_digit())
    {
        return format!("+1 ({}) {}-{}", &rest[..3], &rest[3..6], &rest[6..]);
    }

    let Some(digits) = number.strip_prefix('+') else {
        return number.to_string();
    };
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return number.to_string();
    }

    let (country, mut rest) = digits.split_at(digits.len().min(3).min(digits.len() - 3));
    let mut groups = Vec::new();
    while !rest.is_empty() {
        let size = match rest.len() {
            4 | 8 => 4,
            n => n.min(3),
        };
        let (head, tail) = rest.split_at(size);
        groups.push(head);
        rest = tail;
    }
    format!("+{country} {}", groups.join(" "))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_precedes_body() {
        let n = Notification::new("disk full").with_title("nas");
        assert_eq!(render_notification(&n), "nas\n\ndisk full");
        assert_eq!(render_notification(&Notification::new("ok")), "ok");
    }

    #[test]
    fn phone_numbers() {
        assert_eq!(format_phone_number("+15551234567"), "+1 (555) 123-4567");
        assert_eq!(format_phone_number("+447911123456"), "+447 911 123 456");
        assert_eq!(format_phone_number("12345"), "12345");
        assert_eq!(format_phone_number(""), "");
    }
}
