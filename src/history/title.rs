//! Conversation titles derived from the first user message.

pub const DEFAULT_TITLE: &str = "New Chat";

const MAX_TITLE_CHARS: usize = 50;

/// First line of the message, kept verbatim up to 50 characters; longer
/// input is cut at 50 characters with an ellipsis appended.
pub fn derive_title(first_message: &str) -> String {
    let first_line = first_message.lines().next().unwrap_or(first_message).trim();
    if first_line.chars().count() <= MAX_TITLE_CHARS {
        return first_line.to_string();
    }
    first_line.chars().take(MAX_TITLE_CHARS).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_message_truncates_at_fifty_chars() {
        let message = "Explain quantum tunneling in simple terms please, with an example \
                       that a teenager could follow along and enjoy";
        let title = derive_title(message);
        assert_eq!(title, format!("{}…", &message[..50]));
        assert_eq!(title.chars().count(), 51);
    }

    #[test]
    fn test_short_message_kept_verbatim() {
        assert_eq!(derive_title("exactly 10"), "exactly 10");
        assert_eq!(derive_title("hi"), "hi");
    }

    #[test]
    fn test_only_first_line_is_used() {
        assert_eq!(derive_title("subject\nbody body body"), "subject");
    }
}
