// Text preparation for the ADB keyboard broadcast.
use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Percent-decodes `text` when it contains a `%`.
///
/// Heuristic: any `%` triggers decoding, so literal text such as "20%AB" is
/// corrupted. Sequences that are not `%XX` hex pass through unchanged and
/// invalid UTF-8 after decoding becomes U+FFFD.
pub fn decode_if_percent_encoded(text: &str) -> Cow<'_, str> {
    if !text.contains('%') {
        return Cow::Borrowed(text);
    }
    let decoded = percent_decode_str(text).decode_utf8_lossy();
    if decoded != text {
        tracing::debug!(original = %text, decoded = %decoded, "text input percent-decoded");
    }
    decoded
}

/// Single-quotes `text` for the device shell, which re-splits adb arguments.
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_untouched() {
        assert!(matches!(decode_if_percent_encoded("hello"), Cow::Borrowed("hello")));
    }

    #[test]
    fn percent_encoded_text_is_decoded() {
        assert_eq!(decode_if_percent_encoded("hello%20world"), "hello world");
        assert_eq!(
            decode_if_percent_encoded("%E6%9D%8E%E5%AD%90%E6%9F%92"),
            "李子柒"
        );
    }

    #[test]
    fn literal_percent_without_hex_survives() {
        assert_eq!(decode_if_percent_encoded("100%"), "100%");
        assert_eq!(decode_if_percent_encoded("50%off"), "50%off");
    }

    #[test]
    fn quotes_for_device_shell() {
        assert_eq!(shell_quote("hello world"), "'hello world'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
