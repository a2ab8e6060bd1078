//! Identifier sanitization.

/// Strips everything but ASCII alphanumerics. Used both to build the Signal
/// conversation id from a sender and, since phone-number senders contain no
/// letters, doubles as `sanitizePhone` in the testable-properties table.
pub fn sanitize(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub fn sanitize_phone(input: &str) -> String {
    sanitize(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_phone_strips_punctuation_and_spaces() {
        assert_eq!(sanitize_phone("+1 (555) 123-4567"), "15551234567");
    }

    #[test]
    fn sanitize_retains_letters_and_digits() {
        assert_eq!(sanitize("abc-123_XYZ"), "abc123XYZ");
    }
}
