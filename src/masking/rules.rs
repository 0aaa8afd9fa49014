//! Built-in sensitive-data rules.
//!
//! | Rule | Input | Output |
//! |------|-------|--------|
//! | `credential` | `password=hunter2` | `password=[REDACTED]` |
//! | `email` | `john.doe@example.com` | `j***@example.com` |
//! | `phone` | `+84225898023` | `+84*********23` |
//! | `card` | `4111 1111 1111 1234` | `[CARD ****1234]` |
//!
//! Phone numbers keep the `+` and the two digit country code, then a fixed run
//! of nine `*` and the last two digits, so the masked form does not reveal the
//! number's length. The whole digit run is taken, whatever follows it. Digit
//! classes are ASCII only.
//!
//! Registration order matters where rules can start at the same offset: an
//! e-mail local part may itself look like a phone number, so `email` comes
//! before `phone`.
//!
//! The registry settles: a card number inside a kept e-mail domain, or a
//! credential swallowed by one, is masked by a following pass.

use super::{PatternRegistry, Replacement, SensitivePattern};
use crate::error::LogResult;

pub const CREDENTIAL: &str =
    r"(?i)\b(?P<key>password|passwd|pwd|secret|token|api[_-]?key)(?P<sep>\s*[=:]\s*)[^\s,;&]+";
pub const EMAIL: &str =
    r"(?P<first>[A-Za-z0-9._%+-])[A-Za-z0-9._%+-]*@(?P<domain>[A-Za-z0-9.-]+\.[A-Za-z]{2,})";
pub const PHONE: &str = r"\+(?P<country>[0-9]{2})[0-9]{5,}(?P<tail>[0-9]{2})";
pub const CARD: &str =
    r"\b[0-9]{4}[ -]?[0-9]{4}[ -]?[0-9]{4}[ -]?(?P<last>[0-9]{4})\b";

pub fn credential() -> LogResult<SensitivePattern> {
    SensitivePattern::new(
        "credential",
        CREDENTIAL,
        Replacement::template("${key}${sep}[REDACTED]"),
    )
}

pub fn email() -> LogResult<SensitivePattern> {
    SensitivePattern::new("email", EMAIL, Replacement::template("${first}***@${domain}"))
}

pub fn phone() -> LogResult<SensitivePattern> {
    SensitivePattern::new(
        "phone",
        PHONE,
        Replacement::template("+${country}*********${tail}"),
    )
}

pub fn card() -> LogResult<SensitivePattern> {
    SensitivePattern::new("card", CARD, Replacement::template("[CARD ****${last}]"))
}

/// The built-in rule set in its registration order.
pub fn default_registry() -> LogResult<PatternRegistry> {
    PatternRegistry::builder()
        .push(credential()?)
        .push(email()?)
        .push(phone()?)
        .push(card()?)
        .settle()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mask(input: &str) -> String {
        default_registry().unwrap().mask(input).into_owned()
    }

    #[test]
    fn masks_international_phone_numbers() {
        assert_eq!(mask("+84225898023"), "+84*********23");
        assert_eq!(mask("call +84225898023 now"), "call +84*********23 now");
        assert_eq!(mask("+4915112345678"), "+49*********78");
    }

    #[test]
    fn masks_phone_numbers_followed_by_words() {
        assert_eq!(mask("+84225898023đã gọi"), "+84*********23đã gọi");
        assert_eq!(mask("+84225898023_ok"), "+84*********23_ok");
    }

    #[test]
    fn leaves_short_numbers_alone() {
        assert_eq!(mask("order +12345 shipped"), "order +12345 shipped");
    }

    #[test]
    fn masks_emails() {
        assert_eq!(mask("User john.doe@example.com logged in"), "User j***@example.com logged in");
    }

    #[test]
    fn masks_cards() {
        assert_eq!(mask("paid with 4111-1111-1111-1234"), "paid with [CARD ****1234]");
        assert_eq!(mask("4111 1111 1111 1234"), "[CARD ****1234]");
        assert_eq!(mask("4111111111111234"), "[CARD ****1234]");
    }

    #[test]
    fn masks_credentials() {
        assert_eq!(mask("login password=hunter2 ok"), "login password=[REDACTED] ok");
        assert_eq!(mask("API_KEY: abc123"), "API_KEY: [REDACTED]");
    }

    #[test]
    fn email_wins_over_phone_at_same_offset() {
        assert_eq!(mask("+84225898023@example.com"), "+***@example.com");
    }

    #[test]
    fn masks_mixed_messages() {
        assert_eq!(
            mask("Gọi +84225898023 hoặc mail an@example.vn"),
            "Gọi +84*********23 hoặc mail a***@example.vn"
        );
    }

    #[test]
    fn masks_sensitive_data_inside_email_domains() {
        let once = mask("a@4111-1111-1111-1234.com");
        assert_eq!(once, "a***@[CARD ****1234].com");
        assert_eq!(mask(&once), once);
    }

    #[test]
    fn masks_credentials_swallowed_by_email_domains() {
        let once = mask("a@b.com.password=abcd");
        assert_eq!(once, "a***@b.com.password=[REDACTED]");
        assert_eq!(mask(&once), once);
    }

    #[test]
    fn chained_addresses_are_stable() {
        let once = mask("a@b.com@c.org@d.net");
        assert_eq!(mask(&once), once);
        assert!(!once.contains("a@") && !once.contains("c.org@"));
    }

    #[test]
    fn masked_output_is_stable() {
        let once = mask("+84225898023 4111 1111 1111 1234 token=abc a@b.io");
        assert_eq!(mask(&once), once);
    }

    fn token() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,8}",
            "\\+84[0-9]{9}",
            "[a-z]{1,6}@[a-z]{1,6}\\.(com|vn|org)",
            "[0-9]{4}( [0-9]{4}){3}",
            "(password|token)=[a-z0-9]{4,10}",
        ]
    }

    fn separator() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["", " ", "@", ".", "-", ":"])
    }

    /// Tokens joined by separators that let neighbours touch or overlap.
    fn message() -> impl Strategy<Value = String> {
        prop::collection::vec((token(), separator()), 0..12).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(token, separator)| format!("{token}{separator}"))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn masking_is_idempotent(input in message()) {
            let registry = default_registry().unwrap();
            let once = registry.mask(&input).into_owned();
            let twice = registry.mask(&once).into_owned();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn masking_is_idempotent_on_arbitrary_text(input in "[a-z0-9+@.: =-]{0,48}") {
            let registry = default_registry().unwrap();
            let once = registry.mask(&input).into_owned();
            let twice = registry.mask(&once).into_owned();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn clean_input_is_unchanged(input in "[a-zA-Z ,.!?]{0,64}") {
            let registry = default_registry().unwrap();
            prop_assert_eq!(registry.mask(&input), input.as_str());
        }
    }
}
