//! Regional mobile number validation.
//!
//! Accepts 10-digit mobile numbers starting with 6, 7, 8 or 9. Spaces and
//! hyphens are ignored.

/// Strip the separators users commonly type.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

pub fn validate(raw: &str) -> bool {
    let digits = normalize(raw);
    digits.len() == 10
        && digits.chars().all(|c| c.is_ascii_digit())
        && matches!(digits.as_bytes()[0], b'6'..=b'9')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_plain_number() {
        assert!(validate("8638144632"));
    }

    #[test]
    fn rejects_bad_prefix() {
        assert!(!validate("1234567890"));
    }

    #[test]
    fn strips_separators() {
        assert!(validate("863-814-4632"));
        assert!(validate(" 863 814 4632 "));
    }

    #[test]
    fn rejects_empty() {
        assert!(!validate(""));
    }

    #[test]
    fn rejects_wrong_length_and_non_digits() {
        assert!(!validate("863814463"));
        assert!(!validate("86381446321"));
        assert!(!validate("+918638144632"));
        assert!(!validate("86381446a2"));
        // Non-ASCII digits are not accepted either.
        assert!(!validate("٨٦٣٨١٤٤٦٣٢"));
    }

    proptest! {
        #[test]
        fn any_mobile_prefix_with_nine_digits_is_valid(first in 6u8..=9, rest in "[0-9]{9}") {
            let number = format!("{first}{rest}");
            prop_assert!(validate(&number));
        }

        #[test]
        fn non_mobile_prefix_is_invalid(first in 0u8..=5, rest in "[0-9]{9}") {
            let number = format!("{first}{rest}");
            prop_assert!(!validate(&number));
        }
    }
}
