// src/utils/validation.rs

use std::sync::LazyLock;

use regex::Regex;

/// User, subject and course ids: alphanumeric start, then `[A-Za-z0-9_.:-]`, at most 128 chars.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]{0,127}$").expect("identifier pattern compiles")
});

pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER.is_match(value)
}

pub fn validate_identifier(value: &str) -> Result<(), validator::ValidationError> {
    if !is_identifier(value) {
        return Err(validator::ValidationError::new("invalid_identifier"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_typical_ids() {
        assert!(is_identifier("e944cde4-af3a-4133-833c-fdbc3846af81"));
        assert!(is_identifier("react-basics.lesson_1"));
        assert!(is_identifier("sql:joins:2"));
    }

    #[test]
    fn test_rejects_bad_ids() {
        assert!(!is_identifier(""));
        assert!(!is_identifier("-leading-dash"));
        assert!(!is_identifier("with space"));
        assert!(!is_identifier(&"a".repeat(129)));
    }
}
