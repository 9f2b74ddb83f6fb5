//! Client-side input checks, run before any request is sent

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{ChatError, ChatResult};

pub const MIN_PASSWORD_LEN: usize = 8;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// Check password strength, returning the first unmet rule
pub fn check_password_strength(password: &str) -> ChatResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ChatError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let rules: [(fn(char) -> bool, &str); 4] = [
        (|c: char| c.is_lowercase(), "a lowercase letter"),
        (|c: char| c.is_uppercase(), "an uppercase letter"),
        (|c: char| c.is_ascii_digit(), "a digit"),
        (|c: char| !c.is_alphanumeric(), "a symbol"),
    ];
    for (rule, what) in rules {
        if !password.chars().any(rule) {
            return Err(ChatError::validation(format!("password must contain {}", what)));
        }
    }
    Ok(())
}

/// Non-empty user id and password
pub fn validate_login(user_id: &str, password: &str) -> ChatResult<()> {
    if user_id.is_empty() {
        return Err(ChatError::validation("user id is required"));
    }
    if password.is_empty() {
        return Err(ChatError::validation("password is required"));
    }
    Ok(())
}

pub fn validate_registration(nickname: &str, email: &str, password: &str) -> ChatResult<()> {
    if nickname.trim().is_empty() {
        return Err(ChatError::validation("nickname is required"));
    }
    if !is_valid_email(email) {
        return Err(ChatError::validation(format!("invalid email address: {}", email)));
    }
    check_password_strength(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("ann@example.com"));
        assert!(is_valid_email("a.b+c@mail.co.uk"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_password_rules() {
        assert!(check_password_strength("Str0ng!pw").is_ok());

        let cases = [
            ("Sh0rt!", "at least 8"),
            ("NOLOWER1!", "lowercase"),
            ("noupper1!", "uppercase"),
            ("NoDigits!", "digit"),
            ("NoSymbol1", "symbol"),
        ];
        for (password, expected) in cases {
            let err = check_password_strength(password).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{} -> {}",
                password,
                err
            );
        }
    }

    #[test]
    fn test_login_requires_both_fields() {
        assert!(validate_login("alice", "x").is_ok());
        assert!(matches!(
            validate_login("", "x"),
            Err(ChatError::Validation { .. })
        ));
        assert!(matches!(
            validate_login("alice", ""),
            Err(ChatError::Validation { .. })
        ));
    }

    #[test]
    fn test_registration() {
        assert!(validate_registration("ann", "ann@example.com", "Str0ng!pw").is_ok());
        assert!(validate_registration("  ", "ann@example.com", "Str0ng!pw").is_err());
        assert!(validate_registration("ann", "not-an-email", "Str0ng!pw").is_err());
        assert!(validate_registration("ann", "ann@example.com", "weak").is_err());
    }
}
