//! Input validation utilities
//!
//! Every check here runs before a handler touches the database, Redis or
//! the mailer.

use regex::Regex;
use std::sync::OnceLock;

/// Trim and lower-case an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.chars().count() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_ascii_uppercase() {
            has_upper = true;
        } else if c.is_ascii_lowercase() {
            has_lower = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else if !c.is_alphanumeric() {
            has_special = true;
        }
    }

    if !has_upper {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    if !has_lower {
        return Err("Password must contain at least one lowercase letter".to_string());
    }

    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }

    if !has_special {
        return Err("Password must contain at least one special character".to_string());
    }

    Ok(())
}

/// Validate an optional free-text label (display name, device label)
pub fn validate_label(field: &str, value: Option<&str>) -> Result<(), String> {
    match value {
        Some(value) if value.trim().is_empty() => Err(format!("{field} must not be blank")),
        Some(value) if value.chars().count() > 64 => {
            Err(format!("{field} must be at most 64 characters long"))
        }
        _ => Ok(()),
    }
}

/// Validate a one-time code: exactly six ASCII digits
pub fn validate_otp_code(code: &str) -> Result<(), String> {
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err("Code must be 6 digits".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jane@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("jane@").is_err());
        assert!(validate_email("jane example.com").is_err());
        assert!(validate_email(&format!("{}@example.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn test_password_complexity_rules() {
        assert!(validate_password("Str0ng!pass").is_ok());

        assert_eq!(
            validate_password("Sh0rt!").unwrap_err(),
            "Password must be at least 8 characters long"
        );
        assert!(validate_password("alllower1!").unwrap_err().contains("uppercase"));
        assert!(validate_password("ALLUPPER1!").unwrap_err().contains("lowercase"));
        assert!(validate_password("NoDigits!!").unwrap_err().contains("digit"));
        assert!(validate_password("NoSpecial12").unwrap_err().contains("special"));
        assert!(validate_password(&format!("Aa1!{}", "x".repeat(130))).is_err());
    }

    #[test]
    fn test_validate_label() {
        assert!(validate_label("Label", None).is_ok());
        assert!(validate_label("Label", Some("Work laptop")).is_ok());
        assert!(validate_label("Label", Some("   ")).is_err());
        assert!(validate_label("Label", Some(&"x".repeat(65))).is_err());
    }

    #[test]
    fn test_validate_otp_code() {
        assert!(validate_otp_code("012345").is_ok());
        assert!(validate_otp_code("12345").is_err());
        assert!(validate_otp_code("12a456").is_err());
    }
}
