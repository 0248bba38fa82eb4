use regex::Regex;
use tracing::debug;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const SPECIAL_CHAR_PATTERN: &str = r#"[!@#$%^&*(),.?":{}|<>]"#;

/// Which password rules a candidate satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PasswordStrength {
    pub long_enough: bool,
    pub has_uppercase: bool,
    pub has_number: bool,
    pub has_special: bool,
}

impl PasswordStrength {
    pub fn is_strong(&self) -> bool {
        self.long_enough && self.has_uppercase && self.has_number && self.has_special
    }

    /// First rule that is not met, phrased for the user.
    pub fn first_unmet(&self) -> Option<&'static str> {
        if !self.long_enough {
            Some("must be at least 8 characters")
        } else if !self.has_uppercase {
            Some("must contain an uppercase letter")
        } else if !self.has_number {
            Some("must contain a number")
        } else if !self.has_special {
            Some("must contain a special character")
        } else {
            None
        }
    }
}

/// Field checks shared by the booking form and account forms.
pub struct InputValidator {
    email_regex: Regex,
    special_regex: Regex,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            email_regex: Regex::new(EMAIL_PATTERN).expect("email pattern is valid"),
            special_regex: Regex::new(SPECIAL_CHAR_PATTERN).expect("special character pattern is valid"),
        }
    }

    /// `local@domain.tld` shape, no whitespace.
    pub fn validate_email(&self, email: &str) -> bool {
        self.email_regex.is_match(email.trim())
    }

    /// Digits of `phone` when there are exactly ten of them.
    pub fn normalize_phone(&self, phone: &str) -> Option<String> {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.len() == 10 {
            Some(digits)
        } else {
            debug!("Phone number has {} digits, expected 10", digits.len());
            None
        }
    }

    pub fn password_strength(&self, password: &str) -> PasswordStrength {
        PasswordStrength {
            long_enough: password.chars().count() >= 8,
            has_uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
            has_number: password.chars().any(|c| c.is_ascii_digit()),
            has_special: self.special_regex.is_match(password),
        }
    }
}
