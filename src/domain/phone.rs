use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A validated local mobile number in canonical form: exactly 11 digits
/// with the `09` prefix, no separators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhoneNumber(String);

const MOBILE_LEN: usize = 11;
const MOBILE_PREFIX: &str = "09";

impl PhoneNumber {
    /// Normalize and validate a raw contact string. Spaces and dashes are
    /// tolerated as separators; everything else must be a digit.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();

        if normalized.chars().any(|c| !c.is_ascii_digit()) {
            return Err(AppError::Validation(
                "Contact number must contain only digits".to_string(),
            ));
        }
        if normalized.len() != MOBILE_LEN {
            return Err(AppError::Validation(format!(
                "Contact number must be exactly {} digits",
                MOBILE_LEN
            )));
        }
        if !normalized.starts_with(MOBILE_PREFIX) {
            return Err(AppError::Validation(format!(
                "Contact number must start with {}",
                MOBILE_PREFIX
            )));
        }

        Ok(PhoneNumber(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
