//! Input validation utilities.
//!
//! Centralized validation helpers used by the management service.

use validator::Validate;

use crate::error::WormholeError;

/// Validate a request body, returning a WormholeError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), WormholeError> {
    body.validate().map_err(|e| WormholeError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a wormhole display name against the configured length limit.
pub fn validate_name(name: &str, max_len: usize) -> Result<(), WormholeError> {
    if name.trim().is_empty() {
        return Err(WormholeError::Validation {
            message: "Name cannot be empty or whitespace only".into(),
        });
    }

    if name.chars().count() > max_len {
        return Err(WormholeError::Validation {
            message: format!("Name cannot be longer than {max_len} characters"),
        });
    }

    if name.chars().any(char::is_control) {
        return Err(WormholeError::Validation {
            message: "Name cannot contain control characters".into(),
        });
    }

    Ok(())
}

/// A link that can neither read nor write would never carry traffic.
pub fn validate_link_access(can_read: bool, can_write: bool) -> Result<(), WormholeError> {
    if !can_read && !can_write {
        return Err(WormholeError::Validation {
            message: "A link must be able to read, write, or both".into(),
        });
    }
    Ok(())
}
