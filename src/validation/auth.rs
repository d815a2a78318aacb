use axum::{extract::rejection::JsonRejection, Json};
use garde::Validate;

use crate::error::{AppError, Result};

/// Longest accepted email address.
pub const MAX_EMAIL_LEN: usize = 254;

/// Runs the garde rules of a request body.
pub fn validate_request<T: Validate<Context = ()>>(request: &T) -> Result<()> {
    request
        .validate()
        .map_err(|report| AppError::Validation(report.to_string().trim().to_string()))
}

/// Unwraps a JSON body, turning a rejected body into a validation error.
pub fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// garde rule: the value must contain something other than whitespace.
pub fn non_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be empty"));
    }
    Ok(())
}

/// Canonical form of an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims a name field; an empty result means "not provided".
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates a password chosen by the user.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Probe {
        #[garde(custom(non_blank), length(max = 254))]
        email: String,
    }

    #[test]
    fn blank_email_is_rejected() {
        let probe = Probe {
            email: "   ".to_string(),
        };
        assert!(matches!(validate_request(&probe), Err(AppError::Validation(_))));
    }

    #[test]
    fn overlong_email_is_rejected() {
        let probe = Probe {
            email: format!("{}@x.com", "a".repeat(MAX_EMAIL_LEN)),
        };
        assert!(validate_request(&probe).is_err());
    }

    #[test]
    fn plain_email_passes() {
        let probe = Probe {
            email: "a@x.com".to_string(),
        };
        assert!(validate_request(&probe).is_ok());
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  A@X.com "), "a@x.com");
    }

    #[test]
    fn empty_optional_fields_mean_unchanged() {
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some(" Ada ".to_string())), Some("Ada".to_string()));
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("secret123").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"a".repeat(129)).is_err());
    }
}
