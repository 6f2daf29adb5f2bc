use common::Address;

use crate::error::{DomainError, Result};

const PASSWORD_LENGTH: std::ops::RangeInclusive<usize> = 6..=10;
const ZIP_LENGTH: std::ops::RangeInclusive<usize> = 1..=20;

/// Checks the `local@domain.tld` shape and returns the lower-cased address.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim();
    let invalid = || DomainError::validation(format!("invalid email address: {email}"));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(email.to_lowercase())
}

/// Passwords are stored as given; only the length is checked.
pub fn validate_password(password: &str) -> Result<()> {
    if !PASSWORD_LENGTH.contains(&password.chars().count()) {
        return Err(DomainError::validation(
            "password must be between 6 and 10 characters",
        ));
    }
    Ok(())
}

pub fn validate_address(address: &Address) -> Result<()> {
    let fields = [
        ("street number", &address.street_number),
        ("street", &address.street),
        ("city", &address.city),
        ("state", &address.state),
        ("country", &address.country),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(DomainError::validation(format!("{field} must not be empty")));
        }
    }

    let zip = address.zip_code.trim();
    if !ZIP_LENGTH.contains(&zip.len()) || !zip.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation(
            "zip code must be 1 to 20 digits",
        ));
    }
    Ok(())
}

pub(crate) fn validate_non_empty(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}
