use crate::errors::{DomainError, DomainResult, ValidationError};
use regex::Regex;
use std::sync::OnceLock;

/// A trait that entities should implement for validation.
pub trait Validate {
    /// Validates the entity and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

// Record ids double as archive file names, so they must not carry path separators.
fn record_id_regex() -> &'static Regex {
    static RECORD_ID_REGEX: OnceLock<Regex> = OnceLock::new();
    RECORD_ID_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]{1,128}$").unwrap())
}

pub fn is_valid_record_id(id: &str) -> bool {
    record_id_regex().is_match(id)
}

pub fn validate_record_id(field: &str, id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    if !is_valid_record_id(id) {
        return Err(ValidationError::format(
            field,
            "only letters, digits, '_' and '-' are allowed (max 128 characters)",
        ));
    }
    Ok(())
}

pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::required(field))
    } else {
        Ok(())
    }
}

/// Collects several field errors and reports the first one.
pub struct NestedValidator {
    errors: Vec<ValidationError>,
}

impl NestedValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(e) = result {
            self.errors.push(e);
        }
    }

    pub fn validate(self) -> DomainResult<()> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(DomainError::Validation(first)),
        }
    }
}

impl Default for NestedValidator {
    fn default() -> Self {
        Self::new()
    }
}
