use std::collections::BTreeMap;

use thiserror::Error;

/// Field-level validation failures, keyed by form field name.
///
/// Collected before any remote call is attempted so that a form can show
/// every problem at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    fields: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field error.
    pub fn field(name: &str, message: &str) -> Self {
        let mut err = Self::new();
        err.add(name, message);
        err
    }

    /// Record an error for `name`. The first message per field wins.
    pub fn add(&mut self, name: &str, message: &str) {
        self.fields
            .entry(name.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown sort mode: {0}")]
    UnknownSortMode(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Empty filter group")]
    EmptyGroup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut err = ValidationError::new();
        err.add("email", "Email is required");
        err.add("email", "Please enter a valid email");
        err.add("password", "Password is required");

        assert_eq!(err.get("email"), Some("Email is required"));
        assert_eq!(
            err.to_string(),
            "email: Email is required; password: Password is required"
        );
        assert!(err.into_result().is_err());
    }

    #[test]
    fn empty_error_is_ok() {
        assert!(ValidationError::new().into_result().is_ok());
    }
}
