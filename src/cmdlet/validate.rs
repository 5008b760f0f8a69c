//! Parameter validators

use uuid::Uuid;

use crate::{ReplayError, Result};

/// Every element must be a GUID
pub struct ValidateGuid;

impl ValidateGuid {
    /// Check a single value
    ///
    /// Accepts the hyphenated, simple, braced and URN forms.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `element` is not a GUID
    pub fn validate_element(element: &str) -> Result<()> {
        Uuid::parse_str(element)
            .map(|_| ())
            .map_err(|_| ReplayError::Validation(format!("The value '{element}' is not a valid GUID.")))
    }

    /// Check every value, stopping at the first invalid one
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming the first invalid value
    pub fn validate<I, S>(elements: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        elements
            .into_iter()
            .try_for_each(|element| Self::validate_element(element.as_ref()))
    }
}

/// Value must be present and non-empty
pub struct ValidateNotNullOrEmpty;

impl ValidateNotNullOrEmpty {
    /// # Errors
    ///
    /// Returns `Validation` naming `parameter` if `value` is missing or empty
    pub fn validate(parameter: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) if !value.is_empty() => Ok(()),
            _ => Err(ReplayError::Validation(format!(
                "Cannot validate argument on parameter '{parameter}'. The argument is null or empty."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_guid() {
        assert!(ValidateGuid::validate_element("3fa85f64-5717-4562-b3fc-2c963f66afa6").is_ok());
        assert!(ValidateGuid::validate_element("{3fa85f64-5717-4562-b3fc-2c963f66afa6}").is_ok());
        assert!(ValidateGuid::validate_element("3fa85f6457174562b3fc2c963f66afa6").is_ok());
    }

    #[test]
    fn test_invalid_guid() {
        let err = ValidateGuid::validate_element("not-a-guid").unwrap_err();
        assert!(matches!(err, ReplayError::Validation(_)));
        assert_eq!(err.to_string(), "The value 'not-a-guid' is not a valid GUID.");

        assert!(ValidateGuid::validate_element("").is_err());
        assert!(ValidateGuid::validate_element("3fa85f64-5717-4562-b3fc-2c963f66afa").is_err());
    }

    #[test]
    fn test_enumerated_elements() {
        let ok = ["3fa85f64-5717-4562-b3fc-2c963f66afa6", "00000000-0000-0000-0000-000000000000"];
        assert!(ValidateGuid::validate(ok).is_ok());

        let err = ValidateGuid::validate(vec!["3fa85f64-5717-4562-b3fc-2c963f66afa6", "bogus"])
            .unwrap_err();
        assert_eq!(err.to_string(), "The value 'bogus' is not a valid GUID.");
    }

    #[test]
    fn test_not_null_or_empty() {
        assert!(ValidateNotNullOrEmpty::validate("Name", Some("x")).is_ok());
        assert!(ValidateNotNullOrEmpty::validate("Name", Some("")).is_err());

        let err = ValidateNotNullOrEmpty::validate("Name", None).unwrap_err();
        assert!(err.to_string().contains("'Name'"));
    }
}
