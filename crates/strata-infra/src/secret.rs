//! Provider credential resolution.
//!
//! API keys are read from the environment variable named in configuration
//! and held as [`SecretString`] so they never reach `Debug` output or logs.

use secrecy::SecretString;
use strata_types::error::MemoryError;

/// Read the credential stored in environment variable `var`.
pub fn resolve_api_key(var: &str) -> Result<SecretString, MemoryError> {
    resolve_api_key_with(var, |key| std::env::var(key).ok())
}

/// [`resolve_api_key`] with an injectable lookup.
///
/// A missing or blank value is a [`MemoryError::Configuration`], raised
/// before any provider is constructed or called.
pub fn resolve_api_key_with(
    var: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, MemoryError> {
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim().to_string())),
        _ => Err(MemoryError::Configuration(format!(
            "environment variable {var} is not set"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn present_key_is_returned() {
        let key = resolve_api_key_with("OPENAI_API_KEY", |_| Some("sk-test\n".to_string())).unwrap();
        assert_eq!(key.expose_secret(), "sk-test");
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let err = resolve_api_key_with("OPENAI_API_KEY", |_| None).unwrap_err();
        assert!(matches!(err, MemoryError::Configuration(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn blank_key_is_configuration_error() {
        let err = resolve_api_key_with("OPENAI_API_KEY", |_| Some("  ".to_string())).unwrap_err();
        assert!(matches!(err, MemoryError::Configuration(_)));
    }
}
