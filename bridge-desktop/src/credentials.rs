//! Access token lookup from the process environment

use bridge_traits::storage::CredentialSource;

/// Environment variable holding the personal access token.
pub const ACCESS_TOKEN_ENV: &str = "VIMEO_MEDIA_SYNC_ACCESS_TOKEN";

/// Reads the access token from an environment variable on every call, so a
/// token exported after startup is picked up by the next tick.
#[derive(Debug, Clone)]
pub struct EnvCredentialSource {
    variable: String,
}

impl EnvCredentialSource {
    pub fn new() -> Self {
        Self::from_variable(ACCESS_TOKEN_ENV)
    }

    pub fn from_variable(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl Default for EnvCredentialSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for EnvCredentialSource {
    fn access_token(&self) -> Option<String> {
        std::env::var(&self.variable)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_token_from_variable() {
        let variable = "MEDIA_SYNC_TEST_TOKEN_PRESENT";
        std::env::set_var(variable, " abc123 ");

        let source = EnvCredentialSource::from_variable(variable);
        assert_eq!(source.access_token(), Some("abc123".to_string()));
        assert!(source.has_token());

        std::env::remove_var(variable);
    }

    #[test]
    fn test_empty_or_missing_variable_is_absent() {
        let variable = "MEDIA_SYNC_TEST_TOKEN_EMPTY";
        std::env::set_var(variable, "");
        assert!(!EnvCredentialSource::from_variable(variable).has_token());

        std::env::remove_var(variable);
        assert_eq!(
            EnvCredentialSource::from_variable(variable).access_token(),
            None
        );
    }
}
