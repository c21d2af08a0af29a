//! Opaque provider credentials.
//!
//! A [`CredentialToken`] wraps the raw key handed to the generation provider.
//! The secret is only reachable through [`CredentialToken::expose`]; `Debug`
//! and `Display` print the masked form so tokens can flow through `tracing`
//! fields and status payloads without leaking.

use std::fmt;

use serde::Deserialize;

use crate::constants::CREDENTIAL_VISIBLE_PREFIX;

/// An opaque credential granting access to the generation provider.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct CredentialToken(String);

impl CredentialToken {
    /// Wrap a raw credential string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw secret, for building request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First few characters followed by `...`.
    #[must_use]
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(CREDENTIAL_VISIBLE_PREFIX).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CredentialToken").field(&self.masked()).finish()
    }
}

impl fmt::Display for CredentialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl From<&str> for CredentialToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CredentialToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_returns_raw_value() {
        let token = CredentialToken::new("sk-1234567890abcdef");
        assert_eq!(token.expose(), "sk-1234567890abcdef");
    }

    #[test]
    fn masked_keeps_prefix_only() {
        let token = CredentialToken::new("sk-1234567890abcdef");
        assert_eq!(token.masked(), "sk-12345...");
    }

    #[test]
    fn masked_short_token() {
        let token = CredentialToken::new("abc");
        assert_eq!(token.masked(), "abc...");
    }

    #[test]
    fn debug_and_display_do_not_leak() {
        let token = CredentialToken::new("sk-secret-secret-secret");
        let debug = format!("{token:?}");
        let display = token.to_string();
        assert!(!debug.contains("secret-secret"));
        assert!(!display.contains("secret-secret"));
        assert!(debug.starts_with("CredentialToken("));
    }

    #[test]
    fn deserializes_from_plain_string() {
        let token: CredentialToken = serde_json::from_str(r#""sk-abc""#).unwrap();
        assert_eq!(token, CredentialToken::from("sk-abc"));
    }
}
