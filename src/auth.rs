//! Shared-secret API key check
//!
//! Applied per request (HTTP) or per connection (WebSocket). Stdio is never
//! gated: whoever can talk to the process's stdin is already trusted.

/// Header carrying the client's key, matched case-insensitively
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication settings. No key means authentication is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

impl AuthConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

/// Stateless gate built from an [`AuthConfig`]
#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    api_key: Option<String>,
}

impl AuthGate {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            api_key: config.api_key,
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Key for display: first 4 characters, the rest masked
    pub fn masked_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let visible: String = key.chars().take(4).collect();
            format!("{}****", visible)
        })
    }

    /// True when auth is disabled or the `x-api-key` header matches exactly.
    pub fn authenticate<'a, I>(&self, headers: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let Some(expected) = self.api_key.as_deref() else {
            return true;
        };
        extract_key(headers)
            .map(|candidate| candidate.as_bytes() == expected.as_bytes())
            .unwrap_or(false)
    }
}

/// First `x-api-key` header value, header name compared case-insensitively
fn extract_key<'a, I>(headers: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(API_KEY_HEADER))
        .map(|(_, value)| value)
}
