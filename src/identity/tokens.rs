use std::path::Path;

use ahash::AHashSet;
use anyhow::{Context, Error};
use async_trait::async_trait;
use tracing::warn;

use super::{Credentials, Identity, ResolvesIdentity};

/// Static list of admin session tokens and API keys
pub struct AdminTokens {
    tokens: AHashSet<String>,
}

impl AdminTokens {
    pub const fn new(tokens: AHashSet<String>) -> Self {
        Self { tokens }
    }

    /// Loads tokens from a file, one per line. Blank lines and `#` comments are skipped.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path).context("unable to read admin tokens")?;

        let tokens = data
            .lines()
            .map(str::trim)
            .filter(|x| !x.is_empty() && !x.starts_with('#'))
            .map(String::from)
            .collect::<AHashSet<_>>();

        warn!("Identity: {} admin tokens loaded", tokens.len());
        Ok(Self::new(tokens))
    }
}

#[async_trait]
impl ResolvesIdentity for AdminTokens {
    async fn resolve(&self, credentials: &Credentials) -> Identity {
        let known = |x: &Option<String>| x.as_ref().is_some_and(|x| self.tokens.contains(x));

        if known(&credentials.session_token) || known(&credentials.api_key) {
            Identity::Admin
        } else {
            Identity::NotAdmin
        }
    }
}
