pub mod session;
pub mod tokens;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use http::{HeaderMap, Uri, header::COOKIE};
use strum::{Display, IntoStaticStr};

pub use session::UpstreamSession;
pub use tokens::AdminTokens;

/// Session cookie set by the wrapped application
pub const SESSION_COOKIE: &str = "_t";
pub const HEADER_API_KEY: &str = "api-key";
pub const HEADER_API_USERNAME: &str = "api-username";
/// Feed readers can't set headers so the application accepts these in the query too
pub const QUERY_API_KEY: &str = "api_key";
pub const QUERY_API_USERNAME: &str = "api_username";

/// Outcome of resolving who the requester is.
/// Only `Admin` bypasses geoblocking, a failure never does.
#[derive(Debug, Clone, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Identity {
    Admin,
    NotAdmin,
    ResolutionFailed(String),
}

impl Identity {
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Whatever the request carries that identifies the user
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub session_token: Option<String>,
    pub api_key: Option<String>,
    pub api_username: Option<String>,
}

// Don't leak secrets into the logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_username", &self.api_username)
            .finish()
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|x| x.to_str().ok())
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(String::from)
}

fn query_str(uri: &Uri, name: &str) -> Option<String> {
    url::form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|x| !x.is_empty())
}

impl Credentials {
    /// Headers take precedence over the query parameters
    pub fn from_request(uri: &Uri, headers: &HeaderMap) -> Self {
        let session_token = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|x| x.to_str().ok())
            .flat_map(|x| x.split(';'))
            .filter_map(|x| x.trim().split_once('='))
            .find(|(k, v)| *k == SESSION_COOKIE && !v.is_empty())
            .map(|(_, v)| v.to_string());

        Self {
            session_token,
            api_key: header_str(headers, HEADER_API_KEY)
                .or_else(|| query_str(uri, QUERY_API_KEY)),
            api_username: header_str(headers, HEADER_API_USERNAME)
                .or_else(|| query_str(uri, QUERY_API_USERNAME)),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.session_token.is_none() && self.api_key.is_none()
    }
}

#[async_trait]
pub trait ResolvesIdentity: Send + Sync {
    async fn resolve(&self, credentials: &Credentials) -> Identity;
}

/// Nobody is an admin
pub struct Anonymous;

#[async_trait]
impl ResolvesIdentity for Anonymous {
    async fn resolve(&self, _credentials: &Credentials) -> Identity {
        Identity::NotAdmin
    }
}

/// Asks the resolvers in order, first `Admin` wins.
/// If nobody says `Admin` then the first failure is reported, if any.
pub struct Chain(pub Vec<Arc<dyn ResolvesIdentity>>);

#[async_trait]
impl ResolvesIdentity for Chain {
    async fn resolve(&self, credentials: &Credentials) -> Identity {
        let mut failure = None;

        for r in &self.0 {
            match r.resolve(credentials).await {
                Identity::Admin => return Identity::Admin,
                Identity::ResolutionFailed(e) => {
                    if failure.is_none() {
                        failure = Some(Identity::ResolutionFailed(e));
                    }
                }
                Identity::NotAdmin => {}
            }
        }

        failure.unwrap_or(Identity::NotAdmin)
    }
}
