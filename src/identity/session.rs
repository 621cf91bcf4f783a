use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use http::{
    HeaderValue, StatusCode,
    header::{ACCEPT, COOKIE},
};
use moka::{
    Expiry,
    future::{Cache, CacheBuilder},
};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{Credentials, HEADER_API_KEY, HEADER_API_USERNAME, Identity, SESSION_COOKIE};
use crate::http::{Client, headers::CONTENT_TYPE_JSON};

#[derive(Deserialize)]
struct CurrentUser {
    #[serde(default)]
    admin: bool,
}

#[derive(Deserialize)]
struct SessionResponse {
    current_user: Option<CurrentUser>,
}

// Admin answers bypass geoblocking and expire sooner
struct SessionExpiry {
    ttl: Duration,
    admin_ttl: Duration,
}

impl Expiry<Credentials, bool> for SessionExpiry {
    fn expire_after_create(
        &self,
        _key: &Credentials,
        admin: &bool,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(if *admin { self.admin_ttl } else { self.ttl })
    }
}

/// Asks the wrapped application who the credentials belong to.
///
/// The endpoint gets the request's session cookie and API key headers and is
/// expected to answer `200 {"current_user": {"admin": bool}}`, or `404` when
/// there's no session. Everything else is a resolution failure.
/// Definitive answers are cached for a while, `Admin` ones for a shorter time.
pub struct UpstreamSession {
    http_client: Arc<dyn Client>,
    url: Url,
    cache: Cache<Credentials, bool>,
}

impl UpstreamSession {
    pub fn new(
        http_client: Arc<dyn Client>,
        url: Url,
        cache_ttl: Duration,
        cache_admin_ttl: Duration,
        cache_size: u64,
    ) -> Self {
        let expiry = SessionExpiry {
            ttl: cache_ttl,
            admin_ttl: cache_admin_ttl.min(cache_ttl),
        };

        Self {
            http_client,
            url,
            cache: CacheBuilder::new(cache_size).expire_after(expiry).build(),
        }
    }

    fn build_request(&self, credentials: &Credentials) -> Result<reqwest::Request, String> {
        let mut request = reqwest::Request::new(reqwest::Method::GET, self.url.clone());
        let headers = request.headers_mut();
        headers.insert(ACCEPT, CONTENT_TYPE_JSON);

        let value = |x: &str| {
            HeaderValue::from_str(x).map_err(|_| "malformed credentials".to_string())
        };

        if let Some(v) = &credentials.session_token {
            headers.insert(COOKIE, value(&format!("{SESSION_COOKIE}={v}"))?);
        }
        if let Some(v) = &credentials.api_key {
            headers.insert(HEADER_API_KEY, value(v)?);
        }
        if let Some(v) = &credentials.api_username {
            headers.insert(HEADER_API_USERNAME, value(v)?);
        }

        Ok(request)
    }

    async fn fetch(&self, credentials: &Credentials) -> Identity {
        let request = match self.build_request(credentials) {
            Ok(v) => v,
            Err(e) => return Identity::ResolutionFailed(e),
        };

        let response = match self.http_client.execute(request).await {
            Ok(v) => v,
            Err(e) => return Identity::ResolutionFailed(format!("request failed: {e}")),
        };

        match response.status() {
            StatusCode::OK => match response.json::<SessionResponse>().await {
                Ok(SessionResponse {
                    current_user: Some(CurrentUser { admin: true }),
                }) => Identity::Admin,
                Ok(_) => Identity::NotAdmin,
                Err(e) => Identity::ResolutionFailed(format!("unable to parse response: {e}")),
            },
            // No such session
            StatusCode::NOT_FOUND => Identity::NotAdmin,
            // Invalid or revoked credentials, read-only mode etc
            s => Identity::ResolutionFailed(format!("unexpected status {s}")),
        }
    }
}

#[async_trait]
impl super::ResolvesIdentity for UpstreamSession {
    async fn resolve(&self, credentials: &Credentials) -> Identity {
        if credentials.is_empty() {
            return Identity::NotAdmin;
        }

        if let Some(admin) = self.cache.get(credentials).await {
            return if admin {
                Identity::Admin
            } else {
                Identity::NotAdmin
            };
        }

        let identity = self.fetch(credentials).await;
        match &identity {
            Identity::Admin => self.cache.insert(credentials.clone(), true).await,
            Identity::NotAdmin => self.cache.insert(credentials.clone(), false).await,
            // Failures aren't cached, next request tries again
            Identity::ResolutionFailed(e) => debug!("Identity: unable to resolve: {e}"),
        }

        identity
    }
}
