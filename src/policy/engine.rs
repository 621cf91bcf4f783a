use std::{net::IpAddr, sync::Arc};

use strum::{Display, IntoStaticStr};
use tracing::debug;

use super::{
    cache::PolicyCache,
    location::{LocatesIp, Location},
    routes::RouteClassifier,
};
use crate::{
    identity::{Credentials, Identity, ResolvesIdentity},
    settings::SettingsStore,
};

/// What kind of response the client expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ResponseFormat {
    Html,
    Json,
    Other,
}

/// Everything the engine needs to know about a request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    pub remote_addr: Option<IpAddr>,
    pub credentials: Credentials,
    pub format: ResponseFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
    Allow,
    Block,
}

/// Which rule produced the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Reason {
    Disabled,
    Admin,
    StaticPath,
    OpenPath,
    UnknownLocation,
    AllowlistMatch,
    AllowlistMiss,
    BlocklistMatch,
    BlocklistMiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: Reason,
}

impl Decision {
    pub const fn allow(reason: Reason) -> Self {
        Self {
            verdict: Verdict::Allow,
            reason,
        }
    }

    pub const fn block(reason: Reason) -> Self {
        Self {
            verdict: Verdict::Block,
            reason,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Block
    }
}

/// Decides whether a request is allowed to reach the application
pub struct Engine {
    settings: Arc<SettingsStore>,
    cache: Arc<PolicyCache>,
    routes: RouteClassifier,
    identity: Arc<dyn ResolvesIdentity>,
    locator: Arc<dyn LocatesIp>,
}

impl Engine {
    pub fn new(
        settings: Arc<SettingsStore>,
        cache: Arc<PolicyCache>,
        routes: RouteClassifier,
        identity: Arc<dyn ResolvesIdentity>,
        locator: Arc<dyn LocatesIp>,
    ) -> Self {
        Self {
            settings,
            cache,
            routes,
            identity,
            locator,
        }
    }

    async fn is_admin(&self, credentials: &Credentials) -> bool {
        match self.identity.resolve(credentials).await {
            Identity::Admin => true,
            Identity::NotAdmin => false,
            Identity::ResolutionFailed(e) => {
                debug!("Engine: unable to resolve identity, treating as non-admin: {e}");
                false
            }
        }
    }

    pub async fn decide(&self, ctx: &RequestContext) -> Decision {
        let settings = self.settings.load();

        if !settings.enabled {
            return Decision::allow(Reason::Disabled);
        }

        if self.is_admin(&ctx.credentials).await {
            return Decision::allow(Reason::Admin);
        }

        if self.routes.is_static(&ctx.path) {
            return Decision::allow(Reason::StaticPath);
        }

        if self.routes.is_always_open(&ctx.path)
            || self
                .routes
                .is_explicitly_allowed(&ctx.path, &settings.allowed_paths)
        {
            return Decision::allow(Reason::OpenPath);
        }

        let location = ctx.remote_addr.and_then(|x| self.locator.lookup(x));
        self.evaluate(location.as_ref())
    }

    /// Applies the country and geoname policy to a resolved location
    pub fn evaluate(&self, location: Option<&Location>) -> Decision {
        let allowed_countries = self.cache.allowed_countries();
        let allowed_geoname_ids = self.cache.allowed_geoname_ids();
        let allowlist_active = !allowed_countries.is_empty() || !allowed_geoname_ids.is_empty();

        let Some(location) = location.filter(|x| !x.is_empty()) else {
            return if allowlist_active {
                Decision::block(Reason::UnknownLocation)
            } else {
                Decision::allow(Reason::UnknownLocation)
            };
        };

        let country = location
            .country_code
            .as_deref()
            .map(str::to_ascii_uppercase);

        if allowlist_active {
            let matched = country
                .as_ref()
                .is_some_and(|x| allowed_countries.contains(x))
                || location
                    .geoname_ids
                    .iter()
                    .any(|x| allowed_geoname_ids.contains(x));

            return if matched {
                Decision::allow(Reason::AllowlistMatch)
            } else {
                Decision::block(Reason::AllowlistMiss)
            };
        }

        let blocked_countries = self.cache.blocked_countries();
        let blocked_geoname_ids = self.cache.blocked_geoname_ids();

        let matched = country
            .as_ref()
            .is_some_and(|x| blocked_countries.contains(x))
            || location
                .geoname_ids
                .iter()
                .any(|x| blocked_geoname_ids.contains(x));

        if matched {
            Decision::block(Reason::BlocklistMatch)
        } else {
            Decision::allow(Reason::BlocklistMiss)
        }
    }
}
