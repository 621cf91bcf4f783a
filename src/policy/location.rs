use std::{net::IpAddr, path::Path, time::Instant};

use ahash::AHashSet;
use anyhow::{Context, Error};
use maxminddb::geoip2;
use tracing::warn;

/// Where an IP address is located, as far as the database knows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub country_code: Option<String>,
    pub geoname_ids: AHashSet<u32>,
}

impl Location {
    pub fn new(country_code: Option<&str>, geoname_ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            country_code: country_code
                .map(str::trim)
                .filter(|x| !x.is_empty())
                .map(str::to_ascii_uppercase),
            geoname_ids: geoname_ids.into_iter().collect(),
        }
    }

    /// Resolved, but neither country nor any geoname is known
    pub fn is_empty(&self) -> bool {
        self.country_code.is_none() && self.geoname_ids.is_empty()
    }
}

/// Resolves IP addresses to locations. Unknown addresses give `None`, never an error.
pub trait LocatesIp: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<Location>;
}

/// Used when no database is configured
pub struct NoLocation;

impl LocatesIp for NoLocation {
    fn lookup(&self, _ip: IpAddr) -> Option<Location> {
        None
    }
}

/// MaxMind database backed locator. Works with both City and Country editions,
/// the latter just lacks subdivision and city geonames.
pub struct GeoIp {
    db: maxminddb::Reader<Vec<u8>>,
}

impl GeoIp {
    pub fn new(db_path: &Path) -> Result<Self, Error> {
        let start = Instant::now();
        let db = maxminddb::Reader::open_readfile(db_path)
            .with_context(|| format!("unable to open GeoIP database {}", db_path.display()))?;

        warn!(
            "GeoIP: {} loaded with {} nodes in {}s",
            db.metadata.database_type,
            db.metadata.node_count,
            start.elapsed().as_secs_f64()
        );

        Ok(Self { db })
    }
}

impl LocatesIp for GeoIp {
    fn lookup(&self, ip: IpAddr) -> Option<Location> {
        let city: geoip2::City = self.db.lookup(ip).ok().flatten()?;

        let mut ids = vec![];
        ids.extend(city.continent.as_ref().and_then(|x| x.geoname_id));
        ids.extend(city.country.as_ref().and_then(|x| x.geoname_id));
        if let Some(v) = &city.subdivisions {
            ids.extend(v.iter().filter_map(|x| x.geoname_id));
        }
        ids.extend(city.city.as_ref().and_then(|x| x.geoname_id));

        let country_code = city.country.as_ref().and_then(|x| x.iso_code);
        Some(Location::new(country_code, ids))
    }
}
