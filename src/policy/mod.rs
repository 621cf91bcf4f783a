pub mod cache;
pub mod engine;
pub mod location;
pub mod routes;

use ahash::AHashSet;
use tracing::warn;

/// Splits a pipe-delimited setting into trimmed non-empty segments
pub fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('|').map(str::trim).filter(|x| !x.is_empty())
}

/// Parses a list of country codes, normalizing them to uppercase
pub fn parse_countries(raw: &str) -> AHashSet<String> {
    split_list(raw).map(|x| x.to_ascii_uppercase()).collect()
}

/// Parses a list of geoname IDs. Entries that aren't numbers are dropped:
/// a typo in the configuration must not take the request pipeline down.
pub fn parse_geoname_ids(raw: &str) -> AHashSet<u32> {
    split_list(raw)
        .filter_map(|x| match x.parse::<u32>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Policy: skipping invalid geoname id '{x}': {e}");
                None
            }
        })
        .collect()
}
